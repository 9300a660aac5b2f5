//! PDF page counting for uploaded print files.

use lopdf::Document;
use thiserror::Error;

/// Largest upload accepted for page counting (50 MiB).
pub const MAX_PDF_BYTES: usize = 50 * 1024 * 1024;

/// Why a file's pages could not be counted.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("the file is empty")]
    Empty,
    #[error("the file is larger than 50 MB")]
    TooLarge,
    #[error("the file is not a PDF")]
    NotPdf,
    #[error("the PDF is password protected")]
    Encrypted,
    #[error("the PDF could not be read: {0}")]
    Malformed(#[from] lopdf::Error),
}

/// Count the pages of a PDF document.
///
/// CPU-bound; call it from `spawn_blocking` inside async handlers.
///
/// # Errors
///
/// Returns [`PdfError`] when the bytes are not a readable, unencrypted PDF.
pub fn count_pages(data: &[u8]) -> Result<u32, PdfError> {
    if data.is_empty() {
        return Err(PdfError::Empty);
    }
    if data.len() > MAX_PDF_BYTES {
        return Err(PdfError::TooLarge);
    }
    if !looks_like_pdf(data) {
        return Err(PdfError::NotPdf);
    }

    let document = Document::load_mem(data)?;
    if document.is_encrypted() {
        return Err(PdfError::Encrypted);
    }

    Ok(u32::try_from(document.get_pages().len()).unwrap_or(u32::MAX))
}

/// The `%PDF-` header may be preceded by up to 1 KiB of junk.
fn looks_like_pdf(data: &[u8]) -> bool {
    let head = data.get(..data.len().min(1024)).unwrap_or_default();
    head.windows(5).any(|window| window == b"%PDF-")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use lopdf::{Object, dictionary};

    use super::*;

    /// A minimal PDF with `pages` blank A4 pages.
    pub(crate) fn sample_pdf(pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                })
                .into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => i64::from(pages),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_counts_pages() {
        assert_eq!(count_pages(&sample_pdf(1)).unwrap(), 1);
        assert_eq!(count_pages(&sample_pdf(7)).unwrap(), 7);
    }

    #[test]
    fn test_rejects_non_pdf() {
        assert!(matches!(count_pages(b""), Err(PdfError::Empty)));
        assert!(matches!(
            count_pages(b"GIF89a not a document"),
            Err(PdfError::NotPdf)
        ));
    }

    #[test]
    fn test_truncated_pdf_is_malformed() {
        let mut cut = sample_pdf(3);
        cut.truncate(cut.len() / 2);
        assert!(matches!(count_pages(&cut), Err(PdfError::Malformed(_))));

        let header_only = count_pages(b"%PDF-1.5\n1 0 obj\n<< /Type /Catalog");
        assert!(matches!(header_only, Err(PdfError::Malformed(_))));
    }
}
