//! Order file downloads.

use reqwest::header::CONTENT_DISPOSITION;
use tracing::instrument;

use super::{ApiClient, ApiError, ApiRequest};
use crate::session::Session;
use crate::types::DownloadedFile;
use copyhub_core::FileId;

impl ApiClient {
    /// Download a file attached to an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or belongs to an order the
    /// caller cannot see.
    #[instrument(skip(self, session), fields(file_id = %id))]
    pub async fn download_file(&self, session: &Session, id: FileId) -> Result<DownloadedFile, ApiError> {
        let response = self
            .execute(session, &ApiRequest::get(format!("files/{id}")))
            .await?;

        let file_name = response
            .headers
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(file_name_from_disposition)
            .unwrap_or_else(|| format!("file-{id}.pdf"));
        let content_type = response
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        Ok(DownloadedFile {
            file_name,
            content_type,
            data: response.body,
        })
    }
}

/// Extract the file name from a `Content-Disposition` header value.
///
/// Only the plain `filename=` parameter is read; path separators are
/// stripped so the name is safe to echo back in our own header.
fn file_name_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename="))
        .map(|name| name.trim_matches('"'))
        .map(|name| name.rsplit(['/', '\\']).next().unwrap_or(name).to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_disposition() {
        assert_eq!(
            file_name_from_disposition(r#"attachment; filename="thesis.pdf""#).as_deref(),
            Some("thesis.pdf")
        );
        assert_eq!(
            file_name_from_disposition("attachment; filename=../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(file_name_from_disposition("inline"), None);
        assert_eq!(file_name_from_disposition(r#"attachment; filename="""#), None);
    }
}
