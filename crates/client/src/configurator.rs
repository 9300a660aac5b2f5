//! Print job configurator.
//!
//! Collects the uploaded files and print options for one agency, keeps the
//! quote current after every change and decides whether the job can be
//! submitted. It is serializable so an in-progress draft can be kept in the
//! visitor's server-side session; file contents are stored elsewhere and
//! referenced by [`UploadedFile::key`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use copyhub_core::{
    AgencyId, AgencyProduct, ColorOption, CopiesError, MIN_COPIES, PaperType, PrintOptions,
    PrintType, Quote, count_matching_products, validate_copies,
};

use crate::pdf::PdfError;
use crate::types::CreateOrderRequest;

/// A file added to the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    /// Where the caller stored the file contents.
    pub key: String,
    pub size: usize,
    /// Zero when the file could not be parsed.
    pub page_count: u32,
    /// Why the pages could not be counted.
    pub warning: Option<String>,
}

impl UploadedFile {
    /// Record a file with the outcome of counting its pages.
    #[must_use]
    pub fn from_count(
        file_name: impl Into<String>,
        key: impl Into<String>,
        size: usize,
        pages: Result<u32, PdfError>,
    ) -> Self {
        let file_name = file_name.into();
        let (page_count, warning) = match pages {
            Ok(pages) => (pages, None),
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "Could not count PDF pages");
                (0, Some(format!("{file_name}: {e}. It counts as 0 pages.")))
            }
        };

        Self {
            file_name,
            key: key.into(),
            size,
            page_count,
            warning,
        }
    }
}

/// Why a job cannot be submitted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BlockReason {
    #[error("Upload at least one PDF file")]
    NoFiles,
    #[error("None of the uploaded files has any printable pages")]
    NoPages,
    #[error("Choose a paper size")]
    MissingPaperType,
    #[error("Choose black & white or color")]
    MissingColorOption,
    #[error("Choose single- or double-sided printing")]
    MissingPrintType,
    #[error("This agency has no matching product for the selected options")]
    NoMatchingProduct,
}

/// An in-progress print job for one agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfigurator {
    agency_id: AgencyId,
    products: Vec<AgencyProduct>,
    files: Vec<UploadedFile>,
    paper_type: Option<PaperType>,
    color_option: Option<ColorOption>,
    print_type: Option<PrintType>,
    copies: u32,
    quote: Quote,
}

impl OrderConfigurator {
    /// Start a job against an agency's price list.
    #[must_use]
    pub fn new(agency_id: AgencyId, products: Vec<AgencyProduct>) -> Self {
        Self {
            agency_id,
            products,
            files: Vec::new(),
            paper_type: None,
            color_option: None,
            print_type: None,
            copies: MIN_COPIES,
            quote: Quote {
                copies: MIN_COPIES,
                ..Quote::default()
            },
        }
    }

    #[must_use]
    pub const fn agency_id(&self) -> AgencyId {
        self.agency_id
    }

    #[must_use]
    pub fn products(&self) -> &[AgencyProduct] {
        &self.products
    }

    /// Replace the price list, e.g. after the agency changed a price.
    pub fn set_products(&mut self, products: Vec<AgencyProduct>) {
        self.products = products;
        self.recompute();
    }

    // =========================================================================
    // Files
    // =========================================================================

    #[must_use]
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn add_file(&mut self, file: UploadedFile) {
        self.files.push(file);
        self.recompute();
    }

    /// Remove the file at `index`, returning it so its contents can be
    /// discarded.
    pub fn remove_file(&mut self, index: usize) -> Option<UploadedFile> {
        if index >= self.files.len() {
            return None;
        }
        let removed = self.files.remove(index);
        self.recompute();
        Some(removed)
    }

    /// Remove every file.
    pub fn clear_files(&mut self) -> Vec<UploadedFile> {
        let removed = std::mem::take(&mut self.files);
        self.recompute();
        removed
    }

    /// Sum of the files' page counts.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.files
            .iter()
            .fold(0_u32, |total, file| total.saturating_add(file.page_count))
    }

    // =========================================================================
    // Options
    // =========================================================================

    pub fn set_paper_type(&mut self, paper_type: Option<PaperType>) {
        self.paper_type = paper_type;
        self.recompute();
    }

    pub fn set_color_option(&mut self, color_option: Option<ColorOption>) {
        self.color_option = color_option;
        self.recompute();
    }

    pub fn set_print_type(&mut self, print_type: Option<PrintType>) {
        self.print_type = print_type;
        self.recompute();
    }

    /// Set the number of copies.
    ///
    /// # Errors
    ///
    /// Returns [`CopiesError`] and keeps the previous count when `copies` is
    /// outside `1..=1000`.
    pub fn set_copies(&mut self, copies: u32) -> Result<(), CopiesError> {
        self.copies = validate_copies(copies)?;
        self.recompute();
        Ok(())
    }

    #[must_use]
    pub const fn paper_type(&self) -> Option<PaperType> {
        self.paper_type
    }

    #[must_use]
    pub const fn color_option(&self) -> Option<ColorOption> {
        self.color_option
    }

    #[must_use]
    pub const fn print_type(&self) -> Option<PrintType> {
        self.print_type
    }

    #[must_use]
    pub const fn copies(&self) -> u32 {
        self.copies
    }

    /// The selected options once all three are chosen.
    #[must_use]
    pub fn options(&self) -> Option<PrintOptions> {
        Some(PrintOptions::new(
            self.paper_type?,
            self.color_option?,
            self.print_type?,
        ))
    }

    // =========================================================================
    // Price
    // =========================================================================

    #[must_use]
    pub const fn quote(&self) -> &Quote {
        &self.quote
    }

    #[must_use]
    pub const fn price_per_page(&self) -> Decimal {
        self.quote.price_per_page
    }

    #[must_use]
    pub const fn total_price(&self) -> Decimal {
        self.quote.total_price
    }

    fn recompute(&mut self) {
        let options = self.options();
        self.quote = Quote::for_products(
            &self.products,
            options.as_ref(),
            self.total_pages(),
            self.copies,
        );

        if let Some(options) = options {
            let matches = count_matching_products(&self.products, &options);
            if matches > 1 {
                tracing::warn!(
                    agency_id = %self.agency_id,
                    %options,
                    matches,
                    "Several agency products match; using the first"
                );
            }
        }
    }

    /// Messages to show next to the form: unreadable files and a missing
    /// product match.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = self
            .files
            .iter()
            .filter_map(|file| file.warning.clone())
            .collect();
        if self.options().is_some() && !self.quote.has_match() {
            warnings.push(BlockReason::NoMatchingProduct.to_string());
        }
        warnings
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Everything that currently prevents submission, in form order.
    #[must_use]
    pub fn blocking_reasons(&self) -> Vec<BlockReason> {
        let mut reasons = Vec::new();
        if self.files.is_empty() {
            reasons.push(BlockReason::NoFiles);
        } else if self.total_pages() == 0 {
            reasons.push(BlockReason::NoPages);
        }
        if self.paper_type.is_none() {
            reasons.push(BlockReason::MissingPaperType);
        }
        if self.color_option.is_none() {
            reasons.push(BlockReason::MissingColorOption);
        }
        if self.print_type.is_none() {
            reasons.push(BlockReason::MissingPrintType);
        }
        if self.options().is_some() && !self.quote.has_match() {
            reasons.push(BlockReason::NoMatchingProduct);
        }
        reasons
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.blocking_reasons().is_empty()
    }

    /// Build the order line data for submission.
    ///
    /// # Errors
    ///
    /// Returns the first [`BlockReason`] when the job is not ready.
    pub fn to_order_request(&self) -> Result<CreateOrderRequest, BlockReason> {
        if let Some(reason) = self.blocking_reasons().first() {
            return Err(*reason);
        }
        let options = self.options().ok_or(BlockReason::MissingPaperType)?;

        Ok(CreateOrderRequest {
            agency_id: self.agency_id,
            paper_type: options.paper_type,
            color_option: options.color_option,
            print_type: options.print_type,
            page_count: self.quote.total_pages,
            copy_count: self.quote.copies,
            price_per_page: self.quote.price_per_page,
            total_price: self.quote.total_price,
        })
    }
}
