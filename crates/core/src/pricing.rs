//! Product matching and price quotes.
//!
//! An agency prices (paper, color, duplex) triples. A print job is quoted by
//! finding the agency product with exactly the selected triple and applying
//!
//! ```text
//! totalPrice = pricePerPage × totalPages × copies
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{AgencyProduct, AgencyProductId, PrintOptions};

/// Fewest copies a job may request.
pub const MIN_COPIES: u32 = 1;

/// Most copies a job may request.
pub const MAX_COPIES: u32 = 1000;

/// Error returned for an out-of-range copy count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("number of copies must be between {MIN_COPIES} and {MAX_COPIES} (got {0})")]
pub struct CopiesError(pub u32);

/// Validate a requested copy count.
///
/// # Errors
///
/// Returns [`CopiesError`] when `copies` is outside `MIN_COPIES..=MAX_COPIES`.
pub const fn validate_copies(copies: u32) -> Result<u32, CopiesError> {
    if copies >= MIN_COPIES && copies <= MAX_COPIES {
        Ok(copies)
    } else {
        Err(CopiesError(copies))
    }
}

/// Find the agency product priced for exactly these options.
///
/// Agencies are expected to price each triple at most once; if several match,
/// the first one in list order wins.
#[must_use]
pub fn find_matching_product<'a>(
    products: &'a [AgencyProduct],
    options: &PrintOptions,
) -> Option<&'a AgencyProduct> {
    products.iter().find(|product| product.matches(options))
}

/// Number of products priced for these options. Anything above one is a
/// catalog inconsistency on the agency's side.
#[must_use]
pub fn count_matching_products(products: &[AgencyProduct], options: &PrintOptions) -> usize {
    products.iter().filter(|product| product.matches(options)).count()
}

/// A computed price for a print job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Price of the matched product, zero when nothing matched.
    pub price_per_page: Decimal,
    pub total_pages: u32,
    pub copies: u32,
    pub total_price: Decimal,
    /// The agency product the price came from.
    pub matched: Option<AgencyProductId>,
}

impl Quote {
    /// Compute a quote from its inputs.
    #[must_use]
    pub fn compute(price_per_page: Decimal, total_pages: u32, copies: u32) -> Self {
        Self {
            price_per_page,
            total_pages,
            copies,
            total_price: price_per_page * Decimal::from(total_pages) * Decimal::from(copies),
            matched: None,
        }
    }

    /// Quote a job against an agency's price list.
    ///
    /// Without options or without a matching product the price per page is
    /// zero, and so is the total.
    #[must_use]
    pub fn for_products(
        products: &[AgencyProduct],
        options: Option<&PrintOptions>,
        total_pages: u32,
        copies: u32,
    ) -> Self {
        let matched = options.and_then(|opts| find_matching_product(products, opts));
        let price_per_page = matched.map_or(Decimal::ZERO, |product| product.price);
        Self {
            matched: matched.map(|product| product.id),
            ..Self::compute(price_per_page, total_pages, copies)
        }
    }

    /// Whether a product matched the selected options.
    #[must_use]
    pub const fn has_match(&self) -> bool {
        self.matched.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::types::{AgencyId, ColorOption, PaperType, PrintType, ProductId};

    fn product(id: i32, options: PrintOptions, price: &str) -> AgencyProduct {
        AgencyProduct {
            id: AgencyProductId::new(id),
            agency_id: AgencyId::new(1),
            product_id: ProductId::new(id),
            paper_type: options.paper_type,
            color_option: options.color_option,
            print_type: options.print_type,
            price: Decimal::from_str(price).unwrap(),
        }
    }

    fn a4_bw_single() -> PrintOptions {
        PrintOptions::new(PaperType::A4, ColorOption::BlackAndWhite, PrintType::OneSided)
    }

    #[test]
    fn test_compute_total() {
        let quote = Quote::compute(Decimal::from_str("2.5").unwrap(), 10, 3);
        assert_eq!(quote.total_price, Decimal::from(75));
    }

    #[test]
    fn test_total_is_product_of_inputs() {
        for (price, pages, copies) in [("0", 12, 4), ("0.05", 0, 9), ("1.10", 7, 1000), ("3", 1, 1)] {
            let price = Decimal::from_str(price).unwrap();
            let quote = Quote::compute(price, pages, copies);
            assert_eq!(
                quote.total_price,
                price * Decimal::from(pages) * Decimal::from(copies)
            );
        }
    }

    #[test]
    fn test_exact_triple_match_only() {
        let products = vec![
            product(1, a4_bw_single(), "0.10"),
            product(
                2,
                PrintOptions::new(PaperType::A4, ColorOption::Color, PrintType::OneSided),
                "0.50",
            ),
        ];

        let matched = find_matching_product(&products, &a4_bw_single()).unwrap();
        assert_eq!(matched.id, AgencyProductId::new(1));

        let missing = PrintOptions::new(PaperType::A4, ColorOption::BlackAndWhite, PrintType::TwoSided);
        assert!(find_matching_product(&products, &missing).is_none());
    }

    #[test]
    fn test_unmatched_quote_is_zero() {
        let products = vec![product(1, a4_bw_single(), "0.10")];
        let other = PrintOptions::new(PaperType::A3, ColorOption::Color, PrintType::TwoSided);

        let quote = Quote::for_products(&products, Some(&other), 40, 2);
        assert!(!quote.has_match());
        assert_eq!(quote.price_per_page, Decimal::ZERO);
        assert_eq!(quote.total_price, Decimal::ZERO);

        let no_selection = Quote::for_products(&products, None, 40, 2);
        assert!(!no_selection.has_match());
    }

    #[test]
    fn test_first_of_duplicate_matches_wins() {
        let products = vec![
            product(1, a4_bw_single(), "0.10"),
            product(2, a4_bw_single(), "0.20"),
        ];
        assert_eq!(count_matching_products(&products, &a4_bw_single()), 2);
        let quote = Quote::for_products(&products, Some(&a4_bw_single()), 10, 1);
        assert_eq!(quote.matched, Some(AgencyProductId::new(1)));
        assert_eq!(quote.total_price, Decimal::from(1));
    }

    #[test]
    fn test_validate_copies_bounds() {
        assert!(validate_copies(0).is_err());
        assert_eq!(validate_copies(1), Ok(1));
        assert_eq!(validate_copies(1000), Ok(1000));
        assert_eq!(validate_copies(1001), Err(CopiesError(1001)));
    }
}
