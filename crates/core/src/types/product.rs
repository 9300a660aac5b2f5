//! Catalog products and agency-priced products.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{AgencyId, AgencyProductId, ProductId};
use super::print::{ColorOption, PaperType, PrintOptions, PrintType};

/// A catalog entry managed by the marketplace admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub paper_type: PaperType,
    pub color_option: ColorOption,
    pub print_type: PrintType,
}

impl Product {
    #[must_use]
    pub const fn options(&self) -> PrintOptions {
        PrintOptions::new(self.paper_type, self.color_option, self.print_type)
    }
}

/// A catalog product priced by one agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyProduct {
    pub id: AgencyProductId,
    pub agency_id: AgencyId,
    pub product_id: ProductId,
    pub paper_type: PaperType,
    pub color_option: ColorOption,
    pub print_type: PrintType,
    /// Price per printed page.
    pub price: Decimal,
}

impl AgencyProduct {
    #[must_use]
    pub const fn options(&self) -> PrintOptions {
        PrintOptions::new(self.paper_type, self.color_option, self.print_type)
    }

    #[must_use]
    pub fn matches(&self, options: &PrintOptions) -> bool {
        self.options() == *options
    }
}
