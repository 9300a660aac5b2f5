//! Orders as seen by the customer and the agency.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{AgencyId, FileId, OrderCode, UserId};
use super::print::{ColorOption, PaperType, PrintOptions, PrintType};
use super::status::OrderState;

/// A PDF attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFile {
    pub id: FileId,
    pub file_name: String,
    #[serde(default)]
    pub page_count: u32,
}

/// A print order.
///
/// The backend owns every field; the client only renders them and requests
/// state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_code: OrderCode,
    pub agency_id: AgencyId,
    #[serde(default)]
    pub agency_name: Option<String>,
    pub customer_id: UserId,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub paper_type: PaperType,
    pub color_option: ColorOption,
    pub print_type: PrintType,
    pub page_count: u32,
    pub copy_count: u32,
    pub price_per_page: Decimal,
    pub total_price: Decimal,
    pub state: OrderState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<OrderFile>,
    #[serde(default)]
    pub completion_code: Option<String>,
}

impl Order {
    #[must_use]
    pub const fn options(&self) -> PrintOptions {
        PrintOptions::new(self.paper_type, self.color_option, self.print_type)
    }

    /// Recompute the total from the order's own line data.
    #[must_use]
    pub fn expected_total(&self) -> Decimal {
        self.price_per_page * Decimal::from(self.page_count) * Decimal::from(self.copy_count)
    }

    /// Whether the stored total agrees with price × pages × copies.
    #[must_use]
    pub fn total_is_consistent(&self) -> bool {
        self.expected_total() == self.total_price
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_backend_order() {
        let json = serde_json::json!({
            "orderCode": "ORD-42",
            "agencyId": 3,
            "agencyName": "Copy Corner",
            "customerId": 9,
            "paperType": "A4",
            "colorOption": "BlackAndWhite",
            "printType": "TwoSided",
            "pageCount": 10,
            "copyCount": 3,
            "pricePerPage": 2.5,
            "totalPrice": 75,
            "state": 1,
            "createdAt": "2026-03-01T10:00:00Z",
            "updatedAt": "2026-03-01T11:00:00Z",
            "files": [{"id": 1, "fileName": "thesis.pdf", "pageCount": 10}]
        });

        let order: Order = serde_json::from_value(json).unwrap();
        assert_eq!(order.state, OrderState::Confirmed);
        assert_eq!(order.files.len(), 1);
        assert!(order.completion_code.is_none());
        assert!(order.total_is_consistent());
    }
}
