//! Request and response payloads exchanged with the backend.
//!
//! Domain records live in `copyhub_core`; this module only holds the shapes
//! that exist for a single endpoint.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use copyhub_core::{
    AgencyId, ColorOption, OrderCode, OrderState, PaperType, PrintOptions, PrintType, ProductId,
    UserId,
};

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Sign-up form. Agencies register with a shop name and are approved by an
/// admin before they appear in listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_agency: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleLoginRequest<'a> {
    pub id_token: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<&'a str>,
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest<'a> {
    pub email: &'a str,
    pub token: &'a str,
    pub new_password: &'a str,
}

/// Tokens returned by login, registration and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

// =============================================================================
// Users
// =============================================================================

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub agency_id: Option<AgencyId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

// =============================================================================
// Agencies and products
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub rating: u8,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub paper_type: PaperType,
    pub color_option: ColorOption,
    pub print_type: PrintType,
}

impl From<PrintOptions> for NewProduct {
    fn from(options: PrintOptions) -> Self {
        Self {
            paper_type: options.paper_type,
            color_option: options.color_option,
            print_type: options.print_type,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgencyProduct {
    pub agency_id: AgencyId,
    pub product_id: ProductId,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdatePriceRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

// =============================================================================
// Orders
// =============================================================================

/// Order line data sent alongside the uploaded files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub agency_id: AgencyId,
    pub paper_type: PaperType,
    pub color_option: ColorOption,
    pub print_type: PrintType,
    pub page_count: u32,
    pub copy_count: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_page: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StateChangeRequest {
    pub state: OrderState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompleteOrderRequest<'a> {
    pub completion_code: &'a str,
}

/// Outcome of a state change the backend accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// The order moved; the new state has no pickup code.
    Moved,
    /// The order is finished and this is the customer's pickup code.
    ReadyForPickup(String),
    /// The order is finished but its pickup code could not be fetched yet.
    CodeUnavailable,
}

impl StateChange {
    /// The pickup code, when one was fetched.
    #[must_use]
    pub fn pickup_code(&self) -> Option<&str> {
        match self {
            Self::ReadyForPickup(code) => Some(code),
            Self::Moved | Self::CodeUnavailable => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompletionCodeResponse {
    #[serde(alias = "code")]
    pub completion_code: String,
}

/// Order counts and revenue for the back office dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAnalytics {
    pub total_orders: u64,
    pub total_revenue: Decimal,
    /// Order count per state name.
    #[serde(default)]
    pub orders_by_state: HashMap<String, u64>,
    #[serde(default)]
    pub revenue_by_month: Vec<MonthlyRevenue>,
}

impl OrderAnalytics {
    /// Count for one state, zero when the backend omitted it.
    #[must_use]
    pub fn count_for(&self, state: OrderState) -> u64 {
        self.orders_by_state
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(state.name()))
            .map_or(0, |(_, count)| *count)
    }

    /// Share of orders that reached `Completed`, in percent.
    #[must_use]
    pub fn completion_rate(&self) -> Option<Decimal> {
        if self.total_orders == 0 {
            return None;
        }
        let completed = Decimal::from(self.count_for(OrderState::Completed));
        Some((completed * Decimal::ONE_HUNDRED / Decimal::from(self.total_orders)).round_dp(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    /// `YYYY-MM`.
    pub month: String,
    pub revenue: Decimal,
    #[serde(default)]
    pub orders: u64,
}

// =============================================================================
// Files
// =============================================================================

/// A file downloaded from the backend.
#[derive(Clone)]
pub struct DownloadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for DownloadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckoutSessionRequest<'a> {
    pub order_code: &'a OrderCode,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

/// A hosted checkout session created by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    #[serde(alias = "id")]
    pub session_id: String,
    /// Hosted page URL when the backend provides one.
    #[serde(default)]
    pub url: Option<String>,
}

/// Where the visitor landed after the hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutLanding {
    Success { session_id: String },
    Canceled,
    Unknown,
}

impl CheckoutLanding {
    /// Classify the landing from its query parameters.
    ///
    /// `session_id` wins over `payment_canceled` when both are present.
    pub fn from_query<'a, I>(params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut canceled = false;
        for (key, value) in params {
            match key {
                "session_id" if !value.trim().is_empty() => {
                    return Self::Success {
                        session_id: value.trim().to_owned(),
                    };
                }
                "payment_canceled" => {
                    canceled = !matches!(value.trim(), "false" | "0");
                }
                _ => {}
            }
        }
        if canceled { Self::Canceled } else { Self::Unknown }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_prices_are_numbers() {
        let request = CreateOrderRequest {
            agency_id: AgencyId::new(2),
            paper_type: PaperType::A4,
            color_option: ColorOption::BlackAndWhite,
            print_type: PrintType::TwoSided,
            page_count: 10,
            copy_count: 3,
            price_per_page: Decimal::new(25, 1),
            total_price: Decimal::from(75),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["pricePerPage"], serde_json::json!(2.5));
        assert_eq!(json["totalPrice"], serde_json::json!(75.0));
        assert_eq!(json["colorOption"], "BlackAndWhite");
        assert_eq!(json["printType"], "TwoSided");
    }

    #[test]
    fn test_token_response_accepts_token_alias() {
        let response: TokenResponse =
            serde_json::from_value(serde_json::json!({"token": "abc"})).unwrap();
        assert_eq!(response.access_token, "abc");
        assert!(response.refresh_token.is_none());
    }

    #[test]
    fn test_checkout_landing() {
        assert_eq!(
            CheckoutLanding::from_query([("session_id", "cs_test_1")]),
            CheckoutLanding::Success {
                session_id: "cs_test_1".to_string()
            }
        );
        assert_eq!(
            CheckoutLanding::from_query([("payment_canceled", "true")]),
            CheckoutLanding::Canceled
        );
        assert_eq!(
            CheckoutLanding::from_query([("payment_canceled", "false")]),
            CheckoutLanding::Unknown
        );
        assert_eq!(CheckoutLanding::from_query([]), CheckoutLanding::Unknown);
    }

    #[test]
    fn test_analytics_completion_rate() {
        let analytics: OrderAnalytics = serde_json::from_value(serde_json::json!({
            "totalOrders": 8,
            "totalRevenue": "120.50",
            "ordersByState": {"Completed": 2, "pending": 6},
            "revenueByMonth": [{"month": "2026-09", "revenue": 120.5, "orders": 8}]
        }))
        .unwrap();

        assert_eq!(analytics.count_for(OrderState::Pending), 6);
        assert_eq!(analytics.count_for(OrderState::Rejected), 0);
        assert_eq!(analytics.completion_rate(), Some(Decimal::from(25)));
        assert_eq!(OrderAnalytics::default().completion_rate(), None);
    }
}
