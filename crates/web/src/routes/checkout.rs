//! Landing pages for the hosted checkout.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::Query;
use copyhub_client::types::CheckoutLanding;
use tower_sessions::Session;
use tracing::instrument;

use super::Layout;
use crate::filters;
use crate::middleware::{CspNonce, Visitor};

/// Seconds before the landing page moves on to the account page.
pub const REDIRECT_SECONDS: u32 = 5;

#[derive(Template, WebTemplate)]
#[template(path = "checkout/landing.html")]
pub struct LandingTemplate {
    pub layout: Layout,
    pub succeeded: bool,
    pub title: &'static str,
    pub message: &'static str,
    pub redirect_seconds: u32,
}

impl LandingTemplate {
    fn new(layout: Layout, landing: &CheckoutLanding) -> Self {
        let (succeeded, title, message) = match landing {
            CheckoutLanding::Success { .. } => (
                true,
                "Payment received",
                "Your order is confirmed. The agency will start printing soon.",
            ),
            CheckoutLanding::Canceled => (
                false,
                "Payment canceled",
                "Your order was saved but not paid. You can cancel it from your account.",
            ),
            CheckoutLanding::Unknown => (
                false,
                "Checking your payment",
                "We could not tell how the payment went. Your orders show the latest status.",
            ),
        };
        Self {
            layout,
            succeeded,
            title,
            message,
            redirect_seconds: REDIRECT_SECONDS,
        }
    }
}

fn landing_from(params: &[(String, String)]) -> CheckoutLanding {
    CheckoutLanding::from_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

/// Return from a completed payment.
#[instrument(skip(visitor, session, nonce, params))]
pub async fn success(
    visitor: Visitor,
    session: Session,
    nonce: CspNonce,
    Query(params): Query<Vec<(String, String)>>,
) -> LandingTemplate {
    let landing = landing_from(&params);
    match &landing {
        CheckoutLanding::Success { session_id } => {
            tracing::info!(session_id = %session_id, "Checkout completed");
        }
        other => tracing::warn!(landing = ?other, "Success landing without a session id"),
    }
    LandingTemplate::new(Layout::new(&visitor, &session, nonce).await, &landing)
}

/// Return from an abandoned payment.
#[instrument(skip(visitor, session, nonce))]
pub async fn cancel(visitor: Visitor, session: Session, nonce: CspNonce) -> LandingTemplate {
    tracing::info!("Checkout canceled");
    LandingTemplate::new(
        Layout::new(&visitor, &session, nonce).await,
        &CheckoutLanding::Canceled,
    )
}
