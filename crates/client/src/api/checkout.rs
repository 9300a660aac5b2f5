//! Hosted checkout sessions.
//!
//! CopyHub never handles card data: the backend creates a session with the
//! payment provider and the visitor is redirected to the provider's hosted
//! page. The provider sends the visitor back with `session_id` on success or
//! `payment_canceled` on cancel.

use tracing::instrument;
use url::Url;

use super::{ApiClient, ApiError, ApiRequest};
use crate::config::ApiConfig;
use crate::session::Session;
use crate::types::{CheckoutSession, CheckoutSessionRequest};
use copyhub_core::OrderCode;

/// Where to send the visitor for a checkout session.
///
/// Uses the URL returned by the backend when there is one, otherwise the
/// configured hosted checkout base with the session id appended.
///
/// # Errors
///
/// Returns `ApiError::Url` if the session id cannot be joined.
pub fn checkout_redirect_url(config: &ApiConfig, session: &CheckoutSession) -> Result<Url, ApiError> {
    if let Some(url) = session.url.as_deref().and_then(|u| Url::parse(u).ok()) {
        return Ok(url);
    }
    Ok(config.checkout_url.join(&session.session_id)?)
}

impl ApiClient {
    /// Create a hosted checkout session for an order and return the URL to
    /// redirect the visitor to.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create the session.
    #[instrument(skip(self, session, success_url, cancel_url), fields(order_code = %order_code))]
    pub async fn create_checkout_session(
        &self,
        session: &Session,
        order_code: &OrderCode,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<Url, ApiError> {
        let request = ApiRequest::post("checkout/sessions").json(&CheckoutSessionRequest {
            order_code,
            success_url,
            cancel_url,
        })?;
        let checkout: CheckoutSession = self.fetch(session, request).await?;
        if checkout.session_id.trim().is_empty() {
            return Err(ApiError::BusinessRule(
                "The payment provider did not return a checkout session".to_string(),
            ));
        }

        tracing::info!(order_code = %order_code, "Checkout session created");
        checkout_redirect_url(self.config(), &checkout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_prefers_backend_url() {
        let config = ApiConfig::new("https://api.copyhub.test").unwrap();
        let checkout = CheckoutSession {
            session_id: "cs_1".to_string(),
            url: Some("https://pay.example.com/s/cs_1".to_string()),
        };
        assert_eq!(
            checkout_redirect_url(&config, &checkout).unwrap().as_str(),
            "https://pay.example.com/s/cs_1"
        );
    }

    #[test]
    fn test_redirect_falls_back_to_hosted_base() {
        let config = ApiConfig::new("https://api.copyhub.test").unwrap();
        let checkout = CheckoutSession {
            session_id: "cs_test_abc".to_string(),
            url: None,
        };
        assert_eq!(
            checkout_redirect_url(&config, &checkout).unwrap().as_str(),
            "https://checkout.stripe.com/c/pay/cs_test_abc"
        );
    }
}
