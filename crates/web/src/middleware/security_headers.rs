//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Starts locked down and opens exactly what the pages load from elsewhere:
//! htmx and Leaflet from unpkg, map tiles, Google sign-in and the hosted
//! checkout page that order submission redirects to.

use axum::{
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};
use url::Url;

use super::csp::CspNonce;
use crate::state::AppState;

const CDN: &str = "https://unpkg.com";
const GOOGLE_SIGN_IN: &str = "https://accounts.google.com/gsi/";
const MAP_TILES: &str = "https://api.maptiler.com https://tile.openstreetmap.org";

/// Build the Content-Security-Policy for one response.
///
/// `checkout` is the hosted payment page; browsers check `form-action`
/// against the redirect that follows the checkout form post.
#[must_use]
pub fn content_security_policy(nonce: &str, checkout: &Url, secure: bool) -> String {
    let checkout_origin = checkout.origin().ascii_serialization();
    let mut policy = format!(
        "default-src 'none'; \
         script-src 'self' 'nonce-{nonce}' {CDN} {GOOGLE_SIGN_IN}client; \
         style-src 'self' {CDN} {GOOGLE_SIGN_IN}style; \
         font-src 'self'; \
         img-src 'self' data: {CDN} {MAP_TILES}; \
         connect-src 'self' {GOOGLE_SIGN_IN}; \
         frame-src {GOOGLE_SIGN_IN}; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self' {checkout_origin}; \
         frame-ancestors 'none'"
    );
    if secure {
        policy.push_str("; upgrade-insecure-requests");
    }
    policy
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: no-referrer`
/// - `Content-Security-Policy` (see [`content_security_policy`])
/// - `Permissions-Policy` denying sensors, camera, microphone and payment APIs
/// - `Cache-Control: no-store, max-age=0` unless the handler set one
/// - `Cross-Origin-Opener-Policy: same-origin-allow-popups` for the Google popup
/// - `Cross-Origin-Embedder-Policy: credentialless` so CDN assets still load
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let nonce = response
        .extensions()
        .get::<CspNonce>()
        .map(|nonce| nonce.value().to_string())
        .unwrap_or_default();
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));

    let policy = content_security_policy(
        &nonce,
        &state.config().api.checkout_url,
        state.config().is_secure(),
    );
    match HeaderValue::from_str(&policy) {
        Ok(value) => {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => tracing::error!(error = %e, "Content-Security-Policy is not a valid header"),
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             autoplay=(), \
             browsing-topics=(), \
             camera=(), \
             display-capture=(), \
             geolocation=(), \
             gyroscope=(), \
             magnetometer=(), \
             microphone=(), \
             midi=(), \
             payment=(), \
             usb=(), \
             xr-spatial-tracking=()",
        ),
    );

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin-allow-popups"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_carries_nonce_and_checkout_origin() {
        let checkout = Url::parse("https://checkout.stripe.com/c/pay/").unwrap();
        let policy = content_security_policy("abc123", &checkout, true);

        assert!(policy.contains("'nonce-abc123'"));
        assert!(policy.contains("form-action 'self' https://checkout.stripe.com;"));
        assert!(policy.ends_with("upgrade-insecure-requests"));
        assert!(HeaderValue::from_str(&policy).is_ok());
    }

    #[test]
    fn test_plain_http_does_not_upgrade() {
        let checkout = Url::parse("http://127.0.0.1:4242/pay/").unwrap();
        let policy = content_security_policy("n", &checkout, false);
        assert!(!policy.contains("upgrade-insecure-requests"));
        assert!(policy.contains("http://127.0.0.1:4242"));
    }
}
