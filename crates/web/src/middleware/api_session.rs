//! Backend session carried in token cookies.
//!
//! Every request gets its own [`copyhub_client::Session`] built from the
//! `accessToken` and `refreshToken` cookies. An access token that has lapsed
//! is renewed up front when a refresh token is present. After the handler
//! runs, any change to the tokens (sign-in, refresh, sign-out) is written
//! back as `Set-Cookie` headers; clearing a token expires its cookie.

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::Response,
};
use copyhub_client::{Session, TokenPair};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::state::AppState;

/// Short-lived bearer token cookie.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Long-lived refresh token cookie.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Lifetime of the refresh token cookie (30 days).
const REFRESH_COOKIE_MAX_AGE: Duration = Duration::days(30);

/// Read the token cookies from request headers. Blank values are ignored.
#[must_use]
pub fn tokens_from_headers(headers: &HeaderMap) -> TokenPair {
    let mut pair = TokenPair::default();

    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse(raw).flatten() {
            let value = Some(cookie.value().to_string()).filter(|v| !v.trim().is_empty());
            match cookie.name() {
                ACCESS_TOKEN_COOKIE => pair.access_token = value,
                REFRESH_TOKEN_COOKIE => pair.refresh_token = value,
                _ => {}
            }
        }
    }

    pair
}

/// Cookies that make the browser hold exactly `pair`.
#[must_use]
pub fn token_cookies(pair: &TokenPair, secure: bool) -> [Cookie<'static>; 2] {
    [
        token_cookie(ACCESS_TOKEN_COOKIE, pair.access_token.as_deref(), None, secure),
        token_cookie(
            REFRESH_TOKEN_COOKIE,
            pair.refresh_token.as_deref(),
            Some(REFRESH_COOKIE_MAX_AGE),
            secure,
        ),
    ]
}

fn token_cookie(
    name: &'static str,
    value: Option<&str>,
    max_age: Option<Duration>,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, value.unwrap_or_default().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build();

    match (value, max_age) {
        (None, _) => cookie.make_removal(),
        (Some(_), Some(max_age)) => cookie.set_max_age(max_age),
        (Some(_), None) => {}
    }
    cookie
}

/// Middleware that attaches the visitor's backend session to the request.
pub async fn api_session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = Session::from_tokens(tokens_from_headers(request.headers()));

    if session.needs_refresh().await
        && let Err(e) = state.api().refresh(&session).await
    {
        tracing::debug!(error = %e, "Stored refresh token rejected, signing out");
        session.sign_out().await;
    }

    let identity = session.identity();
    match identity.user_id {
        Some(user_id) => set_sentry_user(&user_id, identity.email.as_deref()),
        None => clear_sentry_user(),
    }

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    if session.take_dirty() {
        let pair = session.snapshot().await;
        for cookie in token_cookies(&pair, state.config().is_secure()) {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => tracing::error!(error = %e, cookie = cookie.name(), "Token cookie is not a valid header"),
            }
        }
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        headers
    }

    #[test]
    fn test_reads_both_token_cookies() {
        let pair = tokens_from_headers(&headers(&[
            "copyhub_session=abc; accessToken=a.b.c",
            "refreshToken=r1",
        ]));
        assert_eq!(pair.access_token.as_deref(), Some("a.b.c"));
        assert_eq!(pair.refresh_token.as_deref(), Some("r1"));
    }

    #[test]
    fn test_blank_cookies_are_ignored() {
        let pair = tokens_from_headers(&headers(&["accessToken=; refreshToken=r1"]));
        assert!(pair.access_token.is_none());
        assert_eq!(pair.refresh_token.as_deref(), Some("r1"));

        assert!(tokens_from_headers(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn test_cookies_are_http_only_and_lax() {
        let pair = TokenPair {
            access_token: Some("a.b.c".to_string()),
            refresh_token: Some("r1".to_string()),
        };
        let [access, refresh] = token_cookies(&pair, true);

        let access = access.to_string();
        assert!(access.starts_with("accessToken=a.b.c"));
        assert!(access.contains("HttpOnly"));
        assert!(access.contains("SameSite=Lax"));
        assert!(access.contains("Secure"));
        assert!(!access.contains("Max-Age"));

        assert!(refresh.to_string().contains("Max-Age=2592000"));
    }

    #[test]
    fn test_cleared_tokens_expire_cookies() {
        let [access, refresh] = token_cookies(&TokenPair::default(), false);
        for cookie in [access, refresh] {
            let header = cookie.to_string();
            assert!(header.contains("Max-Age=0"), "{header}");
            assert!(!header.contains("Secure"));
        }
    }
}
