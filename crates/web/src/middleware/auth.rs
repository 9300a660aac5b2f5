//! Authentication extractors.
//!
//! The identity comes from the backend session that
//! [`super::api_session_middleware`] attaches to each request. Role checks
//! here only decide which pages to show; the backend enforces the same rules
//! on every call.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use copyhub_client::{Identity, Session};

use crate::error::LOGIN_PATH;

/// The visitor behind a request, signed in or not.
#[derive(Debug, Clone)]
pub struct Visitor {
    pub session: Session,
    pub identity: Identity,
}

impl Visitor {
    fn from_parts(parts: &Parts) -> Self {
        let session = parts.extensions.get::<Session>().cloned().unwrap_or_else(|| {
            tracing::warn!("No backend session in request extensions - middleware may be misconfigured");
            Session::anonymous()
        });
        let identity = session.identity();
        Self { session, identity }
    }
}

/// Error returned when a page needs a sign-in or a role the visitor lacks.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login page, coming back afterwards.
    RedirectToLogin { next: String },
    /// Signed in without the required role.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next } => {
                Redirect::to(&login_redirect(&next)).into_response()
            }
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "You do not have access to this page",
            )
                .into_response(),
        }
    }
}

/// Login URL that returns to `next` afterwards.
#[must_use]
pub fn login_redirect(next: &str) -> String {
    if next.is_empty() || next == "/" {
        return LOGIN_PATH.to_string();
    }
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={encoded}")
}

fn require(parts: &Parts, allowed: impl Fn(&Identity) -> bool) -> Result<Visitor, AuthRejection> {
    let visitor = Visitor::from_parts(parts);
    if !visitor.identity.is_authenticated {
        let next = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
        return Err(AuthRejection::RedirectToLogin { next });
    }
    if !allowed(&visitor.identity) {
        tracing::debug!(user_id = ?visitor.identity.user_id, path = %parts.uri.path(), "Role check failed");
        return Err(AuthRejection::Forbidden);
    }
    Ok(visitor)
}

impl<S> FromRequestParts<S> for Visitor
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// Extractor that requires a signed-in visitor.
///
/// ```rust,ignore
/// async fn account(RequireAuth(visitor): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", visitor.identity.display_name())
/// }
/// ```
pub struct RequireAuth(pub Visitor);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, |_| true).map(Self)
    }
}

/// Extractor that requires an agency or admin.
pub struct RequireStaff(pub Visitor);

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, Identity::is_staff).map(Self)
    }
}

/// Extractor that requires an admin.
pub struct RequireAdmin(pub Visitor);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, |identity| identity.is_admin).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, header::LOCATION};

    use super::*;

    fn parts(uri: &str, session: Option<Session>) -> Parts {
        let mut request = Request::builder().uri(uri).body(()).unwrap();
        if let Some(session) = session {
            request.extensions_mut().insert(session);
        }
        request.into_parts().0
    }

    #[test]
    fn test_login_redirect_keeps_destination() {
        assert_eq!(login_redirect("/"), "/auth/login");
        assert_eq!(
            login_redirect("/account/orders/AB12?x=1"),
            "/auth/login?next=%2Faccount%2Forders%2FAB12%3Fx%3D1"
        );
    }

    #[tokio::test]
    async fn test_anonymous_visitor_is_redirected() {
        let mut parts = parts("/manage/orders", Some(Session::anonymous()));
        let rejection = RequireStaff::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();

        let response = rejection.into_response();
        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers()[LOCATION],
            "/auth/login?next=%2Fmanage%2Forders"
        );
    }

    fn signed_in(role: &str) -> Session {
        use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

        let claims = serde_json::json!({
            "sub": "4",
            "role": role,
            "exp": chrono::Utc::now().timestamp() + 600,
        });
        let token = format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        Session::from_tokens(copyhub_client::TokenPair {
            access_token: Some(token),
            refresh_token: None,
        })
    }

    #[tokio::test]
    async fn test_role_gates() {
        let mut customer = parts("/manage", Some(signed_in("Customer")));
        assert!(matches!(
            RequireStaff::from_request_parts(&mut customer, &()).await,
            Err(AuthRejection::Forbidden)
        ));
        assert!(RequireAuth::from_request_parts(&mut customer, &()).await.is_ok());

        let mut agency = parts("/manage/catalog", Some(signed_in("Agency")));
        assert!(RequireStaff::from_request_parts(&mut agency, &()).await.is_ok());
        assert!(matches!(
            RequireAdmin::from_request_parts(&mut agency, &()).await,
            Err(AuthRejection::Forbidden)
        ));

        let mut admin = parts("/manage/catalog", Some(signed_in("Admin")));
        assert!(RequireAdmin::from_request_parts(&mut admin, &()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_session_counts_as_anonymous() {
        let mut parts = parts("/", None);
        let visitor = Visitor::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(!visitor.identity.is_authenticated);
    }
}
