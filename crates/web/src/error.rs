//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use copyhub_client::ApiError;
use thiserror::Error;

/// Where visitors land when the backend no longer accepts their session.
pub const LOGIN_PATH: &str = "/auth/login";

/// Application-level error type for the web app.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Server-side session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Visitor is not signed in.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Visitor is signed in but lacks the role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is our fault (or the backend's) rather than the
    /// visitor's, and so worth reporting.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        match self {
            Self::Session(_) | Self::Internal(_) => true,
            Self::Api(err) => is_upstream_failure(err),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Api(err) => api_status(err),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show the visitor.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Api(err) if is_upstream_failure(err) => {
                "The print service is unavailable right now, please try again".to_string()
            }
            Self::Api(err) if err.is_not_found() => "Not found".to_string(),
            // Backend validation and business-rule messages are meant for users
            Self::Api(err) => err.to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Api(err) = &self
            && (err.is_auth_failure() || matches!(err, ApiError::RefreshFailed(_)))
        {
            tracing::debug!(error = %err, "Session rejected by backend, redirecting to login");
            return Redirect::to(LOGIN_PATH).into_response();
        }
        if matches!(self, Self::Unauthorized(_)) {
            return Redirect::to(LOGIN_PATH).into_response();
        }

        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), self.public_message()).into_response()
    }
}

fn is_upstream_failure(err: &ApiError) -> bool {
    match err {
        ApiError::Http(_) | ApiError::Parse(_) | ApiError::Url(_) => true,
        ApiError::Status { status, .. } => *status >= 500,
        _ => false,
    }
}

fn api_status(err: &ApiError) -> StatusCode {
    match err {
        ApiError::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ApiError::NotAuthenticated | ApiError::RefreshFailed(_) => StatusCode::UNAUTHORIZED,
        ApiError::Status { status, .. } if *status < 500 => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// ```rust,ignore
/// add_breadcrumb("order", "Uploaded files", Some(&[("agency_id", "7")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    fn status_error(status: u16, message: &str) -> AppError {
        AppError::Api(ApiError::Status {
            status,
            message: message.to_string(),
        })
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order ABC123".to_string());
        assert_eq!(err.to_string(), "Not found: order ABC123");

        let err = AppError::BadRequest("invalid copies".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid copies");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(get_status(status_error(404, "gone")), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(status_error(409, "exists")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(status_error(503, "down")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Api(ApiError::BusinessRule("no".to_string()))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_auth_failures_redirect_to_login() {
        for err in [
            status_error(401, "Unauthorized"),
            AppError::Api(ApiError::NotAuthenticated),
            AppError::Api(ApiError::RefreshFailed("expired".to_string())),
            AppError::Unauthorized("sign in".to_string()),
        ] {
            let response = err.into_response();
            assert!(response.status().is_redirection());
            assert_eq!(response.headers()[LOCATION], LOGIN_PATH);
        }
    }

    #[test]
    fn test_public_message_hides_upstream_details() {
        let err = status_error(500, "NullReferenceException at OrderService.cs:42");
        assert!(err.is_server_error());
        assert!(!err.public_message().contains("OrderService"));

        let err = status_error(400, "Copy count must be positive");
        assert!(!err.is_server_error());
        assert_eq!(err.public_message(), "Copy count must be positive");
    }
}
