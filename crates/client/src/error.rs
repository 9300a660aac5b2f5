//! Errors returned by the CopyHub client.

use thiserror::Error;

/// Errors that can occur when talking to the CopyHub backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    ///
    /// `message` is the backend's own message when the body carried one.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Normalized error message.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The call needs a signed-in user and there is no token.
    #[error("You need to sign in first")]
    NotAuthenticated,

    /// The refresh token was rejected.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// A path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The backend rejected a request for a business reason, re-worded for
    /// the user.
    #[error("{0}")]
    BusinessRule(String),
}

impl ApiError {
    /// Whether this error means the access token was not accepted.
    ///
    /// Besides a literal 401, some endpoints wrap authentication failures in
    /// another status, so the message is checked for the 401 pattern too.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Status { status: 401, .. } | Self::NotAuthenticated => true,
            Self::Status { message, .. } => message_looks_unauthorized(message),
            _ => false,
        }
    }

    /// Whether retrying the same request might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the backend reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// HTTP status of the failure, if the backend answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Matches "unauthorized", "unauthorised" or a standalone "401" in a message.
fn message_looks_unauthorized(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("unauthorized") || lower.contains("unauthorised") || mentions_401(&lower)
}

/// Whether "401" appears as a number of its own, not inside a code, an id or
/// an amount such as "AB4013", "#401" or "$401.50".
fn mentions_401(message: &str) -> bool {
    let attached = |c: char| c.is_ascii_alphanumeric() || matches!(c, '$' | '#' | '_' | '-' | '.');

    message.match_indices("401").any(|(start, _)| {
        let before = message.get(..start).and_then(|head| head.chars().next_back());
        let mut after = message.get(start + 3..).unwrap_or_default().chars();
        let starts_clean = !before.is_some_and(attached);
        let ends_clean = match after.next() {
            None => true,
            Some('.' | ',') => !after.next().is_some_and(|c| c.is_ascii_digit()),
            Some(c) => !attached(c),
        };
        starts_clean && ends_clean
    })
}
