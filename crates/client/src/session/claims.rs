//! Access token claims and the identity derived from them.
//!
//! Tokens are decoded without verifying the signature: the backend that
//! issued them is the trust boundary and re-checks every request. Decoding is
//! only used to decide what to show.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use copyhub_core::{UserId, UserRole};

/// Why a token could not be decoded. Never surfaced to callers; a bad token
/// simply yields an anonymous [`Identity`].
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token does not have three segments")]
    Segments,
    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not a JSON claim set: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Number(i64),
}

/// The subset of claims CopyHub reads.
///
/// The backend issues WS-Federation claim URIs and may also carry the short
/// JWT names. Both are read; the URI claim wins when both are present.
#[derive(Debug, Deserialize)]
pub struct Claims {
    #[serde(rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier")]
    user_id: Option<StringOrNumber>,
    sub: Option<StringOrNumber>,
    #[serde(rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name")]
    username: Option<String>,
    unique_name: Option<String>,
    #[serde(rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress")]
    email_address: Option<String>,
    email: Option<String>,
    #[serde(rename = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role")]
    roles: Option<OneOrMany>,
    role: Option<OneOrMany>,
    exp: Option<i64>,
}

impl Claims {
    /// Decode the payload segment of a JWT.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] if the token is not three dot-separated segments
    /// or the payload is not base64url-encoded JSON.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let mut segments = token.trim().split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Segments);
        };

        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn roles(&self) -> Vec<UserRole> {
        match self.roles.as_ref().or(self.role.as_ref()) {
            Some(OneOrMany::One(role)) => UserRole::from_claim(role).into_iter().collect(),
            Some(OneOrMany::Many(roles)) => {
                roles.iter().filter_map(|r| UserRole::from_claim(r)).collect()
            }
            None => Vec::new(),
        }
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

/// What the app knows about the current visitor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Identity {
    pub is_authenticated: bool,
    pub is_admin: bool,
    pub is_agency: bool,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Derive the identity carried by `token` as of `now`.
    ///
    /// Malformed tokens, tokens without a numeric user id and tokens whose
    /// `exp` is not in the future all yield the anonymous identity. A token
    /// without `exp` is taken at face value until the backend rejects it.
    #[must_use]
    pub fn from_token(token: &str, now: DateTime<Utc>) -> Self {
        let claims = match Claims::decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring undecodable access token");
                return Self::default();
            }
        };

        let expires_at = claims.expires_at();
        if expires_at.is_some_and(|exp| exp <= now) {
            return Self::default();
        }

        let user_id = match claims.user_id.as_ref().or(claims.sub.as_ref()) {
            Some(StringOrNumber::Text(raw)) => raw.parse::<UserId>().ok(),
            Some(StringOrNumber::Number(raw)) => i32::try_from(*raw).ok().map(UserId::new),
            None => None,
        };
        let Some(user_id) = user_id else {
            return Self::default();
        };

        let roles = claims.roles();
        Self {
            is_authenticated: true,
            is_admin: roles.contains(&UserRole::Admin),
            is_agency: roles.contains(&UserRole::Agency),
            user_id: Some(user_id),
            username: claims.username.or(claims.unique_name),
            email: claims.email_address.or(claims.email),
            expires_at,
        }
    }

    /// Whether the visitor may use the back office.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.is_authenticated && (self.is_admin || self.is_agency)
    }

    /// Name to greet the visitor with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Guest")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned token around a JSON payload.
    pub(crate) fn token_with(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    pub(crate) fn claims(user_id: &str, role: &str, exp: i64) -> serde_json::Value {
        serde_json::json!({
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier": user_id,
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name": "printfan",
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress": "fan@example.com",
            "http://schemas.microsoft.com/ws/2008/06/identity/claims/role": role,
            "exp": exp,
        })
    }

    #[test]
    fn test_valid_customer_token() {
        let now = Utc::now();
        let token = token_with(&claims("17", "Customer", now.timestamp() + 600));
        let identity = Identity::from_token(&token, now);

        assert!(identity.is_authenticated);
        assert!(!identity.is_admin);
        assert!(!identity.is_agency);
        assert_eq!(identity.user_id, Some(UserId::new(17)));
        assert_eq!(identity.username.as_deref(), Some("printfan"));
        assert_eq!(identity.email.as_deref(), Some("fan@example.com"));
    }

    #[test]
    fn test_expired_token_is_anonymous_regardless_of_roles() {
        let now = Utc::now();
        let mut payload = claims("1", "Admin", now.timestamp() - 1);
        payload["http://schemas.microsoft.com/ws/2008/06/identity/claims/role"] =
            serde_json::json!(["Admin", "Agency"]);
        let identity = Identity::from_token(&token_with(&payload), now);

        assert_eq!(identity, Identity::default());
        assert!(!identity.is_authenticated);
    }

    #[test]
    fn test_role_array() {
        let now = Utc::now();
        let mut payload = claims("5", "", now.timestamp() + 60);
        payload["http://schemas.microsoft.com/ws/2008/06/identity/claims/role"] =
            serde_json::json!(["Agency", "Customer"]);
        let identity = Identity::from_token(&token_with(&payload), now);

        assert!(identity.is_agency);
        assert!(!identity.is_admin);
        assert!(identity.is_staff());
    }

    #[test]
    fn test_short_claim_names() {
        let now = Utc::now();
        let payload = serde_json::json!({"sub": 8, "role": "admin", "email": "ops@example.com"});
        let identity = Identity::from_token(&token_with(&payload), now);

        assert!(identity.is_admin);
        assert_eq!(identity.user_id, Some(UserId::new(8)));
        assert_eq!(identity.expires_at, None);
    }

    #[test]
    fn test_uri_and_short_names_together() {
        let now = Utc::now();
        let mut payload = claims("17", "Agency", now.timestamp() + 600);
        payload["sub"] = serde_json::json!("99");
        payload["unique_name"] = serde_json::json!("shortname");
        payload["email"] = serde_json::json!("short@example.com");
        payload["role"] = serde_json::json!("Customer");
        let identity = Identity::from_token(&token_with(&payload), now);

        assert!(identity.is_authenticated);
        assert!(identity.is_agency);
        assert_eq!(identity.user_id, Some(UserId::new(17)));
        assert_eq!(identity.username.as_deref(), Some("printfan"));
        assert_eq!(identity.email.as_deref(), Some("fan@example.com"));
    }

    #[test]
    fn test_malformed_tokens_are_anonymous() {
        let now = Utc::now();
        for token in ["", "abc", "a.b", "a.!!!.c", "a.b.c.d"] {
            assert_eq!(Identity::from_token(token, now), Identity::default(), "{token}");
        }
        let not_json = format!("x.{}.y", URL_SAFE_NO_PAD.encode("not json"));
        assert!(!Identity::from_token(&not_json, now).is_authenticated);
    }

    #[test]
    fn test_non_numeric_user_id_is_anonymous() {
        let now = Utc::now();
        let token = token_with(&claims("abc", "Customer", now.timestamp() + 60));
        assert!(!Identity::from_token(&token, now).is_authenticated);
    }

    #[test]
    fn test_padded_payload_accepted() {
        let now = Utc::now();
        let token = token_with(&claims("3", "Customer", now.timestamp() + 60));
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[1].push_str("==");
        let padded = parts.join(".");
        assert!(Identity::from_token(&padded, now).is_authenticated);
    }
}
