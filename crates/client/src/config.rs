//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COPYHUB_API_URL` - Base URL of the CopyHub backend (e.g. `https://api.copyhub.example/api/`)
//!
//! ## Optional
//! - `PAYMENT_PUBLISHABLE_KEY` - Hosted payment publishable key
//! - `PAYMENT_CHECKOUT_URL` - Hosted checkout base URL (default: `https://checkout.stripe.com/c/pay/`)
//! - `MAP_TILES_API_KEY` - Map tile API key for agency location maps
//! - `COPYHUB_HTTP_TIMEOUT_SECS` - Request timeout (default: 30)
//! - `COPYHUB_MAX_RETRIES` - Retries for idempotent requests (default: 3)
//! - `COPYHUB_RETRY_BASE_MS` - Initial backoff delay (default: 250)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default hosted checkout page; the session id is appended.
pub const DEFAULT_CHECKOUT_URL: &str = "https://checkout.stripe.com/c/pay/";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Backoff settings for idempotent requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each subsequent retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// No retries at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// Configuration for talking to the CopyHub backend.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ApiConfig {
    /// Backend base URL. Always ends with `/` so relative paths join under it.
    pub base_url: Url,
    /// Hosted payment publishable key (safe to expose in browser)
    pub payment_publishable_key: Option<String>,
    /// Hosted checkout base URL
    pub checkout_url: Url,
    /// Map tile API key
    pub map_tiles_api_key: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy for idempotent requests
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("payment_publishable_key", &self.payment_publishable_key)
            .field("checkout_url", &self.checkout_url.as_str())
            .field(
                "map_tiles_api_key",
                &self.map_tiles_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ApiConfig {
    /// Build a configuration for a backend URL with defaults for everything else.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("COPYHUB_API_URL", base_url)?,
            payment_publishable_key: None,
            checkout_url: parse_base_url("PAYMENT_CHECKOUT_URL", DEFAULT_CHECKOUT_URL)?,
            map_tiles_api_key: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = get_required_env("COPYHUB_API_URL")?;
        let mut config = Self::new(&base_url)?;

        config.payment_publishable_key = get_optional_env("PAYMENT_PUBLISHABLE_KEY");
        if let Some(checkout) = get_optional_env("PAYMENT_CHECKOUT_URL") {
            config.checkout_url = parse_base_url("PAYMENT_CHECKOUT_URL", &checkout)?;
        }
        config.map_tiles_api_key = get_optional_env("MAP_TILES_API_KEY").map(SecretString::from);
        config.timeout = Duration::from_secs(get_parsed_env("COPYHUB_HTTP_TIMEOUT_SECS", 30)?);
        config.retry = RetryPolicy {
            max_retries: get_parsed_env("COPYHUB_MAX_RETRIES", 3)?,
            base_delay: Duration::from_millis(get_parsed_env("COPYHUB_RETRY_BASE_MS", 250)?),
        };

        Ok(config)
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a base URL, appending a trailing slash so `Url::join` keeps the path.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let with_slash = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    Url::parse(&with_slash).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get and parse an environment variable with a default value.
fn get_parsed_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = ApiConfig::new("https://api.copyhub.test/api").unwrap();
        assert_eq!(config.base_url.as_str(), "https://api.copyhub.test/api/");
        assert_eq!(
            config.base_url.join("orders/mine").unwrap().as_str(),
            "https://api.copyhub.test/api/orders/mine"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ApiConfig::new("not a url").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "COPYHUB_API_URL"));
    }

    #[test]
    fn test_retry_delays_double() {
        let retry = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(retry.delay_for(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_debug_redacts_map_key() {
        let mut config = ApiConfig::new("https://api.copyhub.test").unwrap();
        config.map_tiles_api_key = Some(SecretString::from("tile-key-123"));
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("tile-key-123"));
    }
}
