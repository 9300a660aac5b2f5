//! Web configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WEB_BASE_URL` - Public URL of the site, used for checkout return links
//! - `COPYHUB_API_URL` - Backend REST API base URL
//!
//! ## Optional
//! - `WEB_HOST` - Bind address (default: 127.0.0.1)
//! - `WEB_PORT` - Listen port (default: 3000)
//! - `WEB_STATIC_DIR` - Static asset directory (default: crates/web/static)
//! - `GOOGLE_CLIENT_ID` - Enables the Google sign-in button
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Environment name reported to Sentry
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)
//! - everything read by [`ApiConfig::from_env`]

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use copyhub_client::ApiConfig;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error(transparent)]
    Api(#[from] copyhub_client::ConfigError),
}

/// Web application configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the site
    pub base_url: Url,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// OAuth client id for the Google sign-in button
    pub google_client_id: Option<String>,
    /// Backend API configuration
    pub api: ApiConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Share of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Share of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
}

impl WebConfig {
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

        let host = get_env_or_default("WEB_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("WEB_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("WEB_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("WEB_PORT".to_string(), e.to_string()))?;
        let base_url = parse_base_url(&get_required_env("WEB_BASE_URL")?)?;

        Ok(Self {
            host,
            port,
            base_url,
            static_dir: PathBuf::from(get_env_or_default("WEB_STATIC_DIR", "crates/web/static")),
            google_client_id: get_optional_env("GOOGLE_CLIENT_ID"),
            api: ApiConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_rate("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Configuration for a site at `base_url` talking to `api`, with
    /// defaults for everything else.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn new(base_url: &str, api: ApiConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: parse_base_url(base_url)?,
            static_dir: PathBuf::from("crates/web/static"),
            google_client_id: None,
            api,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    /// Absolute URL for a site path such as `/checkout/success`.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_or_else(|_| format!("{}{path}", self.base_url), String::from)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let with_slash = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    Url::parse(&with_slash)
        .map_err(|e| ConfigError::InvalidEnvVar("WEB_BASE_URL".to_string(), e.to_string()))
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a sample rate between 0 and 1.
fn get_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = raw
        .trim()
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("{rate} is not between 0 and 1"),
        ));
    }
    Ok(rate)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> WebConfig {
        let api = ApiConfig::new("http://127.0.0.1:5000/api").unwrap();
        WebConfig::new(base_url, api).unwrap()
    }

    #[test]
    fn test_socket_addr_defaults() {
        let config = config("http://localhost:3000");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_secure_follows_scheme() {
        assert!(!config("http://localhost:3000").is_secure());
        assert!(config("https://copyhub.example").is_secure());
    }

    #[test]
    fn test_absolute_url_joins_paths() {
        let config = config("https://copyhub.example/shop");
        assert_eq!(
            config.absolute_url("/checkout/success"),
            "https://copyhub.example/shop/checkout/success"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let api = ApiConfig::new("http://127.0.0.1:5000").unwrap();
        let err = WebConfig::new("not a url", api).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "WEB_BASE_URL"));
    }
}
