//! Command implementations.
//!
//! Every command runs against one [`Context`]: the API client, the session
//! restored from the token file and the file to write it back to.

pub mod agencies;
pub mod auth;
pub mod orders;
pub mod quote;

use copyhub_client::{ApiClient, ApiConfig, ApiError, ConfigError, Identity, Session};
use thiserror::Error;

use crate::tokens::{TokenFile, TokenFileError};

/// Errors that can end a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    TokenFile(#[from] TokenFileError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("Not signed in. Run `copyhub login` first.")]
    SignedOut,
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Shared state for one command run.
pub struct Context {
    pub api: ApiClient,
    pub session: Session,
    tokens: TokenFile,
}

impl Context {
    /// Load the client configuration and the stored session.
    pub fn load() -> Result<Self> {
        let api = ApiClient::new(ApiConfig::from_env()?)?;
        let tokens = TokenFile::from_env()?;
        let session = tokens.session()?;
        tracing::debug!(token_file = %tokens.path().display(), "Session restored");
        Ok(Self {
            api,
            session,
            tokens,
        })
    }

    /// The current identity, renewing an expired access token first.
    ///
    /// A rejected refresh signs the session out.
    pub async fn identity(&self) -> Identity {
        if self.session.needs_refresh().await
            && let Err(e) = self.api.refresh(&self.session).await
        {
            tracing::warn!(error = %e, "Stored session could not be renewed");
            self.session.sign_out().await;
        }
        self.session.identity_check().await
    }

    /// The identity of a signed-in user.
    pub async fn require_identity(&self) -> Result<Identity> {
        let identity = self.identity().await;
        if identity.is_authenticated {
            Ok(identity)
        } else {
            Err(CliError::SignedOut)
        }
    }

    /// Write changed tokens back to the token file.
    pub async fn persist(&self) -> Result<()> {
        self.tokens.persist(&self.session).await?;
        Ok(())
    }
}
