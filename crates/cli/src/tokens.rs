//! Token file persistence.
//!
//! The CLI keeps one [`Session`] per process. Its tokens are read from a JSON
//! file on start and written back whenever the session reports a change, so
//! a refresh performed during one command is kept for the next.
//!
//! # Environment Variables
//!
//! - `COPYHUB_TOKEN_FILE` - Token file path (default: `$HOME/.copyhub/tokens.json`)

use std::io;
use std::path::{Path, PathBuf};

use copyhub_client::{Session, TokenPair};
use thiserror::Error;

const TOKEN_FILE_ENV: &str = "COPYHUB_TOKEN_FILE";

#[derive(Debug, Error)]
pub enum TokenFileError {
    #[error("Cannot locate the token file: set {TOKEN_FILE_ENV} or HOME")]
    NoLocation,

    #[error("Token file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Token file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the tokens of this user live.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the token file from the environment.
    pub fn from_env() -> Result<Self, TokenFileError> {
        if let Some(path) = std::env::var_os(TOKEN_FILE_ENV).filter(|p| !p.is_empty()) {
            return Ok(Self::new(path));
        }
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .ok_or(TokenFileError::NoLocation)?;
        Ok(Self::new(
            Path::new(&home).join(".copyhub").join("tokens.json"),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored tokens. A missing file means signed out.
    pub fn load(&self) -> Result<TokenPair, TokenFileError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TokenPair::default()),
            Err(source) => return Err(self.io_error(source)),
        };
        serde_json::from_slice(&raw).map_err(|source| TokenFileError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the tokens, or delete the file when there are none.
    pub fn save(&self, tokens: &TokenPair) -> Result<(), TokenFileError> {
        if tokens.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(self.io_error(e)),
                _ => Ok(()),
            };
        }

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        let body = serde_json::to_vec_pretty(tokens).map_err(|source| TokenFileError::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, body).map_err(|e| self.io_error(e))?;
        restrict_permissions(&self.path).map_err(|e| self.io_error(e))?;
        tracing::debug!(path = %self.path.display(), "Saved tokens");
        Ok(())
    }

    /// Restore a session from the file.
    pub fn session(&self) -> Result<Session, TokenFileError> {
        Ok(Session::from_tokens(self.load()?))
    }

    /// Write the session back if its tokens changed.
    pub async fn persist(&self, session: &Session) -> Result<(), TokenFileError> {
        if session.take_dirty() {
            self.save(&session.snapshot().await)?;
        }
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> TokenFileError {
        TokenFileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
