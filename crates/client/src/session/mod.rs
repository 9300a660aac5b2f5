//! Token holder and derived identity.
//!
//! A [`Session`] owns the access and refresh tokens for one visitor. The
//! tokens are the only persisted client state; everything else is derived
//! from the access token's claims. Every change is published on a
//! `tokio::sync::watch` channel so views can follow sign-in and sign-out.
//!
//! The web app builds one session per request from cookies and writes the
//! cookies back when [`Session::take_dirty`] reports a change. The CLI keeps
//! one session for the process and persists it to a token file.

mod claims;
mod watcher;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock, watch};

pub use claims::{Claims, Identity, TokenError};
pub use watcher::SessionWatcher;

#[cfg(test)]
pub(crate) use claims::tests::{claims as test_claims, token_with as test_token};

/// Access and refresh tokens as issued by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

#[derive(Default)]
struct Tokens {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
}

/// The tokens and derived identity of one visitor.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    tokens: RwLock<Tokens>,
    identity: watch::Sender<Identity>,
    dirty: AtomicBool,
    /// Held for the whole of a token refresh so a refresh token is spent once.
    refreshing: Mutex<()>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &*self.inner.identity.borrow())
            .field("dirty", &self.inner.dirty.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

fn non_blank(token: Option<String>) -> Option<SecretString> {
    token
        .filter(|t| !t.trim().is_empty())
        .map(SecretString::from)
}

fn derive_identity(access: Option<&SecretString>) -> Identity {
    access.map_or_else(Identity::default, |token| {
        Identity::from_token(token.expose_secret(), Utc::now())
    })
}

impl Session {
    /// A session with no tokens.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::from_tokens(TokenPair::default())
    }

    /// Restore a session from persisted tokens. Blank tokens are ignored.
    #[must_use]
    pub fn from_tokens(pair: TokenPair) -> Self {
        let tokens = Tokens {
            access: non_blank(pair.access_token),
            refresh: non_blank(pair.refresh_token),
        };
        let identity = derive_identity(tokens.access.as_ref());
        let (sender, _) = watch::channel(identity);

        Self {
            inner: Arc::new(SessionInner {
                tokens: RwLock::new(tokens),
                identity: sender,
                dirty: AtomicBool::new(false),
                refreshing: Mutex::new(()),
            }),
        }
    }

    /// The identity as of the last change.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.inner.identity.borrow().clone()
    }

    /// Follow identity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Identity> {
        self.inner.identity.subscribe()
    }

    pub async fn access_token(&self) -> Option<SecretString> {
        self.inner.tokens.read().await.access.clone()
    }

    pub async fn refresh_token(&self) -> Option<SecretString> {
        self.inner.tokens.read().await.refresh.clone()
    }

    /// Wait for any refresh in flight and claim the right to refresh.
    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.inner.refreshing.lock().await
    }

    /// Store freshly issued tokens. A missing refresh token keeps the old one.
    pub async fn store_tokens(&self, access: String, refresh: Option<String>) {
        let identity = {
            let mut tokens = self.inner.tokens.write().await;
            tokens.access = non_blank(Some(access));
            if let Some(refresh) = non_blank(refresh) {
                tokens.refresh = Some(refresh);
            }
            derive_identity(tokens.access.as_ref())
        };

        self.inner.dirty.store(true, Ordering::Release);
        self.inner.identity.send_replace(identity);
    }

    /// Re-derive the identity from the current access token.
    ///
    /// Publishes only when the identity actually changed, e.g. because the
    /// token expired since the last check.
    pub async fn identity_check(&self) -> Identity {
        let identity = derive_identity(self.inner.tokens.read().await.access.as_ref());
        self.inner.identity.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity.clone();
                true
            }
        });
        identity
    }

    /// Whether the access token has lapsed but a refresh token could renew it.
    pub async fn needs_refresh(&self) -> bool {
        let tokens = self.inner.tokens.read().await;
        tokens.refresh.is_some() && !derive_identity(tokens.access.as_ref()).is_authenticated
    }

    /// Clear both tokens and reset the identity.
    pub async fn sign_out(&self) {
        *self.inner.tokens.write().await = Tokens::default();
        self.inner.dirty.store(true, Ordering::Release);
        self.inner.identity.send_replace(Identity::default());
        tracing::debug!("Session signed out");
    }

    /// Current tokens, for persistence.
    pub async fn snapshot(&self) -> TokenPair {
        let tokens = self.inner.tokens.read().await;
        TokenPair {
            access_token: tokens.access.as_ref().map(|t| t.expose_secret().to_owned()),
            refresh_token: tokens.refresh.as_ref().map(|t| t.expose_secret().to_owned()),
        }
    }

    /// Whether the tokens changed since the last call.
    pub fn take_dirty(&self) -> bool {
        self.inner.dirty.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn live_token(user: &str, role: &str) -> String {
        test_token(&test_claims(user, role, Utc::now().timestamp() + 600))
    }

    #[tokio::test]
    async fn test_restore_from_tokens() {
        let session = Session::from_tokens(TokenPair {
            access_token: Some(live_token("4", "Customer")),
            refresh_token: Some("r1".to_string()),
        });

        assert!(session.identity().is_authenticated);
        assert!(!session.take_dirty());
        assert_eq!(session.snapshot().await.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_blank_tokens_ignored() {
        let session = Session::from_tokens(TokenPair {
            access_token: Some("   ".to_string()),
            refresh_token: Some(String::new()),
        });
        assert!(session.snapshot().await.is_empty());
        assert!(!session.identity().is_authenticated);
    }

    #[tokio::test]
    async fn test_store_tokens_publishes_identity() {
        let session = Session::anonymous();
        let mut rx = session.subscribe();

        session
            .store_tokens(live_token("9", "Agency"), Some("refresh".to_string()))
            .await;

        assert!(rx.has_changed().unwrap());
        let identity = rx.borrow_and_update().clone();
        assert!(identity.is_agency);
        assert!(session.take_dirty());
        assert!(!session.take_dirty());
    }

    #[tokio::test]
    async fn test_store_tokens_keeps_refresh_when_absent() {
        let session = Session::from_tokens(TokenPair {
            access_token: None,
            refresh_token: Some("keep-me".to_string()),
        });
        session.store_tokens(live_token("1", "Customer"), None).await;
        assert_eq!(session.snapshot().await.refresh_token.as_deref(), Some("keep-me"));
    }

    #[tokio::test]
    async fn test_sign_out_clears_everything() {
        let session = Session::from_tokens(TokenPair {
            access_token: Some(live_token("2", "Admin")),
            refresh_token: Some("r".to_string()),
        });
        let mut rx = session.subscribe();

        session.sign_out().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Identity::default());
        assert!(session.snapshot().await.is_empty());
        assert!(session.take_dirty());
    }

    #[tokio::test]
    async fn test_identity_check_notices_expiry() {
        let expired = test_token(&test_claims("2", "Customer", Utc::now().timestamp() - 5));
        let session = Session::from_tokens(TokenPair {
            access_token: Some(expired),
            refresh_token: Some("r".to_string()),
        });

        assert!(!session.identity_check().await.is_authenticated);
        assert!(session.needs_refresh().await);
    }

    #[tokio::test]
    async fn test_identity_check_is_quiet_when_unchanged() {
        let session = Session::from_tokens(TokenPair {
            access_token: Some(live_token("3", "Customer")),
            refresh_token: None,
        });
        let mut rx = session.subscribe();
        rx.borrow_and_update();

        session.identity_check().await;
        assert!(!rx.has_changed().unwrap());
        assert!(!session.needs_refresh().await);
    }
}
