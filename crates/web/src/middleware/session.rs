//! Server-side session for configurator drafts and flash messages.
//!
//! Backend auth lives in the token cookies (see [`super::api_session`]); this
//! session only holds browsing state that never leaves the web app. It is an
//! in-memory store, so drafts do not survive a restart.

use copyhub_client::OrderConfigurator;
use copyhub_core::AgencyId;
use serde::{Deserialize, Serialize};
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::config::WebConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "copyhub_session";

/// Session expiry time in seconds (1 day of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Keys used in the server-side session.
pub mod session_keys {
    use copyhub_core::AgencyId;

    /// One-shot message shown on the next page.
    pub const FLASH: &str = "flash";

    /// Configurator draft for one agency.
    #[must_use]
    pub fn order_draft(agency_id: AgencyId) -> String {
        format!("order_draft:{agency_id}")
    }
}

/// Create the session layer with the in-memory store.
#[must_use]
pub fn create_session_layer(config: &WebConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

// =============================================================================
// Flash messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashKind {
    Success,
    Error,
}

/// A message carried across one redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// CSS modifier for templates.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self.kind {
            FlashKind::Success => "flash-success",
            FlashKind::Error => "flash-error",
        }
    }
}

/// Queue a flash message for the next page view.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_flash(session: &Session, flash: Flash) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::FLASH, flash).await
}

/// Take the pending flash message, if any.
pub async fn take_flash(session: &Session) -> Option<Flash> {
    session
        .remove::<Flash>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
}

// =============================================================================
// Configurator drafts
// =============================================================================

/// Load the configurator draft for an agency.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_draft(
    session: &Session,
    agency_id: AgencyId,
) -> Result<Option<OrderConfigurator>, tower_sessions::session::Error> {
    session.get(&session_keys::order_draft(agency_id)).await
}

/// Store the configurator draft for its agency.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_draft(
    session: &Session,
    draft: &OrderConfigurator,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(&session_keys::order_draft(draft.agency_id()), draft)
        .await
}

/// Drop the configurator draft for an agency, returning it.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn remove_draft(
    session: &Session,
    agency_id: AgencyId,
) -> Result<Option<OrderConfigurator>, tower_sessions::session::Error> {
    session.remove(&session_keys::order_draft(agency_id)).await
}
