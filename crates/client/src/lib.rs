//! CopyHub Client - Consumer of the CopyHub backend REST API.
//!
//! # Architecture
//!
//! The backend owns all authoritative state. This crate only shapes requests,
//! types responses and keeps the little client-side state there is:
//!
//! - [`session`] - access/refresh tokens and the identity decoded from them
//! - [`ApiClient`] - bearer auth, error normalization, retry with backoff and
//!   one refresh-and-retry on authentication failures
//! - `api` - one method per backend endpoint, split by resource
//! - [`cache`] - 5-minute response cache with optimistic deletes
//! - [`configurator`] - print job draft, live quote and submission checks
//! - [`pdf`] - page counting for uploads
//!
//! # Example
//!
//! ```rust,ignore
//! use copyhub_client::{ApiClient, ApiConfig, Session};
//!
//! let client = ApiClient::new(ApiConfig::from_env()?)?;
//! let session = Session::anonymous();
//! client.login(&session, "fan@example.com", "hunter2").await?;
//! let orders = client.list_my_orders(&session).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod api;
pub mod cache;
pub mod config;
pub mod configurator;
mod error;
mod http;
pub mod pdf;
pub mod session;
pub mod types;

pub use api::{MISSING_EMAIL_MESSAGE, checkout_redirect_url, reword_order_error};
pub use cache::ApiCache;
pub use config::{ApiConfig, ConfigError, RetryPolicy};
pub use configurator::{BlockReason, OrderConfigurator, UploadedFile};
pub use error::ApiError;
pub use http::{ApiClient, FileUpload};
pub use pdf::{PdfError, count_pages};
pub use session::{Identity, Session, SessionWatcher, TokenPair};
pub use types::StateChange;
