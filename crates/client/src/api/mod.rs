//! Typed services over the backend REST API.
//!
//! One method per endpoint, split by resource:
//! - `auth` - sign-in, registration, refresh, password recovery
//! - `users` - profiles, agencies, approval and comments
//! - `products` - catalog and agency price lists
//! - `orders` - order creation, listing, state transitions and analytics
//! - `files` - order file downloads
//! - `checkout` - hosted checkout sessions

mod auth;
mod checkout;
mod files;
mod orders;
mod products;
mod users;

pub use checkout::checkout_redirect_url;
pub use orders::{MISSING_EMAIL_MESSAGE, reword_order_error};

pub(crate) use crate::error::ApiError;
pub(crate) use crate::http::{ApiClient, ApiRequest};
