//! HTTP middleware stack for the web app.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded in the request span)
//! 4. Security headers (CSP built with the nonce from step 5)
//! 5. CSP nonce (per-request nonce for inline scripts)
//! 6. Session layer (tower-sessions, in-memory: drafts and flash messages)
//! 7. Backend session (token cookies in, refreshed tokens out)
//! 8. Rate limiting on auth and upload routes (governor)

pub mod api_session;
pub mod auth;
pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use api_session::api_session_middleware;
pub use auth::{AuthRejection, RequireAdmin, RequireAuth, RequireStaff, Visitor};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use rate_limit::{auth_rate_limiter, upload_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{Flash, create_session_layer, set_flash, take_flash};
