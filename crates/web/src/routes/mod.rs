//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                  - Home page (top rated agencies)
//! GET  /health                            - Health check
//!
//! # Agencies
//! GET  /agencies                          - Agency listing (?q= filters by name or city)
//! GET  /agencies/{id}                     - Profile, price list, map, comments
//! POST /agencies/{id}/comments            - Add a rated comment (signed in)
//!
//! # Order configurator (HTMX fragments)
//! GET  /agencies/{id}/order               - Configurator page
//! POST /agencies/{id}/order/files         - Upload PDFs (multipart)
//! POST /agencies/{id}/order/files/{index}/remove - Remove one file
//! POST /agencies/{id}/order/files/clear   - Remove all files
//! POST /agencies/{id}/order/options       - Paper, color, sides, copies
//! POST /agencies/{id}/order/checkout      - Create order, redirect to hosted checkout
//!
//! # Checkout landings
//! GET  /checkout/success                  - Payment done, countdown to /account
//! GET  /checkout/cancel                   - Payment canceled, countdown to /account
//!
//! # Auth
//! GET  /auth/login                        - Login page
//! POST /auth/login                        - Login action
//! GET  /auth/register                     - Register page
//! POST /auth/register                     - Register action
//! GET  /auth/forgot-password              - Request a reset email
//! POST /auth/forgot-password
//! GET  /auth/reset-password               - Set a new password (?email=&token=)
//! POST /auth/reset-password
//! POST /auth/google                       - Google id token sign-in
//! POST /auth/logout                       - Logout action
//!
//! # Account (requires auth)
//! GET  /account                           - Profile and order history
//! POST /account/profile                   - Update profile
//! GET  /account/orders/{code}             - Order detail with pickup code
//! POST /account/orders/{code}/cancel      - Cancel an order
//! GET  /files/{id}                        - Download an order file
//!
//! # Back office (agency or admin)
//! GET  /manage                            - Analytics dashboard
//! GET  /manage/orders                     - Orders with state controls (?state=)
//! POST /manage/orders/{code}/state        - Change state
//! POST /manage/orders/{code}/complete     - Hand over with the pickup code
//! GET  /manage/products                   - Agency price list
//! POST /manage/products                   - Price a catalog product
//! POST /manage/products/{id}              - Change a price
//! POST /manage/products/{id}/delete       - Remove a priced product
//! GET  /manage/catalog                    - Catalog (admin)
//! POST /manage/catalog                    - Add a catalog product (admin)
//! POST /manage/catalog/{id}/delete        - Remove a catalog product (admin)
//! GET  /manage/agencies                   - Approval queue (admin)
//! POST /manage/agencies/{id}/approve      - Approve (admin)
//! POST /manage/agencies/{id}/reject       - Reject (admin)
//! ```

pub mod account;
pub mod agencies;
pub mod auth;
pub mod checkout;
pub mod files;
pub mod home;
pub mod manage;
pub mod order;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use copyhub_client::{ApiError, Identity};
use tower_sessions::Session;

use crate::error::{AppError, Result};
use crate::middleware::{
    CspNonce, Flash, Visitor, auth_rate_limiter, set_flash, take_flash, upload_rate_limiter,
};
use crate::state::AppState;

/// Largest multipart body accepted by the upload route.
pub const MAX_UPLOAD_BODY_BYTES: usize = 200 * 1024 * 1024;

// =============================================================================
// Shared view data
// =============================================================================

/// Navigation bar state.
#[derive(Debug, Clone, Default)]
pub struct NavView {
    pub signed_in: bool,
    pub is_staff: bool,
    pub is_admin: bool,
    pub name: String,
}

impl From<&Identity> for NavView {
    fn from(identity: &Identity) -> Self {
        Self {
            signed_in: identity.is_authenticated,
            is_staff: identity.is_staff(),
            is_admin: identity.is_admin,
            name: identity.display_name().to_string(),
        }
    }
}

/// Data every full page needs for `base.html`.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub nav: NavView,
    pub flash: Option<Flash>,
    pub nonce: String,
}

impl Layout {
    /// Build the layout, consuming any pending flash message.
    pub async fn new(visitor: &Visitor, session: &Session, CspNonce(nonce): CspNonce) -> Self {
        Self {
            nav: NavView::from(&visitor.identity),
            flash: take_flash(session).await,
            nonce,
        }
    }
}

/// Whether the request was made by htmx and expects a fragment.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .is_some_and(|value| value.as_bytes() == b"true")
}

/// Local path to return to after sign-in; anything else goes home.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') =>
        {
            path
        }
        _ => "/",
    }
}

/// Store a flash message and redirect.
pub async fn flash_redirect(session: &Session, flash: Flash, to: &str) -> Response {
    if let Err(e) = set_flash(session, flash).await {
        tracing::warn!(error = %e, "Could not store flash message");
    }
    Redirect::to(to).into_response()
}

/// Report a failed form action back on the form page.
///
/// Validation and business-rule failures become a flash message on `back`.
/// Failures that need a sign-in or that are not the visitor's fault keep
/// their usual error response.
///
/// # Errors
///
/// Returns the error when it is not something the visitor can fix.
pub async fn form_failure(session: &Session, err: ApiError, back: &str) -> Result<Response> {
    let err = AppError::from(err);
    let visitor_can_fix = match &err {
        AppError::Api(api) => !api.is_auth_failure() && !err.is_server_error(),
        _ => false,
    };
    if !visitor_can_fix {
        return Err(err);
    }
    Ok(flash_redirect(session, Flash::error(err.public_message()), back).await)
}

// =============================================================================
// Routers
// =============================================================================

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route(
            "/forgot-password",
            get(auth::forgot_password_page).post(auth::forgot_password),
        )
        .route(
            "/reset-password",
            get(auth::reset_password_page).post(auth::reset_password),
        )
        .route("/google", post(auth::google))
        .layer(auth_rate_limiter())
        // Logout is never limited
        .route("/logout", post(auth::logout))
}

/// Create the agency routes router, including the order configurator.
pub fn agency_routes() -> Router<AppState> {
    let uploads = Router::new()
        .route("/{id}/order/files", post(order::upload))
        .route("/{id}/order/checkout", post(order::checkout))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .layer(upload_rate_limiter());

    Router::new()
        .route("/", get(agencies::index))
        .route("/{id}", get(agencies::show))
        .route("/{id}/comments", post(agencies::add_comment))
        .route("/{id}/order", get(order::show))
        .route("/{id}/order/files/{index}/remove", post(order::remove_file))
        .route("/{id}/order/files/clear", post(order::clear_files))
        .route("/{id}/order/options", post(order::set_options))
        .merge(uploads)
}

/// Create the checkout landing routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/success", get(checkout::success))
        .route("/cancel", get(checkout::cancel))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/profile", post(account::update_profile))
        .route("/orders/{code}", get(account::order))
        .route("/orders/{code}/cancel", post(account::cancel_order))
}

/// Create all routes for the web app.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/agencies", agency_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
        .route("/files/{id}", get(files::download))
        .nest("/manage", manage::routes())
}
