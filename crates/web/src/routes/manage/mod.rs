//! Back office for agencies and admins.
//!
//! Agencies manage their own price list and orders; admins see every order,
//! curate the catalog and approve new agencies. Role checks happen in the
//! extractors, and the backend enforces them again.

pub mod agencies;
pub mod catalog;
pub mod dashboard;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};
use copyhub_core::AgencyId;

use super::account::user_id;
use crate::error::{AppError, Result};
use crate::middleware::Visitor;
use crate::state::AppState;

/// Side navigation state.
#[derive(Debug, Clone)]
pub struct ManageNav {
    pub current: &'static str,
    pub is_admin: bool,
    pub is_agency: bool,
}

impl ManageNav {
    #[must_use]
    pub const fn new(visitor: &Visitor, current: &'static str) -> Self {
        Self {
            current,
            is_admin: visitor.identity.is_admin,
            is_agency: visitor.identity.is_agency,
        }
    }
}

/// Agency managed by the signed-in agency user.
pub(crate) async fn own_agency(state: &AppState, visitor: &Visitor) -> Result<AgencyId> {
    let user = state
        .api()
        .get_user(&visitor.session, user_id(visitor)?)
        .await?;
    user.agency_id
        .ok_or_else(|| AppError::Forbidden("no agency is linked to this account".to_string()))
}

/// Create the back office router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .route("/orders", get(orders::index))
        .route("/orders/{code}/state", post(orders::set_state))
        .route("/orders/{code}/complete", post(orders::complete))
        .route("/products", get(products::index).post(products::create))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/delete", post(products::delete))
        .route("/catalog", get(catalog::index).post(catalog::create))
        .route("/catalog/{id}/delete", post(catalog::delete))
        .route("/agencies", get(agencies::index))
        .route("/agencies/{id}/approve", post(agencies::approve))
        .route("/agencies/{id}/reject", post(agencies::reject))
}
