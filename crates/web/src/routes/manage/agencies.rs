//! Agency approval queue (admin).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::Response,
};
use copyhub_core::{Agency, AgencyId};
use tower_sessions::Session;
use tracing::instrument;

use super::ManageNav;
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, Flash, RequireAdmin};
use crate::routes::{Layout, flash_redirect, form_failure};
use crate::state::AppState;

const BACK: &str = "/manage/agencies";

#[derive(Debug, Clone)]
pub struct PendingAgencyView {
    pub id: AgencyId,
    pub name: String,
    pub address: String,
    pub bio: String,
}

impl From<&Agency> for PendingAgencyView {
    fn from(agency: &Agency) -> Self {
        Self {
            id: agency.id,
            name: agency.name.clone(),
            address: format!("{}, {}", agency.location.address, agency.location.city),
            bio: agency.bio.clone(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "manage/agencies.html")]
pub struct PendingTemplate {
    pub layout: Layout,
    pub nav: ManageNav,
    pub agencies: Vec<PendingAgencyView>,
}

/// Display agencies waiting for approval.
#[instrument(skip(state, visitor, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(visitor): RequireAdmin,
    session: Session,
    nonce: CspNonce,
) -> Result<PendingTemplate> {
    let pending = state.api().list_pending_agencies(&visitor.session).await?;
    Ok(PendingTemplate {
        nav: ManageNav::new(&visitor, "agencies"),
        agencies: pending.iter().map(PendingAgencyView::from).collect(),
        layout: Layout::new(&visitor, &session, nonce).await,
    })
}

/// Approve an agency.
#[instrument(skip(state, visitor, session), fields(agency_id = %id))]
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<AgencyId>,
    RequireAdmin(visitor): RequireAdmin,
    session: Session,
) -> Result<Response> {
    match state.api().approve_agency(&visitor.session, id).await {
        Ok(()) => Ok(flash_redirect(&session, Flash::success("Agency approved."), BACK).await),
        Err(e) => form_failure(&session, e, BACK).await,
    }
}

/// Reject an agency.
#[instrument(skip(state, visitor, session), fields(agency_id = %id))]
pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<AgencyId>,
    RequireAdmin(visitor): RequireAdmin,
    session: Session,
) -> Result<Response> {
    match state.api().reject_agency(&visitor.session, id).await {
        Ok(()) => Ok(flash_redirect(&session, Flash::success("Agency rejected."), BACK).await),
        Err(e) => form_failure(&session, e, BACK).await,
    }
}
