//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;
use tracing::instrument;

use super::Layout;
use super::agencies::AgencyCardView;
use crate::filters;
use crate::middleware::{CspNonce, Visitor};
use crate::state::AppState;

/// Agencies featured on the home page.
const FEATURED_AGENCIES: usize = 6;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub featured: Vec<AgencyCardView>,
    pub is_agency: bool,
}

/// Display the home page.
///
/// The page still renders when the backend is down, just without agencies.
#[instrument(skip(state, visitor, session, nonce))]
pub async fn home(
    State(state): State<AppState>,
    visitor: Visitor,
    session: Session,
    nonce: CspNonce,
) -> HomeTemplate {
    let featured = match state.api().list_agencies(&visitor.session).await {
        Ok(mut agencies) => {
            agencies.sort_by(|a, b| b.rating.total_cmp(&a.rating));
            agencies
                .iter()
                .take(FEATURED_AGENCIES)
                .map(AgencyCardView::from)
                .collect()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load featured agencies");
            Vec::new()
        }
    };

    HomeTemplate {
        is_agency: visitor.identity.is_agency,
        layout: Layout::new(&visitor, &session, nonce).await,
        featured,
    }
}
