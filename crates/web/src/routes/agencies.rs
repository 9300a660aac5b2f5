//! Agency listing, profile and comments.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Response,
};
use copyhub_core::{Agency, AgencyId, AgencyProduct, Comment, format_money};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::{Layout, flash_redirect, form_failure};
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, Flash, RequireAuth, Visitor};
use crate::state::AppState;

/// Characters of the bio shown on listing cards.
const BIO_EXCERPT_CHARS: usize = 160;

// =============================================================================
// Views
// =============================================================================

/// Agency card for listings.
#[derive(Debug, Clone)]
pub struct AgencyCardView {
    pub id: AgencyId,
    pub name: String,
    pub city: String,
    pub excerpt: String,
    pub stars: u8,
    pub rating: String,
    pub review_count: usize,
    pub from_price: Option<String>,
}

impl From<&Agency> for AgencyCardView {
    fn from(agency: &Agency) -> Self {
        Self {
            id: agency.id,
            name: agency.name.clone(),
            city: agency.location.city.clone(),
            excerpt: excerpt(&agency.bio, BIO_EXCERPT_CHARS),
            stars: agency.stars(),
            rating: format!("{:.1}", agency.rating),
            review_count: agency.comments.len(),
            from_price: agency
                .products
                .iter()
                .map(|product| product.price)
                .min()
                .map(format_money),
        }
    }
}

/// One row of an agency's price list.
#[derive(Debug, Clone)]
pub struct PriceRowView {
    pub paper: &'static str,
    pub color: &'static str,
    pub sides: &'static str,
    pub price: String,
}

impl From<&AgencyProduct> for PriceRowView {
    fn from(product: &AgencyProduct) -> Self {
        Self {
            paper: product.paper_type.label(),
            color: product.color_option.label(),
            sides: product.print_type.label(),
            price: format_money(product.price),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub author: String,
    pub stars: u8,
    pub text: String,
    pub date: String,
}

impl From<&Comment> for CommentView {
    fn from(comment: &Comment) -> Self {
        Self {
            author: comment.author_name.clone(),
            stars: comment.rating.min(5),
            text: comment.text.clone(),
            date: comment.created_at.format("%b %-d, %Y").to_string(),
        }
    }
}

/// Map marker data; the tile key is public by nature.
#[derive(Debug, Clone)]
pub struct MapView {
    pub latitude: f64,
    pub longitude: f64,
    pub tiles_url: String,
}

impl MapView {
    fn new(agency: &Agency, tiles_key: Option<&str>) -> Option<Self> {
        let (latitude, longitude) = agency.location.coordinates()?;
        let tiles_url = tiles_key.map_or_else(
            || "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            |key| format!("https://api.maptiler.com/maps/streets-v2/{{z}}/{{x}}/{{y}}.png?key={key}"),
        );
        Some(Self {
            latitude,
            longitude,
            tiles_url,
        })
    }
}

/// Collapse whitespace and cut at a word boundary.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    let trimmed = cut.rsplit_once(' ').map_or(cut.as_str(), |(head, _)| head);
    format!("{trimmed}…")
}

/// Case-insensitive match on name or city.
fn matches_query(agency: &Agency, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty()
        || agency.name.to_lowercase().contains(&query)
        || agency.location.city.to_lowercase().contains(&query)
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "agencies/index.html")]
pub struct AgencyIndexTemplate {
    pub layout: Layout,
    pub agencies: Vec<AgencyCardView>,
    pub query: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "agencies/show.html")]
pub struct AgencyShowTemplate {
    pub layout: Layout,
    pub agency: AgencyCardView,
    pub bio: String,
    pub address: String,
    pub prices: Vec<PriceRowView>,
    pub comments: Vec<CommentView>,
    pub map: Option<MapView>,
    pub can_comment: bool,
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
}

/// Display approved agencies.
#[instrument(skip(state, visitor, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    visitor: Visitor,
    session: Session,
    nonce: CspNonce,
    Query(query): Query<ListQuery>,
) -> Result<AgencyIndexTemplate> {
    let query = query.q.unwrap_or_default();
    let mut agencies = state.api().list_agencies(&visitor.session).await?;
    agencies.retain(|agency| matches_query(agency, &query));
    agencies.sort_by(|a, b| b.rating.total_cmp(&a.rating).then_with(|| a.name.cmp(&b.name)));

    Ok(AgencyIndexTemplate {
        layout: Layout::new(&visitor, &session, nonce).await,
        agencies: agencies.iter().map(AgencyCardView::from).collect(),
        query,
    })
}

/// Display an agency profile.
#[instrument(skip(state, visitor, session, nonce), fields(agency_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<AgencyId>,
    visitor: Visitor,
    session: Session,
    nonce: CspNonce,
) -> Result<AgencyShowTemplate> {
    let api = state.api();
    let agency = api.get_agency(&visitor.session, id).await?;
    let comments = match api.list_comments(&visitor.session, id).await {
        Ok(comments) => comments,
        Err(e) => {
            tracing::warn!(error = %e, "Comment list unavailable, using embedded comments");
            agency.comments.clone()
        }
    };
    let products = if agency.products.is_empty() {
        api.list_agency_products(&visitor.session, id).await?
    } else {
        agency.products.clone()
    };
    let tiles_key = state.config().api.map_tiles_api_key.as_ref();

    Ok(AgencyShowTemplate {
        agency: AgencyCardView::from(&agency),
        bio: agency.bio.clone(),
        address: format!("{}, {}", agency.location.address, agency.location.city),
        prices: products.iter().map(PriceRowView::from).collect(),
        comments: comments.iter().map(CommentView::from).collect(),
        map: MapView::new(&agency, tiles_key.map(|key| key.expose_secret())),
        can_comment: visitor.identity.is_authenticated,
        layout: Layout::new(&visitor, &session, nonce).await,
    })
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub rating: u8,
    pub text: String,
}

/// Post a comment and return to the profile.
#[instrument(skip(state, visitor, session, form), fields(agency_id = %id))]
pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<AgencyId>,
    RequireAuth(visitor): RequireAuth,
    session: Session,
    Form(form): Form<CommentForm>,
) -> Result<Response> {
    let back = format!("/agencies/{id}#comments");
    let comment = copyhub_client::types::NewComment {
        rating: form.rating,
        text: form.text.trim().to_string(),
    };

    match state.api().add_comment(&visitor.session, id, &comment).await {
        Ok(_) => Ok(flash_redirect(&session, Flash::success("Thanks for your review!"), &back).await),
        Err(e) => form_failure(&session, e, &back).await,
    }
}
