//! Order configurator route handlers.
//!
//! The draft job lives in the server-side session, one per agency, and every
//! change re-renders the configurator fragment for htmx. Without JavaScript
//! the same forms post normally and redirect back to the page.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use copyhub_client::{FileUpload, OrderConfigurator, UploadedFile, count_pages};
use copyhub_core::{
    AgencyId, ColorOption, MAX_COPIES, MIN_COPIES, PaperType, PrintType, format_money,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::{Layout, flash_redirect, form_failure, is_htmx};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::auth::login_redirect;
use crate::middleware::session::{load_draft, remove_draft, save_draft};
use crate::middleware::{CspNonce, Flash, Visitor};
use crate::state::AppState;

/// Name used for uploads that arrive without one.
const FALLBACK_FILE_NAME: &str = "upload.pdf";

// =============================================================================
// Views
// =============================================================================

/// One option button in the configurator.
#[derive(Debug, Clone)]
pub struct ChoiceView {
    pub value: &'static str,
    pub selected: bool,
    /// Whether the agency prices at least one product with this option.
    pub offered: bool,
}

#[derive(Debug, Clone)]
pub struct FileRowView {
    pub index: usize,
    pub name: String,
    pub pages: u32,
    pub size: String,
    pub warning: Option<String>,
}

/// Everything the configurator fragment shows.
#[derive(Debug, Clone)]
pub struct ConfiguratorView {
    pub agency_id: AgencyId,
    pub files: Vec<FileRowView>,
    pub total_pages: u32,
    pub papers: Vec<ChoiceView>,
    pub colors: Vec<ChoiceView>,
    pub sides: Vec<ChoiceView>,
    pub copies: u32,
    pub min_copies: u32,
    pub max_copies: u32,
    pub price_per_page: String,
    pub total_price: String,
    pub has_quote: bool,
    pub warnings: Vec<String>,
    pub blockers: Vec<String>,
    pub ready: bool,
    pub has_products: bool,
    pub signed_in: bool,
    pub error: Option<String>,
}

impl ConfiguratorView {
    #[must_use]
    pub fn new(draft: &OrderConfigurator, signed_in: bool, error: Option<String>) -> Self {
        let products = draft.products();

        Self {
            agency_id: draft.agency_id(),
            files: draft
                .files()
                .iter()
                .enumerate()
                .map(|(index, file)| FileRowView {
                    index,
                    name: file.file_name.clone(),
                    pages: file.page_count,
                    size: human_size(file.size),
                    warning: file.warning.clone(),
                })
                .collect(),
            total_pages: draft.total_pages(),
            papers: choices(&PaperType::ALL, draft.paper_type(), PaperType::label, |p| {
                products.iter().any(|product| product.paper_type == p)
            }),
            colors: choices(&ColorOption::ALL, draft.color_option(), ColorOption::label, |c| {
                products.iter().any(|product| product.color_option == c)
            }),
            sides: choices(&PrintType::ALL, draft.print_type(), PrintType::label, |s| {
                products.iter().any(|product| product.print_type == s)
            }),
            copies: draft.copies(),
            min_copies: MIN_COPIES,
            max_copies: MAX_COPIES,
            price_per_page: format_money(draft.price_per_page()),
            total_price: format_money(draft.total_price()),
            has_quote: draft.quote().has_match(),
            warnings: draft.warnings(),
            blockers: draft
                .blocking_reasons()
                .iter()
                .map(ToString::to_string)
                .collect(),
            ready: draft.is_ready(),
            has_products: !products.is_empty(),
            signed_in,
            error,
        }
    }
}

fn choices<T: Copy + PartialEq>(
    all: &[T],
    selected: Option<T>,
    label: fn(T) -> &'static str,
    offered: impl Fn(T) -> bool,
) -> Vec<ChoiceView> {
    all.iter()
        .map(|&option| ChoiceView {
            value: label(option),
            selected: selected == Some(option),
            offered: offered(option),
        })
        .collect()
}

/// File size for display, e.g. `840 KB` or `3.2 MB`.
fn human_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * 1024;
    if bytes < MB {
        format!("{} KB", bytes.div_ceil(KB))
    } else {
        format!("{}.{} MB", bytes / MB, (bytes % MB) * 10 / MB)
    }
}

/// Last path component of a client-supplied file name.
fn clean_file_name(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "order/show.html")]
pub struct OrderPageTemplate {
    pub layout: Layout,
    pub agency_name: String,
    pub view: ConfiguratorView,
}

/// Configurator fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/configurator.html")]
pub struct ConfiguratorFragment {
    pub view: ConfiguratorView,
}

// =============================================================================
// Draft helpers
// =============================================================================

/// The visitor's draft for an agency against its current price list.
async fn load_or_start(
    state: &AppState,
    visitor: &Visitor,
    session: &Session,
    agency_id: AgencyId,
) -> Result<OrderConfigurator> {
    let products = state
        .api()
        .list_agency_products(&visitor.session, agency_id)
        .await?;

    Ok(match load_draft(session, agency_id).await? {
        Some(mut draft) => {
            if draft.products() != products.as_slice() {
                draft.set_products(products);
            }
            draft
        }
        None => OrderConfigurator::new(agency_id, products),
    })
}

/// Save the draft and answer with the fragment (htmx) or a redirect.
async fn respond(
    headers: &HeaderMap,
    session: &Session,
    visitor: &Visitor,
    draft: &OrderConfigurator,
    error: Option<String>,
) -> Result<Response> {
    save_draft(session, draft).await?;

    if is_htmx(headers) {
        let view = ConfiguratorView::new(draft, visitor.identity.is_authenticated, error);
        return Ok(ConfiguratorFragment { view }.into_response());
    }

    let page = format!("/agencies/{}/order", draft.agency_id());
    Ok(match error {
        Some(message) => flash_redirect(session, Flash::error(message), &page).await,
        None => Redirect::to(&page).into_response(),
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the configurator for an agency.
#[instrument(skip(state, visitor, session, nonce), fields(agency_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<AgencyId>,
    visitor: Visitor,
    session: Session,
    nonce: CspNonce,
) -> Result<OrderPageTemplate> {
    let agency = state.api().get_agency(&visitor.session, id).await?;
    let draft = load_or_start(&state, &visitor, &session, id).await?;
    save_draft(&session, &draft).await?;

    Ok(OrderPageTemplate {
        agency_name: agency.name,
        view: ConfiguratorView::new(&draft, visitor.identity.is_authenticated, None),
        layout: Layout::new(&visitor, &session, nonce).await,
    })
}

/// Add uploaded PDFs to the draft.
///
/// Pages are counted on the blocking pool. Files that cannot be parsed are
/// still added, with zero pages and a warning.
#[instrument(skip(state, visitor, session, headers, multipart), fields(agency_id = %id))]
pub async fn upload(
    State(state): State<AppState>,
    Path(id): Path<AgencyId>,
    visitor: Visitor,
    session: Session,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut draft = load_or_start(&state, &visitor, &session, id).await?;
    let mut added = 0_usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let raw_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        // An empty file input still posts one nameless, empty part
        if raw_name.is_empty() && data.is_empty() {
            continue;
        }

        let file_name = clean_file_name(&raw_name);
        let data = data.to_vec();
        let size = data.len();
        let (data, pages) = tokio::task::spawn_blocking(move || {
            let pages = count_pages(&data);
            (data, pages)
        })
        .await
        .map_err(|e| AppError::Internal(format!("page counting task failed: {e}")))?;

        let key = state.uploads().put(data).await;
        draft.add_file(UploadedFile::from_count(file_name, key, size, pages));
        added += 1;
    }

    tracing::info!(added, total_pages = draft.total_pages(), "Files uploaded");
    let (agency, count) = (id.to_string(), added.to_string());
    add_breadcrumb(
        "order",
        "Uploaded files",
        Some(&[("agency_id", agency.as_str()), ("count", count.as_str())]),
    );

    let error = (added == 0).then(|| "Choose at least one PDF file".to_string());
    respond(&headers, &session, &visitor, &draft, error).await
}

/// Remove one file from the draft.
#[instrument(skip(state, visitor, session, headers), fields(agency_id = %id))]
pub async fn remove_file(
    State(state): State<AppState>,
    Path((id, index)): Path<(AgencyId, usize)>,
    visitor: Visitor,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    let mut draft = load_or_start(&state, &visitor, &session, id).await?;
    match draft.remove_file(index) {
        Some(file) => state.uploads().remove(&file.key).await,
        None => tracing::debug!(index, "No file at index"),
    }
    respond(&headers, &session, &visitor, &draft, None).await
}

/// Remove every file from the draft.
#[instrument(skip(state, visitor, session, headers), fields(agency_id = %id))]
pub async fn clear_files(
    State(state): State<AppState>,
    Path(id): Path<AgencyId>,
    visitor: Visitor,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    let mut draft = load_or_start(&state, &visitor, &session, id).await?;
    for file in draft.clear_files() {
        state.uploads().remove(&file.key).await;
    }
    respond(&headers, &session, &visitor, &draft, None).await
}

/// Print option form. Blank fields clear the choice.
#[derive(Debug, Default, Deserialize)]
pub struct OptionsForm {
    #[serde(default)]
    pub paper_type: String,
    #[serde(default)]
    pub color_option: String,
    #[serde(default)]
    pub print_type: String,
    #[serde(default)]
    pub copies: String,
}

/// Parse a choice field; blank means no choice.
fn parse_choice<T>(raw: &str) -> std::result::Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|e: T::Err| e.to_string())
}

/// Apply the option form to a draft, returning the first problem found.
///
/// Valid fields are applied even when another field is rejected.
fn apply_options(draft: &mut OrderConfigurator, form: &OptionsForm) -> Option<String> {
    let mut errors = Vec::new();

    match parse_choice::<PaperType>(&form.paper_type) {
        Ok(paper) => draft.set_paper_type(paper),
        Err(e) => errors.push(e),
    }
    match parse_choice::<ColorOption>(&form.color_option) {
        Ok(color) => draft.set_color_option(color),
        Err(e) => errors.push(e),
    }
    match parse_choice::<PrintType>(&form.print_type) {
        Ok(sides) => draft.set_print_type(sides),
        Err(e) => errors.push(e),
    }

    let copies = form.copies.trim();
    if !copies.is_empty() {
        match copies.parse::<u32>() {
            Ok(copies) => {
                if let Err(e) = draft.set_copies(copies) {
                    errors.push(e.to_string());
                }
            }
            Err(_) => errors.push("Copies must be a whole number".to_string()),
        }
    }

    errors.into_iter().next()
}

/// Change print options and copies.
#[instrument(skip(state, visitor, session, headers), fields(agency_id = %id))]
pub async fn set_options(
    State(state): State<AppState>,
    Path(id): Path<AgencyId>,
    visitor: Visitor,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<OptionsForm>,
) -> Result<Response> {
    let mut draft = load_or_start(&state, &visitor, &session, id).await?;
    let error = apply_options(&mut draft, &form);
    respond(&headers, &session, &visitor, &draft, error).await
}

/// Place the order and send the visitor to the hosted checkout.
#[instrument(skip(state, visitor, session), fields(agency_id = %id))]
pub async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<AgencyId>,
    visitor: Visitor,
    session: Session,
) -> Result<Response> {
    let back = format!("/agencies/{id}/order");
    if !visitor.identity.is_authenticated {
        return Ok(Redirect::to(&login_redirect(&back)).into_response());
    }

    let mut draft = load_or_start(&state, &visitor, &session, id).await?;
    let request = match draft.to_order_request() {
        Ok(request) => request,
        Err(reason) => {
            return Ok(flash_redirect(&session, Flash::error(reason.to_string()), &back).await);
        }
    };

    let mut files = Vec::with_capacity(draft.files().len());
    let mut expired = Vec::new();
    for (index, file) in draft.files().iter().enumerate() {
        match state.uploads().get(&file.key).await {
            Some(data) => files.push(FileUpload::pdf(file.file_name.clone(), data.as_ref().clone())),
            None => expired.push(index),
        }
    }
    if !expired.is_empty() {
        for index in expired.into_iter().rev() {
            draft.remove_file(index);
        }
        save_draft(&session, &draft).await?;
        let message = "Some uploads expired before checkout. Please add them again.";
        return Ok(flash_redirect(&session, Flash::error(message), &back).await);
    }

    let order = match state
        .api()
        .create_order(&visitor.session, &request, files)
        .await
    {
        Ok(order) => order,
        Err(e) => return form_failure(&session, e, &back).await,
    };

    for file in draft.clear_files() {
        state.uploads().remove(&file.key).await;
    }
    remove_draft(&session, id).await?;

    let code = order.order_code;
    let success_url = format!(
        "{}?session_id={{CHECKOUT_SESSION_ID}}",
        state.config().absolute_url("/checkout/success")
    );
    let cancel_url = format!(
        "{}?payment_canceled=true",
        state.config().absolute_url("/checkout/cancel")
    );

    match state
        .api()
        .create_checkout_session(&visitor.session, &code, &success_url, &cancel_url)
        .await
    {
        Ok(url) => Ok(Redirect::to(url.as_str()).into_response()),
        Err(e) if e.is_auth_failure() => Err(e.into()),
        Err(e) => {
            tracing::error!(order_code = %code, error = %e, "Checkout session failed after order creation");
            let message = format!(
                "Order {code} was placed but payment could not be started. Please try again later."
            );
            Ok(flash_redirect(&session, Flash::error(message), &format!("/account/orders/{code}")).await)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use copyhub_core::{AgencyProduct, AgencyProductId, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    fn draft() -> OrderConfigurator {
        OrderConfigurator::new(
            AgencyId::new(1),
            vec![AgencyProduct {
                id: AgencyProductId::new(10),
                agency_id: AgencyId::new(1),
                product_id: ProductId::new(100),
                paper_type: PaperType::A4,
                color_option: ColorOption::BlackAndWhite,
                print_type: PrintType::OneSided,
                price: Decimal::new(25, 1),
            }],
        )
    }

    fn form(paper: &str, color: &str, sides: &str, copies: &str) -> OptionsForm {
        OptionsForm {
            paper_type: paper.to_string(),
            color_option: color.to_string(),
            print_type: sides.to_string(),
            copies: copies.to_string(),
        }
    }

    #[test]
    fn test_apply_options_sets_all_fields() {
        let mut draft = draft();
        let options = form(
            PaperType::A4.label(),
            ColorOption::BlackAndWhite.label(),
            PrintType::OneSided.label(),
            "3",
        );
        assert_eq!(apply_options(&mut draft, &options), None);
        assert_eq!(draft.copies(), 3);
        assert!(draft.quote().has_match());
        assert_eq!(draft.price_per_page(), Decimal::new(25, 1));
    }

    #[test]
    fn test_blank_fields_clear_choices() {
        let mut draft = draft();
        draft.set_paper_type(Some(PaperType::A4));
        assert_eq!(apply_options(&mut draft, &OptionsForm::default()), None);
        assert_eq!(draft.paper_type(), None);
        assert_eq!(draft.copies(), MIN_COPIES);
    }

    #[test]
    fn test_bad_copies_keep_other_fields() {
        let mut draft = draft();
        let error = apply_options(&mut draft, &form(PaperType::A4.label(), "", "", "0"));
        assert!(error.is_some());
        assert_eq!(draft.paper_type(), Some(PaperType::A4));
        assert_eq!(draft.copies(), MIN_COPIES);

        let error = apply_options(&mut draft, &form("", "", "", "lots"));
        assert_eq!(error.as_deref(), Some("Copies must be a whole number"));
    }

    #[test]
    fn test_view_marks_offered_options() {
        let view = ConfiguratorView::new(&draft(), false, None);
        let offered: Vec<&str> = view
            .papers
            .iter()
            .filter(|choice| choice.offered)
            .map(|choice| choice.value)
            .collect();
        assert_eq!(offered, vec![PaperType::A4.label()]);
        assert!(!view.ready);
        assert_eq!(view.total_pages, 0);
        assert_eq!(view.total_price, "$0.00");
    }

    #[test]
    fn test_file_names_and_sizes() {
        assert_eq!(clean_file_name("C:\\docs\\thesis.pdf"), "thesis.pdf");
        assert_eq!(clean_file_name("../../etc/passwd"), "passwd");
        assert_eq!(clean_file_name("  "), FALLBACK_FILE_NAME);

        assert_eq!(human_size(1), "1 KB");
        assert_eq!(human_size(840 * 1024), "840 KB");
        assert_eq!(human_size(3 * 1024 * 1024 + 300 * 1024), "3.2 MB");
    }
}
