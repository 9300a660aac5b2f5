//! Account route handlers: profile and the customer's orders.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Response,
};
use copyhub_client::types::{UpdateProfileRequest, User};
use copyhub_core::{FileId, Order, OrderCode, OrderState, UserId, format_money};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::{Layout, flash_redirect, form_failure};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CspNonce, Flash, RequireAuth, Visitor};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// One order in a list.
#[derive(Debug, Clone)]
pub struct OrderRowView {
    pub code: String,
    pub agency: String,
    pub customer: String,
    pub summary: String,
    pub pages: u32,
    pub copies: u32,
    pub total: String,
    pub state: &'static str,
    pub state_class: &'static str,
    pub placed: String,
}

impl From<&Order> for OrderRowView {
    fn from(order: &Order) -> Self {
        Self {
            code: order.order_code.to_string(),
            agency: order
                .agency_name
                .clone()
                .unwrap_or_else(|| format!("Agency #{}", order.agency_id)),
            customer: order
                .customer_name
                .clone()
                .unwrap_or_else(|| format!("Customer #{}", order.customer_id)),
            summary: order.options().to_string(),
            pages: order.page_count,
            copies: order.copy_count,
            total: format_money(order.total_price),
            state: order.state.name(),
            state_class: state_class(order.state),
            placed: order.created_at.format("%b %-d, %Y").to_string(),
        }
    }
}

/// CSS modifier for a state badge.
#[must_use]
pub const fn state_class(state: OrderState) -> &'static str {
    match state {
        OrderState::Pending => "badge--pending",
        OrderState::Confirmed | OrderState::Started => "badge--active",
        OrderState::Finished => "badge--ready",
        OrderState::Completed => "badge--done",
        OrderState::Rejected => "badge--rejected",
    }
}

#[derive(Debug, Clone)]
pub struct OrderFileView {
    pub id: FileId,
    pub name: String,
    pub pages: u32,
}

/// Order detail with its lifecycle progress.
#[derive(Debug, Clone)]
pub struct OrderDetailView {
    pub row: OrderRowView,
    pub description: &'static str,
    pub price_per_page: String,
    pub files: Vec<OrderFileView>,
    pub steps: Vec<StepView>,
    pub cancellable: bool,
    pub rejected: bool,
}

/// One step of the progress bar.
#[derive(Debug, Clone)]
pub struct StepView {
    pub name: &'static str,
    pub reached: bool,
}

impl From<&Order> for OrderDetailView {
    fn from(order: &Order) -> Self {
        let rejected = order.state == OrderState::Rejected;
        Self {
            row: OrderRowView::from(order),
            description: order.state.description(),
            price_per_page: format_money(order.price_per_page),
            files: order
                .files
                .iter()
                .map(|file| OrderFileView {
                    id: file.id,
                    name: file.file_name.clone(),
                    pages: file.page_count,
                })
                .collect(),
            steps: OrderState::ALL
                .into_iter()
                .filter(|state| *state != OrderState::Rejected)
                .map(|state| StepView {
                    name: state.name(),
                    reached: !rejected && state <= order.state,
                })
                .collect(),
            cancellable: order.state.is_cancellable(),
            rejected,
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub layout: Layout,
    pub user: User,
    pub email: String,
    pub phone: String,
    pub orders: Vec<OrderRowView>,
}

#[derive(Template, WebTemplate)]
#[template(path = "account/order.html")]
pub struct OrderTemplate {
    pub layout: Layout,
    pub order: OrderDetailView,
    pub completion_code: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Signed-in user id, which every account page needs.
pub(crate) fn user_id(visitor: &Visitor) -> Result<UserId> {
    visitor
        .identity
        .user_id
        .ok_or_else(|| AppError::Unauthorized("session has no user id".to_string()))
}

/// Display the profile and order history.
#[instrument(skip(state, visitor, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(visitor): RequireAuth,
    session: Session,
    nonce: CspNonce,
) -> Result<AccountTemplate> {
    let id = user_id(&visitor)?;
    let (user, orders) = tokio::try_join!(
        state.api().get_user(&visitor.session, id),
        state.api().list_my_orders(&visitor.session),
    )?;

    Ok(AccountTemplate {
        layout: Layout::new(&visitor, &session, nonce).await,
        email: user.email.clone().unwrap_or_default(),
        phone: user.phone_number.clone().unwrap_or_default(),
        orders: orders.iter().map(OrderRowView::from).collect(),
        user,
    })
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
}

/// Update the profile.
#[instrument(skip(state, visitor, session, form))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(visitor): RequireAuth,
    session: Session,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let id = user_id(&visitor)?;
    let phone = form.phone_number.trim();
    let update = UpdateProfileRequest {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        phone_number: (!phone.is_empty()).then(|| phone.to_string()),
    };
    if update.username.is_empty() || update.email.is_empty() {
        let message = "Username and email are required.";
        return Ok(flash_redirect(&session, Flash::error(message), "/account").await);
    }

    match state.api().update_profile(&visitor.session, id, &update).await {
        Ok(_) => Ok(flash_redirect(&session, Flash::success("Profile saved."), "/account").await),
        Err(e) => form_failure(&session, e, "/account").await,
    }
}

/// Display one order. Finished orders show their pickup code.
#[instrument(skip(state, visitor, session, nonce), fields(order_code = %code))]
pub async fn order(
    State(state): State<AppState>,
    Path(code): Path<OrderCode>,
    RequireAuth(visitor): RequireAuth,
    session: Session,
    nonce: CspNonce,
) -> Result<OrderTemplate> {
    let order = state.api().get_order(&visitor.session, &code).await?;

    let completion_code = if order.state.requires_completion_code() {
        match order.completion_code.clone() {
            Some(code) => Some(code),
            None => match state.api().get_completion_code(&visitor.session, &code).await {
                Ok(code) => Some(code),
                Err(e) => {
                    tracing::warn!(error = %e, "Pickup code unavailable");
                    None
                }
            },
        }
    } else {
        None
    };

    Ok(OrderTemplate {
        layout: Layout::new(&visitor, &session, nonce).await,
        order: OrderDetailView::from(&order),
        completion_code,
    })
}

/// Cancel an order that has not been completed.
#[instrument(skip(state, visitor, session), fields(order_code = %code))]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(code): Path<OrderCode>,
    RequireAuth(visitor): RequireAuth,
    session: Session,
) -> Result<Response> {
    let back = format!("/account/orders/{code}");
    match state.api().cancel_order(&visitor.session, &code).await {
        Ok(()) => {
            let message = format!("Order {code} canceled.");
            Ok(flash_redirect(&session, Flash::success(message), &back).await)
        }
        Err(e) => form_failure(&session, e, &back).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(state: OrderState) -> Order {
        serde_json::from_value(serde_json::json!({
            "orderCode": "ORD-42",
            "agencyId": 3,
            "customerId": 9,
            "customerName": "Ana",
            "paperType": "A4",
            "colorOption": "Color",
            "printType": "OneSided",
            "pageCount": 10,
            "copyCount": 3,
            "pricePerPage": 2.5,
            "totalPrice": 75,
            "state": state.ordinal(),
            "createdAt": "2026-03-01T10:00:00Z",
            "updatedAt": "2026-03-01T11:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_order_row() {
        let row = OrderRowView::from(&order(OrderState::Started));
        assert_eq!(row.code, "ORD-42");
        assert_eq!(row.agency, "Agency #3");
        assert_eq!(row.customer, "Ana");
        assert_eq!(row.total, "$75.00");
        assert_eq!(row.state, "Started");
        assert_eq!(row.placed, "Mar 1, 2026");
    }

    #[test]
    fn test_progress_steps() {
        let detail = OrderDetailView::from(&order(OrderState::Started));
        let reached: Vec<&str> = detail
            .steps
            .iter()
            .filter(|step| step.reached)
            .map(|step| step.name)
            .collect();
        assert_eq!(reached, vec!["Pending", "Confirmed", "Started"]);
        assert!(detail.cancellable);

        let detail = OrderDetailView::from(&order(OrderState::Rejected));
        assert!(detail.rejected && !detail.cancellable);
        assert!(detail.steps.iter().all(|step| !step.reached));
    }
}
