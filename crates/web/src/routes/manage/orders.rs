//! Order management for agencies and admins.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Response,
};
use copyhub_client::StateChange;
use copyhub_core::{Order, OrderCode, OrderState};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::{ManageNav, own_agency};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, Flash, RequireStaff, Visitor};
use crate::routes::account::OrderRowView;
use crate::routes::{Layout, flash_redirect, form_failure};
use crate::state::AppState;

/// A state the visitor may move an order to.
#[derive(Debug, Clone)]
pub struct ActionView {
    pub value: &'static str,
    pub label: &'static str,
    pub danger: bool,
}

#[derive(Debug, Clone)]
pub struct ManagedOrderView {
    pub row: OrderRowView,
    pub current: &'static str,
    pub actions: Vec<ActionView>,
    pub awaiting_pickup: bool,
}

/// States offered for an order.
///
/// Agencies follow the lifecycle; admins may pick any other state.
fn actions_for(state: OrderState, is_admin: bool) -> Vec<ActionView> {
    let targets: Vec<OrderState> = if is_admin {
        OrderState::ALL
            .into_iter()
            .filter(|target| *target != state)
            .collect()
    } else {
        state.agency_actions()
    };

    targets
        .into_iter()
        .map(|target| ActionView {
            value: target.name(),
            label: action_label(target),
            danger: target == OrderState::Rejected,
        })
        .collect()
}

const fn action_label(target: OrderState) -> &'static str {
    match target {
        OrderState::Pending => "Back to pending",
        OrderState::Confirmed => "Confirm",
        OrderState::Started => "Start printing",
        OrderState::Finished => "Mark ready",
        OrderState::Completed => "Mark picked up",
        OrderState::Rejected => "Reject",
    }
}

impl ManagedOrderView {
    fn new(order: &Order, is_admin: bool) -> Self {
        Self {
            row: OrderRowView::from(order),
            current: order.state.name(),
            actions: actions_for(order.state, is_admin)
                .into_iter()
                // Handing over needs the pickup code form
                .filter(|action| is_admin || action.value != OrderState::Completed.name())
                .collect(),
            awaiting_pickup: order.state == OrderState::Finished,
        }
    }
}

/// State filter option.
#[derive(Debug, Clone)]
pub struct FilterView {
    pub value: &'static str,
    pub selected: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "manage/orders.html")]
pub struct OrdersTemplate {
    pub layout: Layout,
    pub nav: ManageNav,
    pub orders: Vec<ManagedOrderView>,
    pub state_filters: Vec<FilterView>,
    pub any_selected: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub state: Option<String>,
}

fn parse_filter(raw: Option<&str>) -> Result<Option<OrderState>> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: copyhub_core::OrderStateError| AppError::BadRequest(e.to_string())),
    }
}

async fn orders_for(
    state: &AppState,
    visitor: &Visitor,
    filter: Option<OrderState>,
) -> Result<Vec<Order>> {
    if visitor.identity.is_admin {
        return Ok(state.api().list_all_orders(&visitor.session, filter).await?);
    }
    let agency_id = own_agency(state, visitor).await?;
    let mut orders = state
        .api()
        .list_agency_orders(&visitor.session, agency_id)
        .await?;
    if let Some(filter) = filter {
        orders.retain(|order| order.state == filter);
    }
    Ok(orders)
}

/// List orders with their state controls.
#[instrument(skip(state, visitor, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(visitor): RequireStaff,
    session: Session,
    nonce: CspNonce,
    Query(query): Query<OrdersQuery>,
) -> Result<OrdersTemplate> {
    let filter = parse_filter(query.state.as_deref())?;
    let orders = orders_for(&state, &visitor, filter).await?;
    let is_admin = visitor.identity.is_admin;

    Ok(OrdersTemplate {
        nav: ManageNav::new(&visitor, "orders"),
        orders: orders
            .iter()
            .map(|order| ManagedOrderView::new(order, is_admin))
            .collect(),
        state_filters: OrderState::ALL
            .into_iter()
            .map(|state| FilterView {
                value: state.name(),
                selected: filter == Some(state),
            })
            .collect(),
        any_selected: filter.is_none(),
        layout: Layout::new(&visitor, &session, nonce).await,
    })
}

#[derive(Debug, Deserialize)]
pub struct StateForm {
    pub state: String,
    /// State the order was in when the page rendered.
    #[serde(default)]
    pub current: Option<String>,
}

/// Move an order to another state.
///
/// Entering `Finished` issues a pickup code, which is shown to the agency.
#[instrument(skip(state, visitor, session, form), fields(order_code = %code))]
pub async fn set_state(
    State(state): State<AppState>,
    Path(code): Path<OrderCode>,
    RequireStaff(visitor): RequireStaff,
    session: Session,
    Form(form): Form<StateForm>,
) -> Result<Response> {
    let back = "/manage/orders";
    let Ok(target) = form.state.parse::<OrderState>() else {
        return Ok(flash_redirect(&session, Flash::error("Unknown order state."), back).await);
    };
    let current = form
        .current
        .as_deref()
        .and_then(|raw| raw.parse::<OrderState>().ok());

    if !visitor.identity.is_admin
        && current.is_some_and(|current| !current.agency_actions().contains(&target))
    {
        let message = format!("Orders cannot move to {target} from here.");
        return Ok(flash_redirect(&session, Flash::error(message), back).await);
    }

    match state
        .api()
        .update_order_state(&visitor.session, &code, current, target)
        .await
    {
        Ok(change) => {
            let (state_name, order) = (target.to_string(), code.to_string());
            add_breadcrumb(
                "order",
                "State changed",
                Some(&[("order_code", order.as_str()), ("state", state_name.as_str())]),
            );
            let message = state_change_message(&code, target, &change);
            Ok(flash_redirect(&session, Flash::success(message), back).await)
        }
        Err(e) => form_failure(&session, e, back).await,
    }
}

/// Flash text for an accepted state change.
fn state_change_message(code: &OrderCode, target: OrderState, change: &StateChange) -> String {
    match change {
        StateChange::ReadyForPickup(pickup) => {
            format!("Order {code} is ready. Pickup code: {pickup}")
        }
        StateChange::CodeUnavailable => format!(
            "Order {code} is now {target}. The pickup code is not available yet; \
             it is shown on the order once issued."
        ),
        StateChange::Moved => format!("Order {code} is now {target}."),
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteForm {
    pub completion_code: String,
}

/// Hand a finished order over after checking the customer's pickup code.
#[instrument(skip(state, visitor, session, form), fields(order_code = %code))]
pub async fn complete(
    State(state): State<AppState>,
    Path(code): Path<OrderCode>,
    RequireStaff(visitor): RequireStaff,
    session: Session,
    Form(form): Form<CompleteForm>,
) -> Result<Response> {
    let back = "/manage/orders";
    match state
        .api()
        .complete_order(&visitor.session, &code, &form.completion_code)
        .await
    {
        Ok(()) => {
            let message = format!("Order {code} handed over.");
            Ok(flash_redirect(&session, Flash::success(message), back).await)
        }
        Err(e) => form_failure(&session, e, back).await,
    }
}
