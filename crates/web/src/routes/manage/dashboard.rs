//! Analytics dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use copyhub_client::types::OrderAnalytics;
use copyhub_core::{OrderState, format_money};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use tower_sessions::Session;
use tracing::instrument;

use super::ManageNav;
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, RequireStaff};
use crate::routes::Layout;
use crate::routes::account::state_class;
use crate::state::AppState;

/// Headline numbers.
#[derive(Debug, Clone)]
pub struct DashboardMetrics {
    pub orders: String,
    pub revenue: String,
    pub completion_rate: String,
    pub open_orders: String,
}

#[derive(Debug, Clone)]
pub struct StateCountView {
    pub state: &'static str,
    pub class: &'static str,
    pub count: u64,
}

/// One bar of the monthly revenue chart.
#[derive(Debug, Clone)]
pub struct MonthBarView {
    pub month: String,
    pub revenue: String,
    pub orders: u64,
    /// Bar width relative to the best month, 0 to 100.
    pub width: u32,
}

impl DashboardMetrics {
    fn new(analytics: &OrderAnalytics) -> Self {
        let open: u64 = OrderState::ALL
            .into_iter()
            .filter(|state| !state.is_terminal())
            .map(|state| analytics.count_for(state))
            .sum();
        Self {
            orders: analytics.total_orders.to_string(),
            revenue: format_money(analytics.total_revenue),
            completion_rate: analytics
                .completion_rate()
                .map_or_else(|| "–".to_string(), |rate| format!("{rate:.1}%")),
            open_orders: open.to_string(),
        }
    }
}

fn state_counts(analytics: &OrderAnalytics) -> Vec<StateCountView> {
    OrderState::ALL
        .into_iter()
        .map(|state| StateCountView {
            state: state.name(),
            class: state_class(state),
            count: analytics.count_for(state),
        })
        .collect()
}

fn month_bars(analytics: &OrderAnalytics) -> Vec<MonthBarView> {
    let best = analytics
        .revenue_by_month
        .iter()
        .map(|month| month.revenue)
        .max()
        .unwrap_or_default();

    analytics
        .revenue_by_month
        .iter()
        .map(|month| {
            let width = if best > Decimal::ZERO {
                (month.revenue.max(Decimal::ZERO) * Decimal::ONE_HUNDRED / best)
                    .round()
                    .to_u32()
                    .unwrap_or(0)
            } else {
                0
            };
            MonthBarView {
                month: month.month.clone(),
                revenue: format_money(month.revenue),
                orders: month.orders,
                width,
            }
        })
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "manage/dashboard.html")]
pub struct DashboardTemplate {
    pub layout: Layout,
    pub nav: ManageNav,
    pub metrics: DashboardMetrics,
    pub states: Vec<StateCountView>,
    pub months: Vec<MonthBarView>,
    pub pending_agencies: usize,
}

/// Display order analytics, scoped by the backend to the visitor's role.
#[instrument(skip(state, visitor, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(visitor): RequireStaff,
    session: Session,
    nonce: CspNonce,
) -> Result<DashboardTemplate> {
    let analytics = state.api().order_analytics(&visitor.session).await?;

    let pending_agencies = if visitor.identity.is_admin {
        match state.api().list_pending_agencies(&visitor.session).await {
            Ok(pending) => pending.len(),
            Err(e) => {
                tracing::warn!(error = %e, "Pending agency count unavailable");
                0
            }
        }
    } else {
        0
    };

    Ok(DashboardTemplate {
        nav: ManageNav::new(&visitor, "dashboard"),
        metrics: DashboardMetrics::new(&analytics),
        states: state_counts(&analytics),
        months: month_bars(&analytics),
        pending_agencies,
        layout: Layout::new(&visitor, &session, nonce).await,
    })
}
