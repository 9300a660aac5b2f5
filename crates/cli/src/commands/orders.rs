//! Order listing, inspection and lifecycle changes.

use std::time::Duration;

use copyhub_client::{SessionWatcher, StateChange};
use copyhub_core::{Order, OrderCode, OrderState, format_money};

use super::{CliError, Context, Result};
use crate::output::{self, Table};

/// How often `orders watch` re-checks the session tokens.
const SESSION_CHECK_PERIOD: Duration = Duration::from_secs(60);

fn parse_state(raw: &str) -> Result<OrderState> {
    raw.parse::<OrderState>()
        .map_err(|e| CliError::Invalid(e.to_string()))
}

/// Orders visible to the signed-in user: everything for admins, the agency's
/// orders for agency owners, otherwise the customer's own.
pub async fn list(ctx: &Context, state: Option<&str>) -> Result<()> {
    let identity = ctx.require_identity().await?;
    let state = state.map(parse_state).transpose()?;

    let orders = if identity.is_admin {
        ctx.api.list_all_orders(&ctx.session, state).await?
    } else if identity.is_agency {
        let user_id = identity.user_id.ok_or(CliError::SignedOut)?;
        let user = ctx.api.get_user(&ctx.session, user_id).await?;
        let agency_id = user
            .agency_id
            .ok_or_else(|| CliError::Invalid("This account has no agency".to_string()))?;
        ctx.api.list_agency_orders(&ctx.session, agency_id).await?
    } else {
        ctx.api.list_my_orders(&ctx.session).await?
    };
    ctx.persist().await?;

    let mut table = Table::new(["CODE", "STATE", "AGENCY", "JOB", "TOTAL", "PLACED"]);
    for order in orders
        .iter()
        .filter(|order| state.is_none_or(|state| order.state == state))
    {
        table.row([
            order.order_code.to_string(),
            order.state.name().to_string(),
            order.agency_name.clone().unwrap_or_else(|| order.agency_id.to_string()),
            format!(
                "{} x{} {}",
                order.page_count,
                order.copy_count,
                order.options()
            ),
            format_money(order.total_price),
            order.created_at.format("%Y-%m-%d").to_string(),
        ]);
    }

    if table.is_empty() {
        output::line("No orders")?;
    } else {
        table.print()?;
    }
    Ok(())
}

fn describe(order: &Order) -> Vec<String> {
    let mut lines = vec![
        format!("order:    {}", order.order_code),
        format!("state:    {} ({})", order.state.name(), order.state.description()),
        format!(
            "agency:   {}",
            order.agency_name.clone().unwrap_or_else(|| order.agency_id.to_string())
        ),
    ];
    if let Some(customer) = &order.customer_name {
        lines.push(format!("customer: {customer}"));
    }
    lines.push(format!("options:  {}", order.options()));
    lines.push(format!(
        "job:      {} pages x {} copies at {} per page",
        order.page_count,
        order.copy_count,
        format_money(order.price_per_page)
    ));
    lines.push(format!("total:    {}", format_money(order.total_price)));
    lines.push(format!("placed:   {}", order.created_at.format("%Y-%m-%d %H:%M")));
    for file in &order.files {
        lines.push(format!("file:     {} ({} pages)", file.file_name, file.page_count));
    }
    if let Some(code) = &order.completion_code {
        lines.push(format!("pickup:   {code}"));
    }
    lines
}

/// Show one order.
pub async fn show(ctx: &Context, code: &OrderCode) -> Result<()> {
    ctx.require_identity().await?;
    let order = ctx.api.get_order(&ctx.session, code).await?;
    ctx.persist().await?;

    for line in describe(&order) {
        output::line(line)?;
    }
    Ok(())
}

/// Move an order to another state.
///
/// Agencies are held to the transitions their back office offers; admins may
/// set any state.
pub async fn set_state(ctx: &Context, code: &OrderCode, target: &str) -> Result<()> {
    let identity = ctx.require_identity().await?;
    let target = parse_state(target)?;
    let order = ctx.api.get_order(&ctx.session, code).await?;

    if order.state == target {
        output::line(format!("{code} is already {}", target.name()))?;
        return Ok(());
    }
    if !identity.is_admin && target == OrderState::Completed {
        return Err(CliError::Invalid(format!(
            "Hand the order over with `copyhub orders complete {code} <pickup-code>`"
        )));
    }
    if !identity.is_admin && !order.state.agency_actions().contains(&target) {
        return Err(CliError::Invalid(format!(
            "Cannot move {code} from {} to {}",
            order.state.name(),
            target.name()
        )));
    }

    let change = ctx
        .api
        .update_order_state(&ctx.session, code, Some(order.state), target)
        .await?;
    ctx.persist().await?;

    output::line(format!("{code}: {} -> {}", order.state.name(), target.name()))?;
    match change {
        StateChange::ReadyForPickup(pickup) => output::line(format!("pickup code: {pickup}"))?,
        StateChange::CodeUnavailable => output::line(format!(
            "pickup code not issued yet; see `copyhub orders show {code}` later"
        ))?,
        StateChange::Moved => {}
    }
    Ok(())
}

/// Record the hand-over of a finished order against the customer's pickup
/// code.
pub async fn complete(ctx: &Context, code: &OrderCode, pickup_code: &str) -> Result<()> {
    ctx.require_identity().await?;
    ctx.api.complete_order(&ctx.session, code, pickup_code).await?;
    ctx.persist().await?;
    output::line(format!("{code} handed over"))?;
    Ok(())
}

/// Poll an order until it reaches a terminal state.
pub async fn watch(ctx: &Context, code: &OrderCode, every: Duration) -> Result<()> {
    ctx.require_identity().await?;
    let watcher = SessionWatcher::spawn(ctx.api.clone(), ctx.session.clone(), SESSION_CHECK_PERIOD);

    let mut last: Option<OrderState> = None;
    let mut interval = tokio::time::interval(every);
    let outcome = loop {
        interval.tick().await;

        let order = match ctx.api.get_order(&ctx.session, code).await {
            Ok(order) => order,
            Err(e) => break Err(e.into()),
        };
        ctx.persist().await?;

        if last != Some(order.state) {
            tracing::debug!(order_code = %code, state = %order.state, "Order state observed");
            output::line(format!("{} {code} {}", clock(), order.state.name()))?;
            last = Some(order.state);
        }
        if order.state.is_terminal() {
            break Ok(());
        }
        if !ctx.session.identity().is_authenticated {
            break Err(CliError::SignedOut);
        }
    };

    watcher.stop();
    outcome
}

fn clock() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state_by_name_or_ordinal() {
        assert_eq!(parse_state("started").unwrap(), OrderState::Started);
        assert_eq!(parse_state("0").unwrap(), OrderState::Pending);
        assert!(parse_state("Lost").is_err());
    }
}
