//! Browse print shops and their price lists.

use copyhub_core::{AgencyId, format_money};

use super::{Context, Result};
use crate::output::{self, Table};

/// List approved agencies, optionally filtered by a name or city fragment.
pub async fn list(ctx: &Context, search: Option<&str>) -> Result<()> {
    let agencies = ctx.api.list_agencies(&ctx.session).await?;
    ctx.persist().await?;

    let needle = search.map(str::to_lowercase);
    let mut table = Table::new(["ID", "NAME", "CITY", "RATING"]);
    for agency in agencies.iter().filter(|agency| {
        needle.as_deref().is_none_or(|needle| {
            agency.name.to_lowercase().contains(needle)
                || agency.location.city.to_lowercase().contains(needle)
        })
    }) {
        table.row([
            agency.id.to_string(),
            agency.name.clone(),
            agency.location.city.clone(),
            format!("{:.1}", agency.rating),
        ]);
    }

    if table.is_empty() {
        output::line("No print shops found")?;
    } else {
        table.print()?;
    }
    Ok(())
}

/// Show one agency with its price list.
pub async fn show(ctx: &Context, id: AgencyId) -> Result<()> {
    let (agency, products) = tokio::try_join!(
        ctx.api.get_agency(&ctx.session, id),
        ctx.api.list_agency_products(&ctx.session, id),
    )?;
    ctx.persist().await?;

    output::line(&agency.name)?;
    output::line(format!(
        "{}, {}",
        agency.location.address, agency.location.city
    ))?;
    if !agency.bio.is_empty() {
        output::line(&agency.bio)?;
    }
    output::line("")?;

    if products.is_empty() {
        output::line("This shop has not priced any products yet")?;
        return Ok(());
    }

    let mut table = Table::new(["PAPER", "COLOR", "SIDES", "PER PAGE"]);
    for product in &products {
        table.row([
            product.paper_type.label().to_string(),
            product.color_option.label().to_string(),
            product.print_type.label().to_string(),
            format_money(product.price),
        ]);
    }
    table.print()?;
    Ok(())
}
