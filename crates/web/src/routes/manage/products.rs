//! Agency price list management.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use copyhub_client::types::NewAgencyProduct;
use copyhub_core::{AgencyProduct, AgencyProductId, Product, ProductId, format_money};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::{ManageNav, own_agency};
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, Flash, RequireStaff};
use crate::routes::{Layout, flash_redirect, form_failure, is_htmx};
use crate::state::AppState;

const BACK: &str = "/manage/products";

#[derive(Debug, Clone)]
pub struct PricedProductView {
    pub id: AgencyProductId,
    pub summary: String,
    pub price: String,
    /// Price as typed into the edit field.
    pub raw_price: String,
}

impl From<&AgencyProduct> for PricedProductView {
    fn from(product: &AgencyProduct) -> Self {
        Self {
            id: product.id,
            summary: product.options().to_string(),
            price: format_money(product.price),
            raw_price: product.price.normalize().to_string(),
        }
    }
}

/// Catalog product the agency has not priced yet.
#[derive(Debug, Clone)]
pub struct UnpricedView {
    pub id: ProductId,
    pub summary: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "manage/products.html")]
pub struct ProductsTemplate {
    pub layout: Layout,
    pub nav: ManageNav,
    pub priced: Vec<PricedProductView>,
    pub unpriced: Vec<UnpricedView>,
}

/// Catalog entries missing from the agency's price list.
fn unpriced(catalog: &[Product], priced: &[AgencyProduct]) -> Vec<UnpricedView> {
    catalog
        .iter()
        .filter(|product| !priced.iter().any(|p| p.product_id == product.id))
        .map(|product| UnpricedView {
            id: product.id,
            summary: product.options().to_string(),
        })
        .collect()
}

/// Parse a price field such as `0.25` or `$1.50`.
fn parse_price(raw: &str) -> std::result::Result<Decimal, &'static str> {
    let cleaned = raw.trim().trim_start_matches('$').replace(',', ".");
    let price = Decimal::from_str(cleaned.trim()).map_err(|_| "Enter a price such as 0.25")?;
    if price.is_sign_negative() {
        return Err("Prices cannot be negative");
    }
    Ok(price)
}

/// Display the agency's price list.
#[instrument(skip(state, visitor, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(visitor): RequireStaff,
    session: Session,
    nonce: CspNonce,
) -> Result<Response> {
    if !visitor.identity.is_agency {
        // Admins curate the catalog instead
        return Ok(axum::response::Redirect::to("/manage/catalog").into_response());
    }
    let agency_id = own_agency(&state, &visitor).await?;
    let (catalog, priced) = tokio::try_join!(
        state.api().list_products(&visitor.session),
        state.api().list_agency_products(&visitor.session, agency_id),
    )?;

    Ok(ProductsTemplate {
        nav: ManageNav::new(&visitor, "products"),
        unpriced: unpriced(&catalog, &priced),
        priced: priced.iter().map(PricedProductView::from).collect(),
        layout: Layout::new(&visitor, &session, nonce).await,
    }
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct NewPriceForm {
    pub product_id: ProductId,
    pub price: String,
}

/// Price a catalog product.
#[instrument(skip(state, visitor, session, form))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(visitor): RequireStaff,
    session: Session,
    Form(form): Form<NewPriceForm>,
) -> Result<Response> {
    let price = match parse_price(&form.price) {
        Ok(price) => price,
        Err(message) => return Ok(flash_redirect(&session, Flash::error(message), BACK).await),
    };
    let agency_id = own_agency(&state, &visitor).await?;
    let product = NewAgencyProduct {
        agency_id,
        product_id: form.product_id,
        price,
    };

    match state
        .api()
        .create_agency_product(&visitor.session, &product)
        .await
    {
        Ok(created) => {
            let message = format!("{} added at {}.", created.options(), format_money(created.price));
            Ok(flash_redirect(&session, Flash::success(message), BACK).await)
        }
        Err(e) => form_failure(&session, e, BACK).await,
    }
}

#[derive(Debug, Deserialize)]
pub struct PriceForm {
    pub price: String,
}

/// Change a price.
#[instrument(skip(state, visitor, session, form), fields(product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<AgencyProductId>,
    RequireStaff(visitor): RequireStaff,
    session: Session,
    Form(form): Form<PriceForm>,
) -> Result<Response> {
    let price = match parse_price(&form.price) {
        Ok(price) => price,
        Err(message) => return Ok(flash_redirect(&session, Flash::error(message), BACK).await),
    };
    let agency_id = own_agency(&state, &visitor).await?;

    match state
        .api()
        .update_agency_product(&visitor.session, agency_id, id, price)
        .await
    {
        Ok(updated) => {
            let message = format!("Price set to {}.", format_money(updated.price));
            Ok(flash_redirect(&session, Flash::success(message), BACK).await)
        }
        Err(e) => form_failure(&session, e, BACK).await,
    }
}

/// Remove a product from the price list.
///
/// For htmx the row is removed right away (an empty 200 swaps it out); a
/// refused delete answers with an error so the row stays.
#[instrument(skip(state, visitor, session, headers), fields(product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<AgencyProductId>,
    RequireStaff(visitor): RequireStaff,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    let agency_id = own_agency(&state, &visitor).await?;
    let result = state
        .api()
        .delete_agency_product(&visitor.session, agency_id, id)
        .await;

    if is_htmx(&headers) {
        return match result {
            Ok(()) => Ok(().into_response()),
            Err(e) => Err(e.into()),
        };
    }
    match result {
        Ok(()) => Ok(flash_redirect(&session, Flash::success("Product removed."), BACK).await),
        Err(e) => form_failure(&session, e, BACK).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use copyhub_core::{AgencyId, ColorOption, PaperType, PrintType};

    use super::*;

    fn product(id: i32, paper: PaperType) -> Product {
        Product {
            id: ProductId::new(id),
            paper_type: paper,
            color_option: ColorOption::Color,
            print_type: PrintType::OneSided,
        }
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("0.25").unwrap(), Decimal::new(25, 2));
        assert_eq!(parse_price(" $1.50 ").unwrap(), Decimal::new(150, 2));
        assert_eq!(parse_price("0,5").unwrap(), Decimal::new(5, 1));
        assert!(parse_price("-1").is_err());
        assert!(parse_price("cheap").is_err());
    }

    #[test]
    fn test_unpriced_skips_priced_products() {
        let catalog = vec![product(1, PaperType::A4), product(2, PaperType::A3)];
        let priced = vec![AgencyProduct {
            id: AgencyProductId::new(10),
            agency_id: AgencyId::new(1),
            product_id: ProductId::new(1),
            paper_type: PaperType::A4,
            color_option: ColorOption::Color,
            print_type: PrintType::OneSided,
            price: Decimal::ONE,
        }];
        let left = unpriced(&catalog, &priced);
        assert_eq!(left.len(), 1);
        assert_eq!(left.first().unwrap().id, ProductId::new(2));
    }

    #[test]
    fn test_priced_view_raw_price() {
        let view = PricedProductView::from(&AgencyProduct {
            id: AgencyProductId::new(10),
            agency_id: AgencyId::new(1),
            product_id: ProductId::new(1),
            paper_type: PaperType::A4,
            color_option: ColorOption::Color,
            print_type: PrintType::OneSided,
            price: Decimal::new(2500, 3),
        });
        assert_eq!(view.raw_price, "2.5");
        assert_eq!(view.price, "$2.50");
    }
}
