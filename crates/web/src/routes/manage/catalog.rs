//! Catalog curation (admin).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Response,
};
use copyhub_client::types::NewProduct;
use copyhub_core::{ColorOption, PaperType, PrintOptions, PrintType, ProductId};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::ManageNav;
use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, Flash, RequireAdmin};
use crate::routes::{Layout, flash_redirect, form_failure};
use crate::state::AppState;

const BACK: &str = "/manage/catalog";

#[derive(Debug, Clone)]
pub struct CatalogRowView {
    pub id: ProductId,
    pub paper: &'static str,
    pub color: &'static str,
    pub sides: &'static str,
}

#[derive(Template, WebTemplate)]
#[template(path = "manage/catalog.html")]
pub struct CatalogTemplate {
    pub layout: Layout,
    pub nav: ManageNav,
    pub products: Vec<CatalogRowView>,
    pub papers: Vec<&'static str>,
    pub colors: Vec<&'static str>,
    pub sides: Vec<&'static str>,
}

/// Display the catalog with the add form.
#[instrument(skip(state, visitor, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(visitor): RequireAdmin,
    session: Session,
    nonce: CspNonce,
) -> Result<CatalogTemplate> {
    let mut products = state.api().list_products(&visitor.session).await?;
    products.sort_by_key(|product| {
        (
            product.paper_type.label(),
            product.color_option.label(),
            product.print_type.label(),
        )
    });

    Ok(CatalogTemplate {
        nav: ManageNav::new(&visitor, "catalog"),
        products: products
            .iter()
            .map(|product| CatalogRowView {
                id: product.id,
                paper: product.paper_type.label(),
                color: product.color_option.label(),
                sides: product.print_type.label(),
            })
            .collect(),
        papers: PaperType::ALL.iter().map(|p| p.label()).collect(),
        colors: ColorOption::ALL.iter().map(|c| c.label()).collect(),
        sides: PrintType::ALL.iter().map(|s| s.label()).collect(),
        layout: Layout::new(&visitor, &session, nonce).await,
    })
}

#[derive(Debug, Deserialize)]
pub struct CatalogForm {
    pub paper_type: String,
    pub color_option: String,
    pub print_type: String,
}

impl CatalogForm {
    fn options(&self) -> std::result::Result<PrintOptions, String> {
        Ok(PrintOptions::new(
            self.paper_type.parse::<PaperType>().map_err(|e| e.to_string())?,
            self.color_option.parse::<ColorOption>().map_err(|e| e.to_string())?,
            self.print_type.parse::<PrintType>().map_err(|e| e.to_string())?,
        ))
    }
}

/// Add a catalog product.
#[instrument(skip(state, visitor, session, form))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(visitor): RequireAdmin,
    session: Session,
    Form(form): Form<CatalogForm>,
) -> Result<Response> {
    let options = match form.options() {
        Ok(options) => options,
        Err(message) => return Ok(flash_redirect(&session, Flash::error(message), BACK).await),
    };

    match state
        .api()
        .create_product(&visitor.session, NewProduct::from(options))
        .await
    {
        Ok(product) => {
            let message = format!("{} added to the catalog.", product.options());
            Ok(flash_redirect(&session, Flash::success(message), BACK).await)
        }
        Err(e) => form_failure(&session, e, BACK).await,
    }
}

/// Remove a catalog product.
#[instrument(skip(state, visitor, session), fields(product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    RequireAdmin(visitor): RequireAdmin,
    session: Session,
) -> Result<Response> {
    match state.api().delete_product(&visitor.session, id).await {
        Ok(()) => Ok(flash_redirect(&session, Flash::success("Product removed."), BACK).await),
        Err(e) => form_failure(&session, e, BACK).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_form_uses_labels() {
        let form = CatalogForm {
            paper_type: PaperType::A3.label().to_string(),
            color_option: ColorOption::Color.label().to_string(),
            print_type: PrintType::TwoSided.label().to_string(),
        };
        let options = form.options().unwrap();
        assert_eq!(options.paper_type, PaperType::A3);
        assert_eq!(options.print_type, PrintType::TwoSided);

        let bad = CatalogForm {
            paper_type: "B7".to_string(),
            ..form
        };
        assert!(bad.options().is_err());
    }
}
