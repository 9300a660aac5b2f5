//! Catalog products and agency price lists.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;

use super::{ApiClient, ApiError, ApiRequest};
use crate::cache::{CacheKey, CacheValue};
use crate::session::Session;
use crate::types::{NewAgencyProduct, NewProduct, UpdatePriceRequest};
use copyhub_core::{AgencyId, AgencyProduct, AgencyProductId, Product, ProductId};

impl ApiClient {
    // =========================================================================
    // Catalog
    // =========================================================================

    /// List catalog products. Cached for 5 minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, session))]
    pub async fn list_products(&self, session: &Session) -> Result<Vec<Product>, ApiError> {
        if let Some(products) = self.cache().catalog().await {
            return Ok(products.as_ref().clone());
        }

        let products: Vec<Product> = self.fetch(session, ApiRequest::get("products")).await?;
        self.cache()
            .insert(
                CacheKey::Catalog,
                CacheValue::Catalog(Arc::new(products.clone())),
            )
            .await;
        Ok(products)
    }

    /// Add a catalog product.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin or the triple exists.
    #[instrument(skip(self, session))]
    pub async fn create_product(
        &self,
        session: &Session,
        product: NewProduct,
    ) -> Result<Product, ApiError> {
        let request = ApiRequest::post("products").json(&product)?;
        let created = self.fetch(session, request).await?;
        self.cache().invalidate(&CacheKey::Catalog).await;
        Ok(created)
    }

    /// Remove a catalog product.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin or the request fails.
    #[instrument(skip(self, session), fields(product_id = %id))]
    pub async fn delete_product(&self, session: &Session, id: ProductId) -> Result<(), ApiError> {
        self.send(session, ApiRequest::delete(format!("products/{id}")))
            .await?;
        self.cache().invalidate(&CacheKey::Catalog).await;
        Ok(())
    }

    // =========================================================================
    // Agency products
    // =========================================================================

    /// List an agency's priced products. Cached for 5 minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, session), fields(agency_id = %agency_id))]
    pub async fn list_agency_products(
        &self,
        session: &Session,
        agency_id: AgencyId,
    ) -> Result<Vec<AgencyProduct>, ApiError> {
        if let Some(products) = self.cache().agency_products(agency_id).await {
            return Ok(products.as_ref().clone());
        }

        let products: Vec<AgencyProduct> = self
            .fetch(session, ApiRequest::get(format!("agencies/{agency_id}/products")))
            .await?;
        self.cache()
            .insert(
                CacheKey::AgencyProducts(agency_id),
                CacheValue::AgencyProducts(Arc::new(products.clone())),
            )
            .await;
        Ok(products)
    }

    /// Price a catalog product for an agency.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BusinessRule` for a negative price, or an error if
    /// the request fails.
    #[instrument(skip(self, session, product), fields(agency_id = %product.agency_id, product_id = %product.product_id))]
    pub async fn create_agency_product(
        &self,
        session: &Session,
        product: &NewAgencyProduct,
    ) -> Result<AgencyProduct, ApiError> {
        ensure_price(product.price)?;
        let request = ApiRequest::post("agency-products").json(product)?;
        let created = self.fetch(session, request).await?;
        self.cache().invalidate_agency(product.agency_id).await;
        Ok(created)
    }

    /// Change the price of an agency product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BusinessRule` for a negative price, or an error if
    /// the request fails.
    #[instrument(skip(self, session), fields(agency_id = %agency_id, product_id = %id))]
    pub async fn update_agency_product(
        &self,
        session: &Session,
        agency_id: AgencyId,
        id: AgencyProductId,
        price: Decimal,
    ) -> Result<AgencyProduct, ApiError> {
        ensure_price(price)?;
        let request =
            ApiRequest::put(format!("agency-products/{id}")).json(&UpdatePriceRequest { price })?;
        let updated = self.fetch(session, request).await?;
        self.cache().invalidate_agency(agency_id).await;
        Ok(updated)
    }

    /// Delete an agency product.
    ///
    /// The product leaves the cached price list before the backend confirms;
    /// if the backend refuses it is put back and the error returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the delete.
    #[instrument(skip(self, session), fields(agency_id = %agency_id, product_id = %id))]
    pub async fn delete_agency_product(
        &self,
        session: &Session,
        agency_id: AgencyId,
        id: AgencyProductId,
    ) -> Result<(), ApiError> {
        let removed = self.cache().take_agency_product(agency_id, id).await;

        match self
            .send(session, ApiRequest::delete(format!("agency-products/{id}")))
            .await
        {
            Ok(()) => {
                self.cache().invalidate(&CacheKey::Agency(agency_id)).await;
                self.cache().invalidate(&CacheKey::Agencies).await;
                Ok(())
            }
            Err(e) => {
                if let Some(removed) = removed {
                    tracing::warn!(error = %e, "Delete refused, restoring product");
                    self.cache().restore_agency_product(removed).await;
                }
                Err(e)
            }
        }
    }
}

fn ensure_price(price: Decimal) -> Result<(), ApiError> {
    if price.is_sign_negative() {
        return Err(ApiError::BusinessRule(
            "Price per page cannot be negative".to_string(),
        ));
    }
    Ok(())
}
