//! Response cache for read-mostly backend data.
//!
//! Agencies, agency price lists and the catalog are cached for 5 minutes and
//! invalidated after any mutation that touches them. Agency product deletion
//! is optimistic: the entry leaves the cached price list before the backend
//! confirms and is put back if the backend refuses.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use copyhub_core::{Agency, AgencyId, AgencyProduct, AgencyProductId, Product};

/// Default time to live for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Cache key for backend responses.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Agencies,
    Agency(AgencyId),
    AgencyProducts(AgencyId),
    Catalog,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Agencies(Arc<Vec<Agency>>),
    Agency(Arc<Agency>),
    AgencyProducts(Arc<Vec<AgencyProduct>>),
    Catalog(Arc<Vec<Product>>),
}

/// An agency product taken out of the cache ahead of a delete.
#[derive(Debug, Clone)]
pub struct RemovedProduct {
    pub product: AgencyProduct,
    /// Position in the cached price list it was removed from.
    pub index: usize,
}

/// Shared response cache. Cheap to clone.
#[derive(Clone)]
pub struct ApiCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for ApiCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl Default for ApiCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ApiCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, value: CacheValue) {
        self.cache.insert(key, value).await;
    }

    pub async fn agencies(&self) -> Option<Arc<Vec<Agency>>> {
        match self.get(&CacheKey::Agencies).await {
            Some(CacheValue::Agencies(agencies)) => Some(agencies),
            _ => None,
        }
    }

    pub async fn agency(&self, id: AgencyId) -> Option<Arc<Agency>> {
        match self.get(&CacheKey::Agency(id)).await {
            Some(CacheValue::Agency(agency)) => Some(agency),
            _ => None,
        }
    }

    pub async fn agency_products(&self, id: AgencyId) -> Option<Arc<Vec<AgencyProduct>>> {
        match self.get(&CacheKey::AgencyProducts(id)).await {
            Some(CacheValue::AgencyProducts(products)) => Some(products),
            _ => None,
        }
    }

    pub async fn catalog(&self) -> Option<Arc<Vec<Product>>> {
        match self.get(&CacheKey::Catalog).await {
            Some(CacheValue::Catalog(products)) => Some(products),
            _ => None,
        }
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    /// Drop everything cached about one agency, including the listing it
    /// appears in.
    pub async fn invalidate_agency(&self, id: AgencyId) {
        self.cache.invalidate(&CacheKey::Agency(id)).await;
        self.cache.invalidate(&CacheKey::AgencyProducts(id)).await;
        self.cache.invalidate(&CacheKey::Agencies).await;
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Remove an agency product from the cached price list.
    ///
    /// Returns what was removed so it can be restored, or `None` if the list
    /// is not cached or does not hold the product.
    pub async fn take_agency_product(
        &self,
        agency_id: AgencyId,
        product_id: AgencyProductId,
    ) -> Option<RemovedProduct> {
        let products = self.agency_products(agency_id).await?;
        let index = products.iter().position(|p| p.id == product_id)?;

        let mut remaining = products.as_ref().clone();
        let product = remaining.remove(index);
        self.insert(
            CacheKey::AgencyProducts(agency_id),
            CacheValue::AgencyProducts(Arc::new(remaining)),
        )
        .await;

        Some(RemovedProduct { product, index })
    }

    /// Put back a product removed by [`take_agency_product`](Self::take_agency_product).
    ///
    /// If the list was evicted in the meantime nothing is restored; the next
    /// read fetches the backend's copy.
    pub async fn restore_agency_product(&self, removed: RemovedProduct) {
        let agency_id = removed.product.agency_id;
        let Some(products) = self.agency_products(agency_id).await else {
            return;
        };
        if products.iter().any(|p| p.id == removed.product.id) {
            return;
        }

        let mut restored = products.as_ref().clone();
        let index = removed.index.min(restored.len());
        restored.insert(index, removed.product);
        self.insert(
            CacheKey::AgencyProducts(agency_id),
            CacheValue::AgencyProducts(Arc::new(restored)),
        )
        .await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use copyhub_core::{ColorOption, PaperType, PrintType, ProductId};

    fn product(id: i32, paper_type: PaperType) -> AgencyProduct {
        AgencyProduct {
            id: AgencyProductId::new(id),
            agency_id: AgencyId::new(7),
            product_id: ProductId::new(id),
            paper_type,
            color_option: ColorOption::Color,
            print_type: PrintType::OneSided,
            price: Decimal::new(25, 2),
        }
    }

    async fn seeded() -> ApiCache {
        let cache = ApiCache::default();
        cache
            .insert(
                CacheKey::AgencyProducts(AgencyId::new(7)),
                CacheValue::AgencyProducts(Arc::new(vec![
                    product(1, PaperType::A4),
                    product(2, PaperType::A3),
                    product(3, PaperType::A5),
                ])),
            )
            .await;
        cache
    }

    #[tokio::test]
    async fn test_take_removes_before_confirmation() {
        let cache = seeded().await;
        let removed = cache
            .take_agency_product(AgencyId::new(7), AgencyProductId::new(2))
            .await
            .unwrap();

        assert_eq!(removed.index, 1);
        let ids: Vec<i32> = cache
            .agency_products(AgencyId::new(7))
            .await
            .unwrap()
            .iter()
            .map(|p| p.id.as_i32())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_restore_puts_product_back_in_place() {
        let cache = seeded().await;
        let removed = cache
            .take_agency_product(AgencyId::new(7), AgencyProductId::new(2))
            .await
            .unwrap();
        cache.restore_agency_product(removed).await;

        let ids: Vec<i32> = cache
            .agency_products(AgencyId::new(7))
            .await
            .unwrap()
            .iter()
            .map(|p| p.id.as_i32())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_take_unknown_product() {
        let cache = seeded().await;
        assert!(
            cache
                .take_agency_product(AgencyId::new(7), AgencyProductId::new(99))
                .await
                .is_none()
        );
        assert!(
            cache
                .take_agency_product(AgencyId::new(8), AgencyProductId::new(1))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_invalidate_agency() {
        let cache = seeded().await;
        cache.invalidate_agency(AgencyId::new(7)).await;
        assert!(cache.agency_products(AgencyId::new(7)).await.is_none());
    }
}
