//! Product catalog reads and admin availability changes.
//!
//! Reads go through a `moka` cache (short TTL, invalidated on every product
//! change seen on the change feed, including writes from other processes).
//! Live subscriptions bypass the cache.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use pasta_haus_core::{
    Category, Product, ProductId, ProductStatus, Unorderable, Variant, VariantId,
};

use super::live::LiveQuery;
use crate::db::{Backend, Collection, RepositoryError};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Menu,
    Product(ProductId),
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Menu(Arc<Vec<Product>>),
    Product(Box<Product>),
}

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error("product {product} has no size {variant}")]
    VariantNotFound {
        product: ProductId,
        variant: VariantId,
    },

    #[error("{name} cannot be ordered: {reason}")]
    Unorderable { name: String, reason: Unorderable },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Read access to the menu, plus the admin status switches.
#[derive(Clone)]
pub struct ProductCatalog {
    backend: Arc<dyn Backend>,
    cache: Cache<CacheKey, CacheValue>,
    best_seller_timeout: Duration,
}

impl ProductCatalog {
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        cache_ttl: Duration,
        best_seller_timeout: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(cache_ttl)
            .build();

        Self {
            backend,
            cache,
            best_seller_timeout,
        }
    }

    /// Every product, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store cannot be read.
    pub async fn list_products(&self) -> Result<Arc<Vec<Product>>, CatalogError> {
        if let Some(CacheValue::Menu(menu)) = self.cache.get(&CacheKey::Menu).await {
            tracing::debug!("Cache hit for menu");
            return Ok(menu);
        }

        let menu = Arc::new(self.backend.list_products().await?);
        self.cache
            .insert(CacheKey::Menu, CacheValue::Menu(Arc::clone(&menu)))
            .await;
        Ok(menu)
    }

    /// Products in one category, in menu order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store cannot be read.
    pub async fn by_category(&self, category: Category) -> Result<Vec<Product>, CatalogError> {
        Ok(self
            .list_products()
            .await?
            .iter()
            .filter(|p| p.category == category)
            .cloned()
            .collect())
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        let key = CacheKey::Product(id.clone());
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            return Ok(*product);
        }

        let product = self
            .backend
            .get_product(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        self.cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Products flagged as best sellers.
    ///
    /// Never fails: a slow or failing store yields an empty list so the home
    /// page can still render.
    pub async fn best_sellers(&self) -> Vec<Product> {
        match tokio::time::timeout(self.best_seller_timeout, self.list_products()).await {
            Ok(Ok(menu)) => menu.iter().filter(|p| p.is_best_seller).cloned().collect(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to load best sellers");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.best_seller_timeout.as_millis(),
                    "Timed out loading best sellers"
                );
                Vec::new()
            }
        }
    }

    /// Resolve a product and optional size for adding to a cart.
    ///
    /// # Errors
    ///
    /// - `CatalogError::NotFound` / `CatalogError::VariantNotFound` for unknown ids
    /// - `CatalogError::Unorderable` if the product or size is not available
    pub async fn orderable(
        &self,
        id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<(Product, Option<Variant>), CatalogError> {
        let product = self.get_product(id).await?;

        if let Err(reason) = product.check_orderable(variant_id) {
            return Err(match reason {
                Unorderable::UnknownVariant(variant) => CatalogError::VariantNotFound {
                    product: id.clone(),
                    variant,
                },
                reason => CatalogError::Unorderable {
                    name: product.name.clone(),
                    reason,
                },
            });
        }

        let variant = variant_id.and_then(|v| product.variant(v)).cloned();
        Ok((product, variant))
    }

    /// Live view of the whole menu, for the admin dashboard.
    #[must_use]
    pub fn subscribe_products(&self) -> LiveQuery<Product> {
        let backend = Arc::clone(&self.backend);
        LiveQuery::new(self.backend.changes(), Collection::Products, move || {
            let backend = Arc::clone(&backend);
            async move { backend.list_products().await }
        })
    }

    /// Set a product's availability.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    pub async fn set_product_status(
        &self,
        id: &ProductId,
        status: ProductStatus,
    ) -> Result<Product, CatalogError> {
        let product = self
            .backend
            .set_product_status(id, status)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CatalogError::NotFound(id.clone()),
                other => CatalogError::Repository(other),
            })?;

        self.invalidate_all().await;
        tracing::info!(product_id = %id, %status, "Product status changed");
        Ok(product)
    }

    /// Set one size's availability.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` or `CatalogError::VariantNotFound`
    /// for unknown ids.
    pub async fn set_variant_status(
        &self,
        id: &ProductId,
        variant_id: &VariantId,
        status: ProductStatus,
    ) -> Result<Product, CatalogError> {
        // Tell an unknown product apart from an unknown size.
        if self.backend.get_product(id).await?.is_none() {
            return Err(CatalogError::NotFound(id.clone()));
        }

        let product = self
            .backend
            .set_variant_status(id, variant_id, status)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CatalogError::VariantNotFound {
                    product: id.clone(),
                    variant: variant_id.clone(),
                },
                other => CatalogError::Repository(other),
            })?;

        self.invalidate_all().await;
        tracing::info!(
            product_id = %id,
            variant_id = %variant_id,
            %status,
            "Variant status changed"
        );
        Ok(product)
    }

    /// Clear the cache whenever the products collection changes.
    ///
    /// The task ends once the backend's change feed is dropped.
    #[must_use]
    pub fn spawn_invalidator(&self) -> JoinHandle<()> {
        let mut changes = self.backend.changes().subscribe();
        let cache = self.cache.clone();

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(Collection::Products) | Err(RecvError::Lagged(_)) => {
                        cache.invalidate_all();
                        tracing::debug!("Catalog cache cleared after product change");
                    }
                    Ok(_) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Drop every cached read.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pasta_haus_core::Price;

    use super::*;
    use crate::db::{MemoryBackend, ProductRepository};
    use crate::services::cart::tests::{lasagna, product};

    fn catalog(backend: Arc<dyn Backend>) -> ProductCatalog {
        ProductCatalog::new(backend, Duration::from_secs(60), Duration::from_millis(200))
    }

    fn menu() -> Vec<Product> {
        let mut muffins = product("3", 130);
        muffins.is_best_seller = true;
        vec![lasagna(), product("2", 140), muffins]
    }

    #[tokio::test]
    async fn test_category_and_best_sellers() {
        let catalog = catalog(Arc::new(MemoryBackend::with_products(menu())));

        let pastries = catalog.by_category(Category::Pastry).await.unwrap();
        assert_eq!(pastries.len(), 2);
        assert!(catalog.by_category(Category::Pasta).await.unwrap().len() == 1);

        let best = catalog.best_sellers().await;
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].id.as_str(), "3");
    }

    #[tokio::test]
    async fn test_status_change_invalidates_cache() {
        let catalog = catalog(Arc::new(MemoryBackend::with_products(menu())));
        let id = ProductId::new("2");
        assert_eq!(
            catalog.get_product(&id).await.unwrap().effective_status(),
            ProductStatus::Available
        );
        catalog.list_products().await.unwrap();

        catalog
            .set_product_status(&id, ProductStatus::SoldOut)
            .await
            .unwrap();

        assert_eq!(
            catalog.get_product(&id).await.unwrap().status,
            Some(ProductStatus::SoldOut)
        );
        let menu = catalog.list_products().await.unwrap();
        let listed = menu.iter().find(|p| p.id == id).unwrap();
        assert_eq!(listed.status, Some(ProductStatus::SoldOut));
        assert!(matches!(
            catalog.orderable(&id, None).await,
            Err(CatalogError::Unorderable { .. })
        ));
    }

    #[tokio::test]
    async fn test_product_change_from_elsewhere_clears_cache() {
        let backend = Arc::new(MemoryBackend::with_products(menu()));
        let catalog = catalog(backend.clone());
        let invalidator = catalog.spawn_invalidator();
        let id = ProductId::new("3");
        assert!(catalog.orderable(&id, None).await.is_ok());

        // Written straight to the store, as another instance would.
        backend
            .set_product_status(&id, ProductStatus::SoldOut)
            .await
            .unwrap();

        let sold_out = async {
            while catalog.orderable(&id, None).await.is_ok() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(2), sold_out)
            .await
            .unwrap();
        assert!(matches!(
            catalog.orderable(&id, None).await,
            Err(CatalogError::Unorderable { .. })
        ));
        invalidator.abort();
    }

    #[tokio::test]
    async fn test_variant_status_and_lookup_errors() {
        let catalog = catalog(Arc::new(MemoryBackend::with_products(menu())));
        let lasagna = ProductId::new("1");
        let medium = VariantId::new("medium");

        let (product, variant) = catalog.orderable(&lasagna, Some(&medium)).await.unwrap();
        assert_eq!(variant.unwrap().price, Price::from_pesos(399));
        assert_eq!(product.name, "Product 1");

        catalog
            .set_variant_status(&lasagna, &medium, ProductStatus::Unavailable)
            .await
            .unwrap();
        assert!(matches!(
            catalog.orderable(&lasagna, Some(&medium)).await,
            Err(CatalogError::Unorderable { .. })
        ));

        assert!(matches!(
            catalog
                .set_variant_status(&lasagna, &VariantId::new("jumbo"), ProductStatus::SoldOut)
                .await,
            Err(CatalogError::VariantNotFound { .. })
        ));
        assert!(matches!(
            catalog
                .set_product_status(&ProductId::new("99"), ProductStatus::SoldOut)
                .await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_best_sellers_time_out_to_empty() {
        let backend = Arc::new(MemoryBackend::with_products(menu()));
        backend.delay_reads(Duration::from_secs(5));
        let catalog = ProductCatalog::new(
            backend,
            Duration::from_secs(60),
            Duration::from_millis(20),
        );
        assert!(catalog.best_sellers().await.is_empty());
    }
}
