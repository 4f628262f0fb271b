//! Read-through cache over a [`CatalogProvider`].
//!
//! Serves the product and category routes. Entries expire after the TTL and
//! are never invalidated early, so listings may lag catalog edits by up to
//! that long. Misses (`None`) are not cached, so a product added to the
//! catalog shows up immediately. The cart session does not read through this
//! cache; see `AppState::assemble`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{debug, instrument};

use little_sprout_core::{Category, CategoryId, Product, ProductId};

use super::{CatalogError, CatalogProvider};

/// Default time-to-live for cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Product(ProductId),
    Products,
    Featured,
    Category(CategoryId),
    CategoryProducts(CategoryId),
    Categories,
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Product(Box<Product>),
    Products(Arc<Vec<Product>>),
    Category(Box<Category>),
    Categories(Arc<Vec<Category>>),
}

/// Catalog wrapper that caches reads in memory.
///
/// Search results are not cached.
#[derive(Clone)]
pub struct CachedCatalog {
    inner: Arc<dyn CatalogProvider>,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for CachedCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCatalog")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl CachedCatalog {
    /// Wrap `inner` with a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(inner: Arc<dyn CatalogProvider>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    async fn cached_products<F>(&self, key: CacheKey, fetch: F) -> Result<Vec<Product>, CatalogError>
    where
        F: Future<Output = Result<Vec<Product>, CatalogError>> + Send,
    {
        if let Some(CacheValue::Products(products)) = self.cache.get(&key).await {
            debug!(?key, "catalog cache hit");
            return Ok(products.as_ref().clone());
        }

        let products = fetch.await?;
        self.cache
            .insert(key, CacheValue::Products(Arc::new(products.clone())))
            .await;
        Ok(products)
    }
}

#[async_trait]
impl CatalogProvider for CachedCatalog {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        let key = CacheKey::Product(id.clone());
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!("catalog cache hit");
            return Ok(Some(*product));
        }

        let product = self.inner.product(id).await?;
        if let Some(ref p) = product {
            self.cache
                .insert(key, CacheValue::Product(Box::new(p.clone())))
                .await;
        }
        Ok(product)
    }

    async fn products(&self) -> Result<Vec<Product>, CatalogError> {
        self.cached_products(CacheKey::Products, self.inner.products())
            .await
    }

    async fn featured_products(&self) -> Result<Vec<Product>, CatalogError> {
        self.cached_products(CacheKey::Featured, self.inner.featured_products())
            .await
    }

    async fn products_by_category(&self, id: &CategoryId) -> Result<Vec<Product>, CatalogError> {
        self.cached_products(
            CacheKey::CategoryProducts(id.clone()),
            self.inner.products_by_category(id),
        )
        .await
    }

    async fn search_products(&self, term: &str) -> Result<Vec<Product>, CatalogError> {
        self.inner.search_products(term).await
    }

    async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
        let key = CacheKey::Categories;
        if let Some(CacheValue::Categories(categories)) = self.cache.get(&key).await {
            return Ok(categories.as_ref().clone());
        }

        let categories = self.inner.categories().await?;
        self.cache
            .insert(key, CacheValue::Categories(Arc::new(categories.clone())))
            .await;
        Ok(categories)
    }

    async fn category(&self, id: &CategoryId) -> Result<Option<Category>, CatalogError> {
        let key = CacheKey::Category(id.clone());
        if let Some(CacheValue::Category(category)) = self.cache.get(&key).await {
            return Ok(Some(*category));
        }

        let category = self.inner.category(id).await?;
        if let Some(ref c) = category {
            self.cache
                .insert(key, CacheValue::Category(Box::new(c.clone())))
                .await;
        }
        Ok(category)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use little_sprout_core::Money;

    use super::*;
    use crate::catalog::MemoryCatalog;

    fn product(id: &str, cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            category_id: CategoryId::new("c1"),
            name: id.to_owned(),
            description: None,
            image: None,
            price: Money::from_cents(cents),
            sizes: Vec::new(),
            colors: Vec::new(),
            featured: true,
            in_stock: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_product_lookup_is_cached() {
        let backing = MemoryCatalog::new(Vec::new(), vec![product("p1", 1000)]);
        let cached = CachedCatalog::new(Arc::new(backing.clone()), DEFAULT_TTL);
        let id = ProductId::new("p1");

        assert_eq!(
            cached.product(&id).await.unwrap().unwrap().price,
            Money::from_cents(1000)
        );

        // A change behind the cache is not visible until the entry expires
        backing.upsert_product(product("p1", 1500)).await;
        assert_eq!(
            cached.product(&id).await.unwrap().unwrap().price,
            Money::from_cents(1000)
        );
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let backing = MemoryCatalog::new(Vec::new(), vec![product("p1", 1000)]);
        let cached = CachedCatalog::new(Arc::new(backing.clone()), Duration::from_millis(50));
        let id = ProductId::new("p1");

        assert!(cached.product(&id).await.unwrap().is_some());
        backing.upsert_product(product("p1", 1500)).await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(
            cached.product(&id).await.unwrap().unwrap().price,
            Money::from_cents(1500)
        );
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let backing = MemoryCatalog::default();
        let cached = CachedCatalog::new(Arc::new(backing.clone()), DEFAULT_TTL);
        let id = ProductId::new("late");

        assert!(cached.product(&id).await.unwrap().is_none());
        backing.upsert_product(product("late", 500)).await;
        assert!(cached.product(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_listing_is_cached() {
        let backing = MemoryCatalog::new(Vec::new(), vec![product("a", 100)]);
        let cached = CachedCatalog::new(Arc::new(backing.clone()), DEFAULT_TTL);

        assert_eq!(cached.featured_products().await.unwrap().len(), 1);
        backing.upsert_product(product("b", 100)).await;
        assert_eq!(cached.featured_products().await.unwrap().len(), 1);
        assert_eq!(cached.search_products("b").await.unwrap().len(), 1);
    }
}
