//! Fixed, in-memory catalog.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use little_sprout_core::{Category, CategoryId, Product, ProductId};

use super::{CatalogError, CatalogProvider};

/// Catalog served from memory.
///
/// Products can be replaced or removed at runtime to simulate catalog edits.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    inner: Arc<RwLock<Contents>>,
}

#[derive(Debug, Default)]
struct Contents {
    categories: Vec<Category>,
    products: Vec<Product>,
}

impl MemoryCatalog {
    /// Create a catalog holding `categories` and `products`.
    #[must_use]
    pub fn new(categories: Vec<Category>, products: Vec<Product>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Contents {
                categories,
                products,
            })),
        }
    }

    /// Insert a product or replace the one with the same ID.
    pub async fn upsert_product(&self, product: Product) {
        let mut contents = self.inner.write().await;
        if let Some(existing) = contents.products.iter_mut().find(|p| p.id == product.id) {
            *existing = product;
        } else {
            contents.products.push(product);
        }
    }

    /// Remove a product. Returns `true` if it existed.
    pub async fn remove_product(&self, id: &ProductId) -> bool {
        let mut contents = self.inner.write().await;
        let before = contents.products.len();
        contents.products.retain(|p| &p.id != id);
        contents.products.len() < before
    }

    async fn sorted_where(&self, keep: impl Fn(&Product) -> bool + Send) -> Vec<Product> {
        let contents = self.inner.read().await;
        let mut products: Vec<Product> = contents
            .products
            .iter()
            .filter(|p| keep(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }
}

#[async_trait]
impl CatalogProvider for MemoryCatalog {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        let contents = self.inner.read().await;
        Ok(contents.products.iter().find(|p| &p.id == id).cloned())
    }

    async fn products(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.sorted_where(|_| true).await)
    }

    async fn featured_products(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.sorted_where(|p| p.featured && p.in_stock).await)
    }

    async fn products_by_category(&self, id: &CategoryId) -> Result<Vec<Product>, CatalogError> {
        Ok(self
            .sorted_where(|p| &p.category_id == id && p.in_stock)
            .await)
    }

    async fn search_products(&self, term: &str) -> Result<Vec<Product>, CatalogError> {
        Ok(self
            .sorted_where(|p| p.in_stock && p.matches_search(term))
            .await)
    }

    async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
        let contents = self.inner.read().await;
        let mut categories = contents.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn category(&self, id: &CategoryId) -> Result<Option<Category>, CatalogError> {
        let contents = self.inner.read().await;
        Ok(contents.categories.iter().find(|c| &c.id == id).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;
    use little_sprout_core::Money;

    use super::*;

    fn product(id: &str, name: &str, category: &str, featured: bool, in_stock: bool) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            category_id: CategoryId::new(category),
            name: name.to_owned(),
            description: None,
            image: None,
            price: Money::from_cents(999),
            sizes: Vec::new(),
            colors: Vec::new(),
            featured,
            in_stock,
            created_at: now,
            updated_at: now,
        }
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(
            Vec::new(),
            vec![
                product("p1", "Zip Sleeper", "sleep", true, true),
                product("p2", "Bodysuit", "basics", true, false),
                product("p3", "Bamboo Sleeper", "sleep", false, true),
            ],
        )
    }

    #[tokio::test]
    async fn test_featured_requires_in_stock() {
        let featured = catalog().featured_products().await.unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].id, ProductId::new("p1"));
    }

    #[tokio::test]
    async fn test_by_category_sorted_by_name() {
        let sleep = catalog()
            .products_by_category(&CategoryId::new("sleep"))
            .await
            .unwrap();
        let names: Vec<&str> = sleep.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Bamboo Sleeper", "Zip Sleeper"]);
    }

    #[tokio::test]
    async fn test_search_skips_out_of_stock() {
        let c = catalog();
        assert_eq!(c.search_products("sleeper").await.unwrap().len(), 2);
        assert!(c.search_products("bodysuit").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let c = catalog();
        let mut p = c.product(&ProductId::new("p1")).await.unwrap().unwrap();
        p.price = Money::from_cents(100);
        c.upsert_product(p).await;
        assert_eq!(
            c.product(&ProductId::new("p1")).await.unwrap().unwrap().price,
            Money::from_cents(100)
        );

        assert!(c.remove_product(&ProductId::new("p1")).await);
        assert!(c.product(&ProductId::new("p1")).await.unwrap().is_none());
    }
}
