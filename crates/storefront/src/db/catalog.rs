//! Catalog repository for `storefront.products` and `storefront.categories`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use little_sprout_core::{Category, CategoryId, Money, Product, ProductId};

use crate::catalog::{CatalogError, CatalogProvider};

const PRODUCT_COLUMNS: &str = "id, category_id, name, description, image, price, sizes, colors, \
                               featured, in_stock, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, name, image, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: CategoryId,
    name: String,
    description: Option<String>,
    image: Option<String>,
    price: Money,
    sizes: Vec<String>,
    colors: Vec<String>,
    featured: bool,
    in_stock: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            description: row.description,
            image: row.image,
            price: row.price,
            sizes: row.sizes,
            colors: row.colors,
            featured: row.featured,
            in_stock: row.in_stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escape `%`, `_` and `\` so `term` matches literally inside `ILIKE`.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// `PostgreSQL`-backed catalog.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_products(
        &self,
        filter: &str,
        bind: Option<&str>,
    ) -> Result<Vec<Product>, CatalogError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM storefront.products {filter} ORDER BY name");
        let mut query = sqlx::query_as::<_, ProductRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }
}

#[async_trait]
impl CatalogProvider for PgCatalog {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    #[instrument(skip(self))]
    async fn products(&self) -> Result<Vec<Product>, CatalogError> {
        self.fetch_products("", None).await
    }

    #[instrument(skip(self))]
    async fn featured_products(&self) -> Result<Vec<Product>, CatalogError> {
        self.fetch_products("WHERE featured AND in_stock", None)
            .await
    }

    #[instrument(skip(self), fields(category_id = %id))]
    async fn products_by_category(&self, id: &CategoryId) -> Result<Vec<Product>, CatalogError> {
        self.fetch_products("WHERE category_id = $1 AND in_stock", Some(id.as_str()))
            .await
    }

    #[instrument(skip(self))]
    async fn search_products(&self, term: &str) -> Result<Vec<Product>, CatalogError> {
        let pattern = like_pattern(term);
        self.fetch_products(
            "WHERE in_stock AND (name ILIKE $1 OR description ILIKE $1)",
            Some(&pattern),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM storefront.categories ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    #[instrument(skip(self), fields(category_id = %id))]
    async fn category(&self, id: &CategoryId) -> Result<Option<Category>, CatalogError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM storefront.categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Category::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_wraps_term() {
        assert_eq!(like_pattern("onesie"), "%onesie%");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\"), "%c:\\\\%");
    }
}
