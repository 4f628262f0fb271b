//! Catalog access.
//!
//! # Architecture
//!
//! - [`CatalogProvider`] is the seam the cart reads products through
//! - [`crate::db::catalog::PgCatalog`] queries the managed backend's tables
//! - [`cache::CachedCatalog`] wraps any provider with an in-memory `moka`
//!   cache (5 minute TTL by default)
//! - [`memory::MemoryCatalog`] serves a fixed product list (tests, demos)
//!
//! Listing queries other than [`CatalogProvider::products`] only return
//! in-stock products.

pub mod cache;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use little_sprout_core::{Category, CategoryId, Product, ProductId};

pub use cache::CachedCatalog;
pub use memory::MemoryCatalog;

/// Errors that can occur when reading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The catalog is not reachable.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read access to products and categories.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Look up a product by ID. `Ok(None)` if it doesn't exist.
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError>;

    /// Every product, by name.
    async fn products(&self) -> Result<Vec<Product>, CatalogError>;

    /// Featured, in-stock products, by name.
    async fn featured_products(&self) -> Result<Vec<Product>, CatalogError>;

    /// In-stock products of a category, by name.
    async fn products_by_category(&self, id: &CategoryId) -> Result<Vec<Product>, CatalogError>;

    /// In-stock products whose name or description contains `term`
    /// (case-insensitive), by name.
    async fn search_products(&self, term: &str) -> Result<Vec<Product>, CatalogError>;

    /// Every category, by name.
    async fn categories(&self) -> Result<Vec<Category>, CatalogError>;

    /// Look up a category by ID. `Ok(None)` if it doesn't exist.
    async fn category(&self, id: &CategoryId) -> Result<Option<Category>, CatalogError>;
}
