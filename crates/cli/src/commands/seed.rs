//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! categories:
//!   - id: sleepwear
//!     name: Sleepwear
//! products:
//!   - id: footed-sleeper
//!     category_id: sleepwear
//!     name: Footed Sleeper
//!     price: "18.00"
//!     sizes: [0-3M, 3-6M]
//!     colors: [Sage, Oat]
//!     featured: true
//! ```
//!
//! Rows are upserted by ID inside a single transaction, so running the same
//! file twice is harmless. Every product must reference a category from the
//! same file.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use little_sprout_core::Money;
use little_sprout_storefront::config::{ConfigError, StorefrontConfig};
use little_sprout_storefront::db;

/// Errors from seeding.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid seed data: {0}")]
    Invalid(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Contents of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub id: String,
    pub category_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

const fn default_in_stock() -> bool {
    true
}

impl SeedFile {
    /// Parse and validate a seed document.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Yaml` for malformed YAML and `SeedError::Invalid`
    /// for duplicate IDs, unknown categories, blank names or negative prices.
    pub fn parse(yaml: &str) -> Result<Self, SeedError> {
        let file: Self = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<(), SeedError> {
        let mut category_ids = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(SeedError::Invalid(format!(
                    "category {} has no name",
                    category.id
                )));
            }
            if !category_ids.insert(category.id.as_str()) {
                return Err(SeedError::Invalid(format!(
                    "duplicate category id {}",
                    category.id
                )));
            }
        }

        let mut product_ids = HashSet::new();
        for product in &self.products {
            if !product_ids.insert(product.id.as_str()) {
                return Err(SeedError::Invalid(format!(
                    "duplicate product id {}",
                    product.id
                )));
            }
            if !category_ids.contains(product.category_id.as_str()) {
                return Err(SeedError::Invalid(format!(
                    "product {} references unknown category {}",
                    product.id, product.category_id
                )));
            }
            if product.name.trim().is_empty() {
                return Err(SeedError::Invalid(format!("product {} has no name", product.id)));
            }
            if product.price.is_sign_negative() {
                return Err(SeedError::Invalid(format!(
                    "product {} has a negative price",
                    product.id
                )));
            }
        }
        Ok(())
    }
}

/// Seed the catalog from `file_path`.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, no database is
/// configured, or a write fails. Nothing is written unless every row succeeds.
pub async fn catalog(file_path: &Path, dry_run: bool) -> Result<(), SeedError> {
    let yaml = std::fs::read_to_string(file_path)?;
    let seed = SeedFile::parse(&yaml)?;
    info!(
        categories = seed.categories.len(),
        products = seed.products.len(),
        "Seed file is valid"
    );

    if dry_run {
        info!("Dry run, nothing written");
        return Ok(());
    }

    let config = StorefrontConfig::from_env()?;
    let pool = db::create_pool(config.require_database_url()?).await?;
    upsert(&pool, &seed).await?;

    info!("Catalog seeded");
    Ok(())
}

async fn upsert(pool: &PgPool, seed: &SeedFile) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for category in &seed.categories {
        sqlx::query(
            "INSERT INTO storefront.categories (id, name, image) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE \
             SET name = EXCLUDED.name, image = EXCLUDED.image, updated_at = now()",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.image)
        .execute(&mut *tx)
        .await?;
    }

    for product in &seed.products {
        let price = Money::new(product.price).round_to_cents();
        sqlx::query(
            "INSERT INTO storefront.products \
               (id, category_id, name, description, image, price, sizes, colors, featured, in_stock) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE \
             SET category_id = EXCLUDED.category_id, name = EXCLUDED.name, \
                 description = EXCLUDED.description, image = EXCLUDED.image, \
                 price = EXCLUDED.price, sizes = EXCLUDED.sizes, colors = EXCLUDED.colors, \
                 featured = EXCLUDED.featured, in_stock = EXCLUDED.in_stock, updated_at = now()",
        )
        .bind(&product.id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.image)
        .bind(price.amount())
        .bind(&product.sizes)
        .bind(&product.colors)
        .bind(product.featured)
        .bind(product.in_stock)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
categories:
  - id: sleepwear
    name: Sleepwear
products:
  - id: footed-sleeper
    category_id: sleepwear
    name: Footed Sleeper
    price: "18.00"
    sizes: [0-3M, 3-6M]
    featured: true
  - id: sleep-sack
    category_id: sleepwear
    name: Sleep Sack
    price: 24.5
    in_stock: false
"#;

    #[test]
    fn test_parse_sample() {
        let seed = SeedFile::parse(SAMPLE).unwrap();

        assert_eq!(seed.categories.len(), 1);
        assert_eq!(seed.products.len(), 2);
        assert_eq!(seed.products[0].price, Decimal::new(1800, 2));
        assert_eq!(seed.products[0].sizes, vec!["0-3M", "3-6M"]);
        assert!(seed.products[0].in_stock);
        assert!(!seed.products[1].in_stock);
        assert!(!seed.products[1].featured);
    }

    #[test]
    fn test_unknown_category() {
        let yaml = "products:\n  - {id: p1, category_id: hats, name: Hat, price: \"5\"}\n";
        assert!(matches!(SeedFile::parse(yaml), Err(SeedError::Invalid(_))));
    }

    #[test]
    fn test_duplicate_product() {
        let yaml = r#"
categories: [{id: c, name: C}]
products:
  - {id: p1, category_id: c, name: A, price: "1"}
  - {id: p1, category_id: c, name: B, price: "2"}
"#;
        let err = SeedFile::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate product id p1"));
    }

    #[test]
    fn test_negative_price() {
        let yaml = r#"
categories: [{id: c, name: C}]
products: [{id: p1, category_id: c, name: A, price: "-1.00"}]
"#;
        assert!(matches!(SeedFile::parse(yaml), Err(SeedError::Invalid(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            SeedFile::parse("categories: [oops"),
            Err(SeedError::Yaml(_))
        ));
    }
}
