//! Catalog records.
//!
//! Products and categories are owned by the catalog. The cart only ever holds
//! a read-time snapshot of a [`Product`] and refers to it by [`ProductId`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId};
use super::price::Money;

/// A product category (e.g. "Onesies", "Sleepwear").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Storage path or URL of the category image.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product as sold in the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    /// Storage path or URL of the product image.
    pub image: Option<String>,
    pub price: Money,
    /// Available sizes, in display order.
    pub sizes: Vec<String>,
    /// Available colors, in display order.
    pub colors: Vec<String>,
    pub featured: bool,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Case-insensitive match of `term` against the name and description.
    #[must_use]
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, description: Option<&str>) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new("p1"),
            category_id: CategoryId::new("c1"),
            name: name.to_owned(),
            description: description.map(str::to_owned),
            image: None,
            price: Money::from_cents(1299),
            sizes: vec!["0-3M".to_owned(), "3-6M".to_owned()],
            colors: vec!["Sage".to_owned()],
            featured: false,
            in_stock: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_search_matches_name_case_insensitive() {
        let p = product("Organic Cotton Onesie", None);
        assert!(p.matches_search("onesie"));
        assert!(p.matches_search("COTTON"));
        assert!(!p.matches_search("sleeper"));
    }

    #[test]
    fn test_search_matches_description() {
        let p = product("Romper", Some("Soft bamboo sleeper for newborns"));
        assert!(p.matches_search("bamboo"));
        assert!(!p.matches_search("wool"));
    }
}
