//! Product hydration for cart lines.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use little_sprout_core::CartItem;

use crate::catalog::{CatalogError, CatalogProvider};

/// What to do with a cart line whose product is gone from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingProductPolicy {
    /// Hide the line from the cart and its totals. The stored line is kept.
    #[default]
    Drop,
    /// Show the line without a product; it counts toward item totals at zero price.
    Unpriced,
}

impl FromStr for MissingProductPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "unpriced" => Ok(Self::Unpriced),
            other => Err(format!("expected `drop` or `unpriced`, got `{other}`")),
        }
    }
}

/// Attach the current product to every line.
///
/// Lookups run one after another. A catalog error aborts hydration; a
/// missing product is handled per `policy`.
///
/// # Errors
///
/// Returns the first `CatalogError` encountered.
pub async fn hydrate(
    catalog: &dyn CatalogProvider,
    items: Vec<CartItem>,
    policy: MissingProductPolicy,
) -> Result<Vec<CartItem>, CatalogError> {
    let mut hydrated = Vec::with_capacity(items.len());
    for mut item in items {
        match catalog.product(&item.product_id).await? {
            Some(product) => {
                item.product = Some(product);
                hydrated.push(item);
            }
            None => {
                warn!(
                    product_id = %item.product_id,
                    cart_item_id = %item.id,
                    ?policy,
                    "Cart line references a product missing from the catalog"
                );
                if policy == MissingProductPolicy::Unpriced {
                    item.product = None;
                    hydrated.push(item);
                }
            }
        }
    }
    Ok(hydrated)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;
    use little_sprout_core::{CartItemId, CategoryId, Money, Product, ProductId};

    use super::*;
    use crate::catalog::MemoryCatalog;

    fn catalog() -> MemoryCatalog {
        let now = Utc::now();
        MemoryCatalog::new(
            Vec::new(),
            vec![Product {
                id: ProductId::new("p1"),
                category_id: CategoryId::new("c1"),
                name: "Knit Cardigan".to_owned(),
                description: None,
                image: None,
                price: Money::from_cents(2400),
                sizes: Vec::new(),
                colors: Vec::new(),
                featured: false,
                in_stock: true,
                created_at: now,
                updated_at: now,
            }],
        )
    }

    fn line(n: u64, product: &str) -> CartItem {
        CartItem {
            id: CartItemId::Local(n),
            product_id: ProductId::new(product),
            product: None,
            quantity: 1,
            selected_size: None,
            selected_color: None,
            added_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_drop_policy_hides_missing() {
        let items = hydrate(
            &catalog(),
            vec![line(0, "p1"), line(1, "gone")],
            MissingProductPolicy::Drop,
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price(), Money::from_cents(2400));
    }

    #[tokio::test]
    async fn test_unpriced_policy_keeps_missing() {
        let items = hydrate(
            &catalog(),
            vec![line(0, "p1"), line(1, "gone")],
            MissingProductPolicy::Unpriced,
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 2);
        assert!(items[1].product.is_none());
        assert_eq!(items[1].line_total(), Money::ZERO);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("drop".parse(), Ok(MissingProductPolicy::Drop));
        assert_eq!("Unpriced".parse(), Ok(MissingProductPolicy::Unpriced));
        assert!("keep".parse::<MissingProductPolicy>().is_err());
    }
}
