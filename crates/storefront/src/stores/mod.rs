//! Cart persistence seams.
//!
//! Two stores back the cart, and which one is authoritative depends on who is
//! signed in:
//!
//! - [`RemoteCartStore`] - one row per cart line, keyed by owning user. Rows
//!   are addressed by their server-assigned UUID. Implemented by
//!   [`crate::db::cart_items::PgCartStore`] and [`memory::MemoryCartStore`].
//! - [`LocalCartStore`] - a single [`LocalCart`] record on the device under
//!   [`LOCAL_CART_KEY`], read and written whole. Implemented by
//!   [`file::FileLocalStore`] and [`memory::MemoryLocalStore`].
//!
//! Neither store offers transactions across calls.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use little_sprout_core::{
    AddToCartRequest, CartItem, CartItemId, LineKey, LocalCart, ProductId, UserId,
};

/// Key under which the device-local cart record is stored.
pub const LOCAL_CART_KEY: &str = "baby_shop_cart";

/// Errors returned by cart stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Local storage could not be read or written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store refused the operation (e.g. a quantity out of range).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The store is not reachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A cart line as stored in the remote table.
///
/// Absent size/color are stored as empty strings so that line lookups can use
/// plain equality.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CartRow {
    pub id: Uuid,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub selected_size: String,
    pub selected_color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartRow {
    /// Stored quantity as a line quantity.
    ///
    /// The table constrains quantities to be positive; anything else clamps to 1.
    #[must_use]
    pub fn line_quantity(&self) -> u32 {
        u32::try_from(self.quantity).unwrap_or(1).max(1)
    }

    /// Convert to a cart line without a product snapshot.
    #[must_use]
    pub fn into_item(self) -> CartItem {
        let quantity = self.line_quantity();
        CartItem {
            id: CartItemId::Remote(self.id),
            product_id: self.product_id,
            product: None,
            quantity,
            selected_size: non_empty(self.selected_size),
            selected_color: non_empty(self.selected_color),
            added_at: self.created_at,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Column value for an optional variant selection.
#[must_use]
pub fn variant_column(value: Option<&str>) -> &str {
    value.unwrap_or("")
}

/// Convert a line quantity to the table's integer type.
///
/// # Errors
///
/// Returns `StoreError::Rejected` if the quantity does not fit.
pub fn column_quantity(quantity: u64) -> Result<i32, StoreError> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::Rejected(format!("quantity {quantity} is out of range")))
}

/// Row-level access to signed-in users' carts.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// All lines of a user's cart, oldest first.
    async fn list(&self, user_id: &UserId) -> Result<Vec<CartRow>, StoreError>;

    /// The line matching `key` in a user's cart, if any.
    async fn find(&self, user_id: &UserId, key: &LineKey) -> Result<Option<CartRow>, StoreError>;

    /// Insert a new line.
    async fn insert(
        &self,
        user_id: &UserId,
        request: &AddToCartRequest,
    ) -> Result<CartRow, StoreError>;

    /// Overwrite a line's quantity.
    ///
    /// Returns `false` if the user has no line with this ID.
    async fn set_quantity(
        &self,
        user_id: &UserId,
        id: Uuid,
        quantity: u32,
    ) -> Result<bool, StoreError>;

    /// Overwrite a line's quantity and variant selection.
    ///
    /// A `None` size or color keeps the stored value. If the resulting
    /// selection matches another of the user's lines, that line absorbs the
    /// quantity and this one is deleted. Returns `false` if the user has no
    /// line with this ID.
    async fn update(
        &self,
        user_id: &UserId,
        id: Uuid,
        quantity: u32,
        selected_size: Option<&str>,
        selected_color: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Delete a line. Returns `false` if the user has no line with this ID.
    async fn delete(&self, user_id: &UserId, id: Uuid) -> Result<bool, StoreError>;

    /// Delete every line of a user's cart. Returns the number of rows removed.
    async fn delete_all(&self, user_id: &UserId) -> Result<u64, StoreError>;
}

/// Whole-record access to the anonymous device cart.
#[async_trait]
pub trait LocalCartStore: Send + Sync {
    /// Read the record. `Ok(None)` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the stored record is malformed.
    async fn load(&self) -> Result<Option<LocalCart>, StoreError>;

    /// Replace the record.
    async fn save(&self, cart: &LocalCart) -> Result<(), StoreError>;

    /// Remove the record.
    async fn erase(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(quantity: i32, size: &str, color: &str) -> CartRow {
        let now = Utc::now();
        CartRow {
            id: Uuid::new_v4(),
            user_id: UserId::new("u1"),
            product_id: ProductId::new("p1"),
            quantity,
            selected_size: size.to_owned(),
            selected_color: color.to_owned(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_into_item_maps_empty_variants_to_none() {
        let r = row(2, "", "Mint");
        let id = r.id;
        let item = r.into_item();
        assert_eq!(item.id, CartItemId::Remote(id));
        assert_eq!(item.quantity, 2);
        assert_eq!(item.selected_size, None);
        assert_eq!(item.selected_color.as_deref(), Some("Mint"));
        assert!(item.product.is_none());
    }

    #[test]
    fn test_row_quantity_clamps() {
        assert_eq!(row(0, "", "").line_quantity(), 1);
        assert_eq!(row(-3, "", "").line_quantity(), 1);
        assert_eq!(row(7, "", "").line_quantity(), 7);
    }

    #[test]
    fn test_column_quantity_range() {
        assert_eq!(column_quantity(5).ok(), Some(5));
        assert!(matches!(
            column_quantity(u64::from(u32::MAX)),
            Err(StoreError::Rejected(_))
        ));
    }

    #[test]
    fn test_variant_column() {
        assert_eq!(variant_column(None), "");
        assert_eq!(variant_column(Some("M")), "M");
    }
}
