//! In-memory cart stores.
//!
//! Used when no database is configured and throughout the tests. The local
//! store keeps the record as serialized JSON, exactly like the file-backed
//! store, so malformed records behave the same way.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use little_sprout_core::{AddToCartRequest, LineKey, LocalCart, UserId};

use super::{
    CartRow, LocalCartStore, RemoteCartStore, StoreError, column_quantity, variant_column,
};

/// Remote cart table held in memory.
///
/// Rows are kept in insertion order. [`MemoryCartStore::fail_after`] makes
/// the store start rejecting writes, for exercising failure paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStore {
    inner: Arc<RwLock<MemoryTable>>,
}

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<CartRow>,
    writes_left: Option<usize>,
}

impl MemoryTable {
    fn check_write(&mut self) -> Result<(), StoreError> {
        match self.writes_left.as_mut() {
            Some(0) => Err(StoreError::Unavailable("remote store offline".to_owned())),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn row_mut(&mut self, user_id: &UserId, id: Uuid) -> Option<&mut CartRow> {
        self.rows
            .iter_mut()
            .find(|row| row.id == id && &row.user_id == user_id)
    }
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `writes` more successful writes, then fail every write.
    pub async fn fail_after(&self, writes: usize) {
        self.inner.write().await.writes_left = Some(writes);
    }

    /// Snapshot of every row, across all users.
    pub async fn rows(&self) -> Vec<CartRow> {
        self.inner.read().await.rows.clone()
    }
}

#[async_trait]
impl RemoteCartStore for MemoryCartStore {
    async fn list(&self, user_id: &UserId) -> Result<Vec<CartRow>, StoreError> {
        let table = self.inner.read().await;
        Ok(table
            .rows
            .iter()
            .filter(|row| &row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find(&self, user_id: &UserId, key: &LineKey) -> Result<Option<CartRow>, StoreError> {
        let size = variant_column(key.selected_size.as_deref());
        let color = variant_column(key.selected_color.as_deref());
        let table = self.inner.read().await;
        Ok(table
            .rows
            .iter()
            .find(|row| {
                &row.user_id == user_id
                    && row.product_id == key.product_id
                    && row.selected_size == size
                    && row.selected_color == color
            })
            .cloned())
    }

    async fn insert(
        &self,
        user_id: &UserId,
        request: &AddToCartRequest,
    ) -> Result<CartRow, StoreError> {
        let quantity = column_quantity(u64::from(request.quantity))?;
        let mut table = self.inner.write().await;
        table.check_write()?;

        let now = Utc::now();
        let row = CartRow {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            product_id: request.product_id.clone(),
            quantity,
            selected_size: variant_column(request.selected_size.as_deref()).to_owned(),
            selected_color: variant_column(request.selected_color.as_deref()).to_owned(),
            created_at: now,
            updated_at: now,
        };
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn set_quantity(
        &self,
        user_id: &UserId,
        id: Uuid,
        quantity: u32,
    ) -> Result<bool, StoreError> {
        let quantity = column_quantity(u64::from(quantity))?;
        let mut table = self.inner.write().await;
        table.check_write()?;

        let Some(row) = table.row_mut(user_id, id) else {
            return Ok(false);
        };
        row.quantity = quantity;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn update(
        &self,
        user_id: &UserId,
        id: Uuid,
        quantity: u32,
        selected_size: Option<&str>,
        selected_color: Option<&str>,
    ) -> Result<bool, StoreError> {
        let column = column_quantity(u64::from(quantity))?;
        let mut table = self.inner.write().await;
        table.check_write()?;

        let Some(row) = table.row_mut(user_id, id) else {
            return Ok(false);
        };
        let product_id = row.product_id.clone();
        let size = selected_size.map_or_else(|| row.selected_size.clone(), str::to_owned);
        let color = selected_color.map_or_else(|| row.selected_color.clone(), str::to_owned);

        let now = Utc::now();
        let collision = table.rows.iter().position(|other| {
            other.id != id
                && &other.user_id == user_id
                && other.product_id == product_id
                && other.selected_size == size
                && other.selected_color == color
        });

        if let Some(other) = collision.and_then(|pos| table.rows.get_mut(pos)) {
            let merged = u64::from(other.line_quantity()) + u64::from(quantity);
            other.quantity = column_quantity(merged)?;
            other.updated_at = now;
            table.rows.retain(|row| row.id != id);
        } else if let Some(row) = table.row_mut(user_id, id) {
            row.quantity = column;
            row.selected_size = size;
            row.selected_color = color;
            row.updated_at = now;
        }
        Ok(true)
    }

    async fn delete(&self, user_id: &UserId, id: Uuid) -> Result<bool, StoreError> {
        let mut table = self.inner.write().await;
        table.check_write()?;

        let before = table.rows.len();
        table
            .rows
            .retain(|row| !(row.id == id && &row.user_id == user_id));
        Ok(table.rows.len() < before)
    }

    async fn delete_all(&self, user_id: &UserId) -> Result<u64, StoreError> {
        let mut table = self.inner.write().await;
        table.check_write()?;

        let before = table.rows.len();
        table.rows.retain(|row| &row.user_id != user_id);
        Ok((before - table.rows.len()) as u64)
    }
}

/// Device-local cart record held in memory as serialized JSON.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocalStore {
    raw: Arc<RwLock<Option<String>>>,
}

impl MemoryLocalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `raw` as its record.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Arc::new(RwLock::new(Some(raw.into()))),
        }
    }

    /// The stored record, verbatim.
    pub async fn raw(&self) -> Option<String> {
        self.raw.read().await.clone()
    }
}

#[async_trait]
impl LocalCartStore for MemoryLocalStore {
    async fn load(&self) -> Result<Option<LocalCart>, StoreError> {
        let raw = self.raw.read().await;
        raw.as_deref()
            .map(serde_json::from_str::<LocalCart>)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn save(&self, cart: &LocalCart) -> Result<(), StoreError> {
        let json = serde_json::to_string(cart)?;
        *self.raw.write().await = Some(json);
        Ok(())
    }

    async fn erase(&self) -> Result<(), StoreError> {
        *self.raw.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_treats_missing_variant_as_empty() {
        let store = MemoryCartStore::new();
        let user = UserId::new("u1");
        store
            .insert(&user, &AddToCartRequest::new("p1", 1))
            .await
            .unwrap();

        let key = AddToCartRequest::new("p1", 1).key();
        assert!(store.find(&user, &key).await.unwrap().is_some());

        let sized = AddToCartRequest::new("p1", 1).with_size("M").key();
        assert!(store.find(&user, &sized).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_onto_existing_variant_merges() {
        let store = MemoryCartStore::new();
        let user = UserId::new("u1");
        let small = store
            .insert(&user, &AddToCartRequest::new("p1", 1).with_size("0-3M"))
            .await
            .unwrap();
        let large = store
            .insert(&user, &AddToCartRequest::new("p1", 2).with_size("3-6M"))
            .await
            .unwrap();

        assert!(store.update(&user, large.id, 2, Some("0-3M"), None).await.unwrap());

        let rows = store.list(&user).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, small.id);
        assert_eq!(rows[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_update_keeps_unspecified_variant() {
        let store = MemoryCartStore::new();
        let user = UserId::new("u1");
        let row = store
            .insert(&user, &AddToCartRequest::new("p1", 1).with_size("M").with_color("Oat"))
            .await
            .unwrap();

        assert!(store.update(&user, row.id, 4, None, Some("Sage")).await.unwrap());

        let rows = store.list(&user).await.unwrap();
        assert_eq!(rows[0].quantity, 4);
        assert_eq!(rows[0].selected_size, "M");
        assert_eq!(rows[0].selected_color, "Sage");
    }

    #[tokio::test]
    async fn test_rows_are_scoped_to_user() {
        let store = MemoryCartStore::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let row = store
            .insert(&alice, &AddToCartRequest::new("p1", 1))
            .await
            .unwrap();

        assert!(store.list(&bob).await.unwrap().is_empty());
        assert!(!store.delete(&bob, row.id).await.unwrap());
        assert!(!store.set_quantity(&bob, row.id, 4).await.unwrap());
        assert_eq!(store.delete_all(&bob).await.unwrap(), 0);
        assert_eq!(store.list(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_after() {
        let store = MemoryCartStore::new();
        let user = UserId::new("u1");
        store.fail_after(1).await;

        assert!(store.insert(&user, &AddToCartRequest::new("a", 1)).await.is_ok());
        assert!(matches!(
            store.insert(&user, &AddToCartRequest::new("b", 1)).await,
            Err(StoreError::Unavailable(_))
        ));
        // Reads keep working
        assert_eq!(store.list(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_local_store_round_trip() {
        let store = MemoryLocalStore::new();
        assert!(store.load().await.unwrap().is_none());

        let mut cart = LocalCart::new(Utc::now());
        cart.add(&AddToCartRequest::new("p1", 2), Utc::now());
        store.save(&cart).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(cart));

        store.erase().await.unwrap();
        assert!(store.raw().await.is_none());
    }

    #[tokio::test]
    async fn test_local_store_malformed() {
        let store = MemoryLocalStore::with_raw("{not json");
        assert!(matches!(
            store.load().await,
            Err(StoreError::Serialization(_))
        ));
    }
}
