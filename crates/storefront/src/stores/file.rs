//! File-backed device-local cart store.
//!
//! The record lives in `<dir>/baby_shop_cart.json`. Writes go to a sibling
//! temporary file that is renamed over the record, so a crash mid-write
//! leaves the previous record intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::instrument;

use little_sprout_core::LocalCart;

use super::{LOCAL_CART_KEY, LocalCartStore, StoreError};

/// Local cart record stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileLocalStore {
    path: PathBuf,
}

impl FileLocalStore {
    /// Store the record under `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{LOCAL_CART_KEY}.json")),
        }
    }

    /// Path of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl LocalCartStore for FileLocalStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<LocalCart>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    #[instrument(skip(self, cart), fields(path = %self.path.display(), lines = cart.items.len()))]
    async fn save(&self, cart: &LocalCart) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_vec_pretty(cart)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn erase(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use little_sprout_core::AddToCartRequest;

    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLocalStore::new(dir.path());
        assert!(store.load().await.unwrap().is_none());
        // Erasing a missing record is fine
        store.erase().await.unwrap();
    }

    #[tokio::test]
    async fn test_save_load_erase() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLocalStore::new(dir.path().join("nested"));

        let mut cart = LocalCart::new(Utc::now());
        cart.add(&AddToCartRequest::new("p1", 2).with_size("M"), Utc::now());
        store.save(&cart).await.unwrap();

        assert!(store.path().ends_with("baby_shop_cart.json"));
        assert_eq!(store.load().await.unwrap(), Some(cart));

        store.erase().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLocalStore::new(dir.path());
        tokio::fs::write(store.path(), b"[1, 2").await.unwrap();
        assert!(matches!(
            store.load().await,
            Err(StoreError::Serialization(_))
        ));
    }
}
