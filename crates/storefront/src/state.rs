//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::SessionAuth;
use crate::cart::CartSessionManager;
use crate::catalog::{CachedCatalog, CatalogProvider};
use crate::config::StorefrontConfig;
use crate::stores::{LocalCartStore, RemoteCartStore};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the cart session, catalog, identity signal and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    cart: CartSessionManager,
    catalog: Arc<dyn CatalogProvider>,
    auth: SessionAuth,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `cart` - Cart session for this device
    /// * `catalog` - Catalog used for product routes
    /// * `auth` - Identity signal the cart session follows
    /// * `pool` - `PostgreSQL` pool, if a database is configured
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        cart: CartSessionManager,
        catalog: Arc<dyn CatalogProvider>,
        auth: SessionAuth,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                cart,
                catalog,
                auth,
                pool,
            }),
        }
    }

    /// Build the cart session and state over one catalog source.
    ///
    /// Product routes read through a [`CachedCatalog`]. The cart hydrates
    /// from `catalog` directly, so price edits and removed products show on
    /// its next reload instead of after the cache TTL.
    #[must_use]
    pub fn assemble(
        config: StorefrontConfig,
        remote: Arc<dyn RemoteCartStore>,
        local: Arc<dyn LocalCartStore>,
        catalog: Arc<dyn CatalogProvider>,
        auth: SessionAuth,
        pool: Option<PgPool>,
    ) -> Self {
        let cart = CartSessionManager::new(remote, local, catalog.clone(), config.cart);
        let listings: Arc<dyn CatalogProvider> =
            Arc::new(CachedCatalog::new(catalog, config.catalog_cache_ttl));
        Self::new(config, cart, listings, auth, pool)
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cart session.
    #[must_use]
    pub fn cart(&self) -> &CartSessionManager {
        &self.inner.cart
    }

    /// Get a reference to the catalog.
    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogProvider {
        self.inner.catalog.as_ref()
    }

    /// Get a reference to the identity signal.
    #[must_use]
    pub fn auth(&self) -> &SessionAuth {
        &self.inner.auth
    }

    /// Get a reference to the database connection pool, if any.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
