//! Cart session management.
//!
//! [`CartSessionManager`] owns the cart for one device. While anonymous it
//! reads and writes the device-local record; once a user signs in it switches
//! to that user's rows in the remote store, replaying the anonymous lines into
//! them first. Every mutation and identity change ends with a reload from the
//! authoritative store, and the result is published as a [`CartSnapshot`] to
//! all [`CartSubscription`]s.
//!
//! # Reload ordering
//!
//! Each reload takes a ticket from a generation counter before it reads. It
//! publishes only if its ticket is still the newest when it finishes, so a
//! slow reload that started before a newer one is dropped rather than
//! overwriting fresher state.

pub mod hydrate;
pub mod subscription;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use little_sprout_core::{
    AddToCartRequest, Cart, CartItem, CartItemId, CartOwner, CartSnapshot, CartSummary, LocalCart,
    Money, PricingPolicy, UpdateCartItemRequest, UserId,
};

use crate::auth::{AuthEvent, AuthProvider, Identity};
use crate::catalog::{CatalogError, CatalogProvider};
use crate::stores::{CartRow, LocalCartStore, RemoteCartStore, StoreError};

pub use hydrate::MissingProductPolicy;
pub use subscription::CartSubscription;

/// Errors raised while mutating or loading a cart.
///
/// Public operations log these and report `false`.
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The line id does not belong to the active store.
    #[error("cart item {0} does not belong to the active cart")]
    ForeignLine(CartItemId),
}

/// Which store is authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMode {
    Anonymous,
    Authenticated(UserId),
}

impl IdentityMode {
    fn from_identity(identity: Option<&Identity>) -> Self {
        identity.map_or(Self::Anonymous, |identity| {
            Self::Authenticated(identity.user_id.clone())
        })
    }
}

/// Cart pricing and hydration settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartSettings {
    pub pricing: PricingPolicy,
    pub missing_product: MissingProductPolicy,
}

/// Cart session for one device.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartSessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    remote: Arc<dyn RemoteCartStore>,
    local: Arc<dyn LocalCartStore>,
    catalog: Arc<dyn CatalogProvider>,
    settings: CartSettings,
    mode: watch::Sender<IdentityMode>,
    /// Serializes read-modify-write of the local record.
    local_lock: Mutex<()>,
    /// Serializes identity transitions.
    transition_lock: Mutex<()>,
    generation: AtomicU64,
    snapshot: watch::Sender<CartSnapshot>,
}

impl std::fmt::Debug for CartSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSessionManager")
            .field("mode", &*self.inner.mode.borrow())
            .field("settings", &self.inner.settings)
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CartSessionManager {
    /// Create an anonymous manager with an empty snapshot.
    ///
    /// Call [`Self::initialize`] to load the cart for the current identity.
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteCartStore>,
        local: Arc<dyn LocalCartStore>,
        catalog: Arc<dyn CatalogProvider>,
        settings: CartSettings,
    ) -> Self {
        let (mode, _) = watch::channel(IdentityMode::Anonymous);
        let (snapshot, _) = watch::channel(CartSnapshot::empty());

        Self {
            inner: Arc::new(Inner {
                remote,
                local,
                catalog,
                settings,
                mode,
                local_lock: Mutex::new(()),
                transition_lock: Mutex::new(()),
                generation: AtomicU64::new(0),
                snapshot,
            }),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product selection to the cart.
    ///
    /// A line with the same product, size and color has its quantity
    /// increased; otherwise a new line is appended. Returns `false` for a
    /// quantity of zero or if the store write fails.
    #[instrument(skip(self), fields(product_id = %request.product_id, quantity = request.quantity))]
    pub async fn add(&self, request: AddToCartRequest) -> bool {
        if request.quantity == 0 {
            warn!("Refusing to add a cart line with quantity 0");
            return false;
        }

        let result = match self.mode() {
            IdentityMode::Anonymous => self.add_local(&request).await,
            IdentityMode::Authenticated(user_id) => self.add_remote(&user_id, &request).await,
        };
        self.finish_mutation("add to cart", result).await
    }

    /// Change a line's quantity and, optionally, its size and color.
    ///
    /// A quantity of zero removes the line. Returns `false` if the line does
    /// not exist in the active cart or the store write fails.
    #[instrument(skip(self), fields(cart_item_id = %request.cart_item_id, quantity = request.quantity))]
    pub async fn update(&self, request: UpdateCartItemRequest) -> bool {
        if request.quantity == 0 {
            return self.remove(request.cart_item_id).await;
        }

        let result = match (self.mode(), request.cart_item_id) {
            (IdentityMode::Anonymous, CartItemId::Local(line_id)) => {
                self.update_local(line_id, request).await
            }
            (IdentityMode::Authenticated(user_id), CartItemId::Remote(id)) => self
                .inner
                .remote
                .update(
                    &user_id,
                    id,
                    request.quantity,
                    request.selected_size.as_deref(),
                    request.selected_color.as_deref(),
                )
                .await
                .map_err(CartError::from),
            (_, id) => Err(CartError::ForeignLine(id)),
        };
        self.finish_mutation("update cart item", result).await
    }

    /// Remove a line.
    ///
    /// Returns `false` if the line does not exist in the active cart or the
    /// store write fails.
    #[instrument(skip(self))]
    pub async fn remove(&self, cart_item_id: CartItemId) -> bool {
        let result = match (self.mode(), cart_item_id) {
            (IdentityMode::Anonymous, CartItemId::Local(line_id)) => {
                self.remove_local(line_id).await
            }
            (IdentityMode::Authenticated(user_id), CartItemId::Remote(id)) => self
                .inner
                .remote
                .delete(&user_id, id)
                .await
                .map_err(CartError::from),
            (_, id) => Err(CartError::ForeignLine(id)),
        };
        self.finish_mutation("remove cart item", result).await
    }

    /// Remove every line of the active cart.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> bool {
        let result = match self.mode() {
            IdentityMode::Anonymous => {
                let _guard = self.inner.local_lock.lock().await;
                self.inner.local.erase().await.map(|()| true)
            }
            IdentityMode::Authenticated(user_id) => self
                .inner
                .remote
                .delete_all(&user_id)
                .await
                .map(|removed| {
                    debug!(removed, "Cleared remote cart");
                    true
                }),
        };
        self.finish_mutation("clear cart", result.map_err(CartError::from))
            .await
    }

    /// Reload, then report whether the store write applied.
    ///
    /// A failed reload is logged but does not turn a successful write into a
    /// failure.
    async fn finish_mutation(&self, action: &str, result: Result<bool, CartError>) -> bool {
        let applied = match result {
            Ok(true) => true,
            Ok(false) => {
                warn!("Failed to {action}: cart item not found");
                false
            }
            Err(e) => {
                error!(error = %e, "Failed to {action}");
                false
            }
        };
        self.refresh().await;
        applied
    }

    async fn add_local(&self, request: &AddToCartRequest) -> Result<bool, CartError> {
        let _guard = self.inner.local_lock.lock().await;
        let mut record = self.load_local_for_write().await?;
        let line_id = record.add(request, Utc::now());
        self.inner.local.save(&record).await?;
        debug!(line_id, "Saved local cart line");
        Ok(true)
    }

    async fn update_local(
        &self,
        line_id: u64,
        request: UpdateCartItemRequest,
    ) -> Result<bool, CartError> {
        let _guard = self.inner.local_lock.lock().await;
        let mut record = self.load_local_for_write().await?;
        if !record.update(
            line_id,
            request.quantity,
            request.selected_size,
            request.selected_color,
            Utc::now(),
        ) {
            return Ok(false);
        }
        self.inner.local.save(&record).await?;
        Ok(true)
    }

    async fn remove_local(&self, line_id: u64) -> Result<bool, CartError> {
        let _guard = self.inner.local_lock.lock().await;
        let mut record = self.load_local_for_write().await?;
        if !record.remove(line_id, Utc::now()) {
            return Ok(false);
        }
        self.inner.local.save(&record).await?;
        Ok(true)
    }

    /// Load the local record for modification. Caller holds `local_lock`.
    ///
    /// A malformed record is replaced by an empty one.
    async fn load_local_for_write(&self) -> Result<LocalCart, CartError> {
        match self.inner.local.load().await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Ok(LocalCart::new(Utc::now())),
            Err(StoreError::Serialization(e)) => {
                warn!(error = %e, "Discarding malformed local cart record");
                Ok(LocalCart::new(Utc::now()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Merge a request into a user's remote cart.
    async fn add_remote(
        &self,
        user_id: &UserId,
        request: &AddToCartRequest,
    ) -> Result<bool, CartError> {
        let remote = &self.inner.remote;
        if let Some(row) = remote.find(user_id, &request.key()).await? {
            let quantity = row.line_quantity().saturating_add(request.quantity);
            return Ok(remote.set_quantity(user_id, row.id, quantity).await?);
        }
        remote.insert(user_id, request).await?;
        Ok(true)
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Load the cart for the provider's current identity.
    ///
    /// Any anonymous lines are left where they are; they are merged on the
    /// next sign-in transition.
    #[instrument(skip_all)]
    pub async fn initialize(&self, auth: &dyn AuthProvider) -> bool {
        let _guard = self.inner.transition_lock.lock().await;
        let mode = IdentityMode::from_identity(auth.current().as_ref());
        info!(?mode, "Initializing cart session");
        self.set_mode(mode);
        self.refresh().await
    }

    /// React to a sign-in or sign-out.
    ///
    /// Signing in from anonymous replays every local line into the user's
    /// remote cart, one at a time, stopping at the first failure. The local
    /// record is erased only if every line made it; otherwise the lines not
    /// yet replayed stay local and this returns `false`. Signing out leaves
    /// the remote cart untouched.
    #[instrument(skip(self))]
    pub async fn on_auth_transition(&self, event: AuthEvent) -> bool {
        let _guard = self.inner.transition_lock.lock().await;
        let previous = self.mode();

        let merged = match (&previous, &event) {
            (IdentityMode::Anonymous, AuthEvent::SignedIn(identity)) => {
                info!(user_id = %identity.user_id, "Switching to remote cart");
                self.set_mode(IdentityMode::Authenticated(identity.user_id.clone()));
                self.merge_local_into(&identity.user_id).await
            }
            (IdentityMode::Authenticated(current), AuthEvent::SignedIn(identity))
                if current == &identity.user_id =>
            {
                true
            }
            (IdentityMode::Authenticated(current), AuthEvent::SignedIn(identity)) => {
                info!(from = %current, to = %identity.user_id, "Switching remote cart owner");
                self.set_mode(IdentityMode::Authenticated(identity.user_id.clone()));
                true
            }
            (IdentityMode::Authenticated(current), AuthEvent::SignedOut) => {
                info!(user_id = %current, "Switching to local cart");
                self.set_mode(IdentityMode::Anonymous);
                true
            }
            (IdentityMode::Anonymous, AuthEvent::SignedOut) => true,
        };

        let reloaded = self.refresh().await;
        merged && reloaded
    }

    /// Replay the local lines into `user_id`'s remote cart.
    async fn merge_local_into(&self, user_id: &UserId) -> bool {
        let _guard = self.inner.local_lock.lock().await;
        let mut record = match self.inner.local.load().await {
            Ok(Some(record)) if !record.is_empty() => record,
            Ok(Some(_)) => return self.erase_local("empty local cart").await,
            Ok(None) => return true,
            Err(StoreError::Serialization(e)) => {
                warn!(error = %e, "Discarding malformed local cart instead of merging it");
                return self.erase_local("malformed local cart").await;
            }
            Err(e) => {
                error!(error = %e, "Failed to read local cart for merge");
                return false;
            }
        };

        let total = record.items.len();
        let mut replayed = 0;
        let mut failure = None;
        for item in &record.items {
            match self.add_remote(user_id, &item.to_add_request()).await {
                Ok(true) => replayed += 1,
                Ok(false) => {
                    failure = Some(CartError::Store(StoreError::Rejected(format!(
                        "line local_{} vanished during merge",
                        item.line_id
                    ))));
                    break;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let Some(e) = failure else {
            if let Err(e) = self.inner.local.erase().await {
                error!(error = %e, "Merged local cart but failed to erase it");
                return false;
            }
            info!(lines = total, "Merged local cart into remote cart");
            return true;
        };

        error!(error = %e, replayed, total, "Failed to merge local cart");
        record.items = record.items.split_off(replayed);
        record.updated_at = Utc::now();
        if let Err(e) = self.inner.local.save(&record).await {
            error!(error = %e, "Failed to save unmerged local cart lines");
        }
        false
    }

    async fn erase_local(&self, what: &str) -> bool {
        match self.inner.local.erase().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to erase {what}");
                false
            }
        }
    }

    fn set_mode(&self, mode: IdentityMode) {
        self.inner.mode.send_replace(mode);
        // Invalidate reloads that read under the previous identity.
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Drive [`Self::on_auth_transition`] from an identity signal.
    ///
    /// Covers identity changes nobody else reported. A caller that needs the
    /// transition's result runs it before publishing the identity; the
    /// listener then sees the mode already applied and has nothing to do.
    /// Stops when `shutdown` resolves or the signal's sender is dropped.
    pub fn spawn_auth_listener<F>(
        &self,
        mut identity: watch::Receiver<Option<Identity>>,
        shutdown: F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    () = &mut shutdown => {
                        debug!("Auth listener shutting down");
                        break;
                    }
                    changed = identity.changed() => {
                        if changed.is_err() {
                            debug!("Identity signal closed");
                            break;
                        }
                        let current = identity.borrow_and_update().clone();
                        if !manager
                            .on_auth_transition(AuthEvent::from_identity(current))
                            .await
                        {
                            warn!("Cart transition after identity change did not fully apply");
                        }
                    }
                }
            }
        })
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Reload from the authoritative store and publish.
    ///
    /// Returns `false` if loading failed. A reload superseded by a newer one
    /// succeeds without publishing.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> bool {
        let ticket = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mode = self.mode();

        let snapshot = match self.load(&mode).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, ?mode, "Failed to load cart");
                return false;
            }
        };

        let generation = &self.inner.generation;
        let published = self.inner.snapshot.send_if_modified(|current| {
            if generation.load(Ordering::SeqCst) != ticket {
                return false;
            }
            *current = snapshot;
            true
        });
        if !published {
            debug!(ticket, "Dropping superseded cart reload");
        }
        true
    }

    async fn load(&self, mode: &IdentityMode) -> Result<CartSnapshot, CartError> {
        let cart = match mode {
            IdentityMode::Anonymous => self.load_local().await?,
            IdentityMode::Authenticated(user_id) => Some(self.load_remote(user_id).await?),
        };
        let summary = self.inner.settings.pricing.summarize(cart.as_ref());
        Ok(CartSnapshot { cart, summary })
    }

    async fn load_local(&self) -> Result<Option<Cart>, CartError> {
        let record = match self.inner.local.load().await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(StoreError::Serialization(e)) => {
                warn!(error = %e, "Local cart record is malformed, showing an empty cart");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let items = record
            .items
            .into_iter()
            .map(|item| CartItem {
                id: CartItemId::Local(item.line_id),
                product_id: item.product_id,
                product: None,
                quantity: item.quantity,
                selected_size: item.selected_size,
                selected_color: item.selected_color,
                added_at: item.added_at,
            })
            .collect();
        let items = self.hydrate(items).await?;

        let mut cart = Cart::build(CartOwner::Session, items, Utc::now());
        cart.updated_at = record.updated_at;
        Ok(Some(cart))
    }

    async fn load_remote(&self, user_id: &UserId) -> Result<Cart, CartError> {
        let rows = self.inner.remote.list(user_id).await?;
        let created_at = rows.iter().map(|row| row.created_at).min();
        let updated_at = rows.iter().map(|row| row.updated_at).max();

        let items = rows.into_iter().map(CartRow::into_item).collect();
        let items = self.hydrate(items).await?;

        let now = Utc::now();
        let mut cart = Cart::build(CartOwner::User(user_id.clone()), items, now);
        cart.created_at = created_at.unwrap_or(now);
        cart.updated_at = updated_at.unwrap_or(now);
        Ok(cart)
    }

    async fn hydrate(&self, items: Vec<CartItem>) -> Result<Vec<CartItem>, CartError> {
        Ok(hydrate::hydrate(
            self.inner.catalog.as_ref(),
            items,
            self.inner.settings.missing_product,
        )
        .await?)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Subscribe to published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> CartSubscription {
        CartSubscription::new(self.inner.snapshot.subscribe())
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.snapshot.receiver_count()
    }

    /// The authoritative store right now.
    #[must_use]
    pub fn mode(&self) -> IdentityMode {
        self.inner.mode.borrow().clone()
    }

    #[must_use]
    pub fn current_snapshot(&self) -> CartSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn current_cart(&self) -> Option<Cart> {
        self.inner.snapshot.borrow().cart.clone()
    }

    #[must_use]
    pub fn current_summary(&self) -> CartSummary {
        self.inner.snapshot.borrow().summary.clone()
    }

    /// Total quantity across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.inner.snapshot.borrow().item_count()
    }

    #[must_use]
    pub fn policy(&self) -> &PricingPolicy {
        &self.inner.settings.pricing
    }

    /// Unit price times quantity for one line.
    #[must_use]
    pub fn line_total(&self, item: &CartItem) -> Money {
        item.line_total()
    }

    /// How much more the current cart needs for free shipping.
    #[must_use]
    pub fn free_shipping_remaining(&self) -> Option<Money> {
        let subtotal = self.inner.snapshot.borrow().summary.subtotal;
        self.policy().free_shipping_remaining(subtotal)
    }

    /// Shipping hint for the current cart.
    #[must_use]
    pub fn shipping_message(&self) -> String {
        let subtotal = self.inner.snapshot.borrow().summary.subtotal;
        self.policy().shipping_message(subtotal)
    }
}
