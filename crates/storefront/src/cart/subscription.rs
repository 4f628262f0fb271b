//! Subscription handles for the published cart snapshot.

use tokio::sync::watch;

use little_sprout_core::CartSnapshot;

/// A consumer's view of the cart.
///
/// Holds a receiver on the manager's snapshot channel. Dropping the handle
/// releases the subscription.
#[derive(Debug)]
pub struct CartSubscription {
    rx: watch::Receiver<CartSnapshot>,
}

impl CartSubscription {
    pub(crate) const fn new(rx: watch::Receiver<CartSnapshot>) -> Self {
        Self { rx }
    }

    /// The latest published snapshot, marking it as seen.
    pub fn current(&mut self) -> CartSnapshot {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the manager is gone.
    pub async fn changed(&mut self) -> Option<CartSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Returns `true` if a snapshot was published since the last read.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}
