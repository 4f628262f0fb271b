//! Identity signal from the auth provider.
//!
//! Credentials are checked by the managed backend. This crate only consumes
//! the outcome: a continuously observable "who is signed in" value, with
//! `None` meaning anonymous. [`SessionAuth`] is the in-process holder of that
//! value, fed by the sign-in/sign-out routes.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use little_sprout_core::UserId;

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    /// Identity with only a user ID.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }
}

/// A discrete auth notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
}

impl AuthEvent {
    /// The event that moves an observer to `identity`.
    #[must_use]
    pub fn from_identity(identity: Option<Identity>) -> Self {
        identity.map_or(Self::SignedOut, Self::SignedIn)
    }
}

/// Source of the current identity.
pub trait AuthProvider: Send + Sync {
    /// The identity right now. `None` when anonymous.
    fn current(&self) -> Option<Identity>;

    /// Receiver that observes every identity change.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

/// In-process identity holder.
///
/// Cheap to clone; all clones share the same signal.
#[derive(Debug, Clone)]
pub struct SessionAuth {
    tx: watch::Sender<Option<Identity>>,
}

impl Default for SessionAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAuth {
    /// Start anonymous.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Record a sign-in. Observers are only notified if the identity changed.
    pub fn sign_in(&self, identity: Identity) {
        self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&identity) {
                return false;
            }
            tracing::info!(user_id = %identity.user_id, "User signed in");
            *current = Some(identity);
            true
        });
    }

    /// Record a sign-out. No-op if already anonymous.
    pub fn sign_out(&self) {
        self.tx.send_if_modified(|current| {
            let Some(previous) = current.take() else {
                return false;
            };
            tracing::info!(user_id = %previous.user_id, "User signed out");
            true
        });
    }
}

impl AuthProvider for SessionAuth {
    fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let auth = SessionAuth::new();
        assert_eq!(auth.current(), None);

        auth.sign_in(Identity::new("u1"));
        assert_eq!(auth.current(), Some(Identity::new("u1")));

        auth.sign_out();
        assert_eq!(auth.current(), None);
    }

    #[tokio::test]
    async fn test_repeat_sign_in_does_not_notify() {
        let auth = SessionAuth::new();
        let mut rx = auth.subscribe();

        auth.sign_in(Identity::new("u1"));
        assert!(rx.has_changed().unwrap_or(false));
        rx.borrow_and_update();

        auth.sign_in(Identity::new("u1"));
        assert!(!rx.has_changed().unwrap_or(true));

        auth.sign_out();
        auth.sign_out();
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(*rx.borrow_and_update(), None);
    }

    #[test]
    fn test_event_from_identity() {
        assert_eq!(AuthEvent::from_identity(None), AuthEvent::SignedOut);
        assert_eq!(
            AuthEvent::from_identity(Some(Identity::new("u1"))),
            AuthEvent::SignedIn(Identity::new("u1"))
        );
    }
}
