//! Storage change notifications.
//!
//! A process-wide broadcast channel. Writers publish after committing;
//! subscribers filter by scope and key.

use tokio::sync::broadcast::{self, error::RecvError};

/// Default number of buffered notifications before slow receivers lag.
const DEFAULT_CAPACITY: usize = 256;

/// A committed write to a storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// Namespace that was written (a session id, or a fixed name in tests).
    pub scope: String,
    /// Key that changed.
    pub key: String,
}

impl StorageChange {
    /// Create a change notification.
    #[must_use]
    pub fn new(scope: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
        }
    }

    /// Whether this change concerns `key` in `scope`.
    #[must_use]
    pub fn concerns(&self, scope: &str, key: &str) -> bool {
        self.scope == scope && self.key == key
    }
}

/// Fan-out channel for [`StorageChange`] notifications.
///
/// Cheap to clone; all clones share the same channel.
#[derive(Debug, Clone)]
pub struct StorageEvents {
    sender: broadcast::Sender<StorageChange>,
}

impl StorageEvents {
    /// Create a channel buffering up to `capacity` notifications per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, change: StorageChange) {
        let receivers = self.sender.send(change).unwrap_or(0);
        tracing::trace!(receivers, "Published storage change");
    }

    /// Subscribe to changes of `key` within `scope`.
    #[must_use]
    pub fn subscribe(&self, scope: impl Into<String>, key: impl Into<String>) -> StorageSubscription {
        StorageSubscription {
            receiver: self.sender.subscribe(),
            scope: scope.into(),
            key: key.into(),
        }
    }
}

impl Default for StorageEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// The notification channel was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("storage event channel closed")]
pub struct SubscriptionClosed;

/// A filtered view of [`StorageEvents`] for one scope and key.
#[derive(Debug)]
pub struct StorageSubscription {
    receiver: broadcast::Receiver<StorageChange>,
    scope: String,
    key: String,
}

impl StorageSubscription {
    /// Scope this subscription listens to.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Wait for the next change to the watched key.
    ///
    /// A lagged receiver may have missed the change it cares about, so lag
    /// is reported as a change and the caller re-reads.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionClosed`] once every sender is gone.
    pub async fn changed(&mut self) -> Result<StorageChange, SubscriptionClosed> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.concerns(&self.scope, &self.key) => return Ok(change),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, scope = %self.scope, "Storage subscriber lagged");
                    return Ok(StorageChange::new(self.scope.clone(), self.key.clone()));
                }
                Err(RecvError::Closed) => return Err(SubscriptionClosed),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_sees_matching_change() {
        let events = StorageEvents::default();
        let mut sub = events.subscribe("tab-a", "cart");

        events.publish(StorageChange::new("tab-b", "cart"));
        events.publish(StorageChange::new("tab-a", "other"));
        events.publish(StorageChange::new("tab-a", "cart"));

        let change = sub.changed().await.unwrap();
        assert_eq!(change, StorageChange::new("tab-a", "cart"));
    }

    #[tokio::test]
    async fn test_lag_is_reported_as_change() {
        let events = StorageEvents::new(1);
        let mut sub = events.subscribe("s", "cart");

        events.publish(StorageChange::new("x", "y"));
        events.publish(StorageChange::new("x", "z"));

        let change = sub.changed().await.unwrap();
        assert!(change.concerns("s", "cart"));
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let events = StorageEvents::default();
        let mut sub = events.subscribe("s", "cart");
        drop(events);

        assert_eq!(sub.changed().await, Err(SubscriptionClosed));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let events = StorageEvents::default();
        events.publish(StorageChange::new("s", "cart"));
    }
}
