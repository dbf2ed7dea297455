//! Visitor-scoped key-value storage.
//!
//! Client state that must survive between requests (the cart) is written
//! through the [`KeyValueStore`] trait, so the same logic runs against the
//! shared [`VisitorStore`] in production and an in-memory map in tests.
//!
//! # Change notifications
//!
//! Every committed `set`/`remove` is published on [`StorageEvents`] as a
//! [`StorageChange`]. Subscribers (e.g. the cart event stream of another
//! browser tab) re-read the store when a change for their scope and key
//! arrives.

pub mod events;
pub mod memory;
pub mod visitor;

use std::future::Future;

use thiserror::Error;

pub use events::{StorageChange, StorageEvents, StorageSubscription, SubscriptionClosed};
pub use memory::MemoryStorage;
pub use visitor::{VisitorId, VisitorStorage, VisitorStore};

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A value could not be encoded for storage.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backend is unusable (e.g. a poisoned lock).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A string key-value store owned by a single visitor.
///
/// Implementations publish a [`StorageChange`] after each successful write.
pub trait KeyValueStore: Send + Sync {
    /// Identifier of the namespace this store writes into, if one exists yet.
    ///
    /// Change notifications are matched against this value.
    fn scope(&self) -> Option<String>;

    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}
