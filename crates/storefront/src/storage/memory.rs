//! In-memory storage for tests and single-process tooling.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{KeyValueStore, StorageChange, StorageError, StorageEvents};

/// A [`KeyValueStore`] backed by a shared `HashMap`.
///
/// Clones share the same map, which makes it easy to model two browser tabs
/// writing to one visitor's storage.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    scope: String,
    entries: Arc<RwLock<HashMap<String, String>>>,
    events: Option<StorageEvents>,
}

impl MemoryStorage {
    /// Create an empty store for `scope` that does not publish changes.
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            entries: Arc::default(),
            events: None,
        }
    }

    /// Publish every committed write on `events`.
    #[must_use]
    pub fn with_events(mut self, events: StorageEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Write a raw value without publishing a change.
    ///
    /// Useful for seeding foreign or corrupt data.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the lock is poisoned.
    pub fn seed(&self, key: &str, value: impl Into<String>) -> Result<(), StorageError> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_owned(), value.into());
        Ok(())
    }

    fn notify(&self, key: &str) {
        if let Some(events) = &self.events {
            events.publish(StorageChange::new(self.scope.clone(), key));
        }
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("memory storage lock poisoned".to_string())
}

impl KeyValueStore for MemoryStorage {
    fn scope(&self) -> Option<String> {
        Some(self.scope.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().map_err(|_| poisoned())?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_owned(), value);
        self.notify(key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().map_err(|_| poisoned())?.remove(key);
        self.notify(key);
        Ok(())
    }
}
