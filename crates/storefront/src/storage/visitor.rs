//! Storage shared by every request and tab of one browser.
//!
//! Each browser is identified by a [`VisitorId`] carried in its own cookie.
//! Values are held per visitor in a `moka` cache, apart from the session
//! record: a request that saves its session never writes a visitor value.
//! Every `get` reads the live entry and every `set`/`remove` touches a single
//! key. Visitors left untouched for the idle period are evicted.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use super::{KeyValueStore, StorageChange, StorageError, StorageEvents};

type Entries = Arc<RwLock<HashMap<String, String>>>;

/// Identifier of one browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisitorId(Uuid);

impl VisitorId {
    /// A fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id previously issued by [`VisitorId::generate`].
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Values of every visitor, with idle eviction.
#[derive(Clone)]
pub struct VisitorStore {
    visitors: Cache<VisitorId, Entries>,
    events: StorageEvents,
}

impl VisitorStore {
    /// Keep at most `max_visitors`, each for `idle` after its last access.
    #[must_use]
    pub fn new(idle: Duration, max_visitors: u64, events: StorageEvents) -> Self {
        let visitors = Cache::builder()
            .max_capacity(max_visitors)
            .time_to_idle(idle)
            .build();
        Self { visitors, events }
    }

    /// Storage of one visitor.
    #[must_use]
    pub fn open(&self, visitor: VisitorId) -> VisitorStorage {
        VisitorStorage {
            visitor,
            store: self.clone(),
        }
    }

    /// Channel on which committed writes are published.
    #[must_use]
    pub const fn events(&self) -> &StorageEvents {
        &self.events
    }
}

impl fmt::Debug for VisitorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitorStore")
            .field("visitors", &self.visitors.entry_count())
            .finish_non_exhaustive()
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("visitor storage lock poisoned".to_string())
}

/// A [`KeyValueStore`] scoped to one visitor of a [`VisitorStore`].
///
/// Holds no values itself; each access goes back to the shared store.
#[derive(Debug, Clone)]
pub struct VisitorStorage {
    visitor: VisitorId,
    store: VisitorStore,
}

impl VisitorStorage {
    fn publish(&self, key: &str) {
        self.store
            .events
            .publish(StorageChange::new(self.visitor.to_string(), key));
    }
}

impl KeyValueStore for VisitorStorage {
    fn scope(&self) -> Option<String> {
        Some(self.visitor.to_string())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let Some(entries) = self.store.visitors.get(&self.visitor).await else {
            return Ok(None);
        };
        let value = entries.read().map_err(|_| poisoned())?.get(key).cloned();
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let entries = self
            .store
            .visitors
            .get_with(self.visitor, async { Entries::default() })
            .await;
        entries
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_owned(), value);
        self.publish(key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        if let Some(entries) = self.store.visitors.get(&self.visitor).await {
            entries.write().map_err(|_| poisoned())?.remove(key);
        }
        self.publish(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use milkrun_core::{CartKey, ProductId};
    use tower_sessions::{Session, SessionStore};
    use tower_sessions_moka_store::MokaStore;

    use super::*;
    use crate::cart::{CART_STORAGE_KEY, CartStore};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn store() -> VisitorStore {
        VisitorStore::new(DAY, 1_000, StorageEvents::default())
    }

    fn key(product: &str) -> CartKey {
        CartKey::new(ProductId::new(product), None)
    }

    #[test]
    fn test_visitor_id_parse() {
        let id = VisitorId::generate();
        assert_eq!(VisitorId::parse(&id.to_string()), Some(id));
        assert_eq!(VisitorId::parse(""), None);
        assert_eq!(VisitorId::parse("not-a-visitor"), None);
    }

    #[tokio::test]
    async fn test_visitors_are_isolated() {
        let store = store();
        let alice = store.open(VisitorId::generate());
        let bob = store.open(VisitorId::generate());

        alice.set("k", "a".to_string()).await.unwrap();
        assert_eq!(alice.get("k").await.unwrap().as_deref(), Some("a"));
        assert_eq!(bob.get("k").await.unwrap(), None);

        alice.remove("k").await.unwrap();
        assert_eq!(alice.get("k").await.unwrap(), None);
        // Removing for a visitor with no entries is fine
        bob.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_writes_publish_on_visitor_scope() {
        let store = store();
        let visitor = VisitorId::generate();
        let storage = store.open(visitor);
        let mut sub = store.events().subscribe(visitor.to_string(), "k");

        storage.set("k", "v".to_string()).await.unwrap();
        let change = sub.changed().await.unwrap();
        assert!(change.concerns(&visitor.to_string(), "k"));
    }

    #[tokio::test]
    async fn test_keys_are_written_independently() {
        let store = store();
        let visitor = VisitorId::generate();
        let tab_a = store.open(visitor);
        let tab_b = store.open(visitor);

        tab_a.set("milkrun:cart", "[]".to_string()).await.unwrap();
        tab_b.set("other", "x".to_string()).await.unwrap();
        tab_a.remove("other").await.unwrap();

        assert_eq!(tab_b.get("milkrun:cart").await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_session_save_does_not_revert_cart() {
        let sessions = Arc::new(MokaStore::new(None));
        let seed = Session::new(None, sessions.clone(), None);
        seed.insert("current_user", "casey").await.unwrap();
        seed.save().await.unwrap();
        let session_id = seed.id().unwrap();

        let store = store();
        let visitor = VisitorId::generate();
        let cart = CartStore::new(store.open(visitor));
        cart.add(&key("milk"), 1).await.unwrap();

        // A page request in one tab loads its session record...
        let page = Session::new(Some(session_id), sessions.clone(), None);
        assert!(page.get::<String>("current_user").await.unwrap().is_some());

        // ...another tab adds to the cart while it runs...
        let mut changes = store.events().subscribe(visitor.to_string(), CART_STORAGE_KEY);
        CartStore::new(store.open(visitor))
            .add(&key("eggs"), 2)
            .await
            .unwrap();
        assert!(changes.changed().await.is_ok());

        // ...and the page request then saves its whole session record.
        page.insert("current_user", "casey again").await.unwrap();
        page.save().await.unwrap();

        let products: Vec<String> = cart
            .get()
            .await
            .iter()
            .map(|item| item.product_id.to_string())
            .collect();
        assert_eq!(products, ["milk", "eggs"]);
        assert!(sessions.load(&session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_idle_visitors_are_evicted() {
        let store = VisitorStore::new(Duration::from_millis(50), 1_000, StorageEvents::default());
        for _ in 0..50 {
            let cart = CartStore::new(store.open(VisitorId::generate()));
            cart.add(&key("milk"), 1).await.unwrap();
        }
        store.visitors.run_pending_tasks().await;
        assert_eq!(store.visitors.entry_count(), 50);

        tokio::time::sleep(Duration::from_millis(150)).await;
        store.visitors.run_pending_tasks().await;
        assert_eq!(store.visitors.entry_count(), 0);
    }
}
