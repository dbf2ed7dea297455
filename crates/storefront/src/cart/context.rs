//! In-memory cart snapshot kept consistent with the store.

use milkrun_core::{CartItem, CartKey};

use super::store::{CART_STORAGE_KEY, CartStore};
use crate::storage::{KeyValueStore, StorageChange, StorageError, StorageEvents, StorageSubscription};

/// Cached view of a visitor's cart.
///
/// Every mutation goes to the store first and then re-reads the whole list,
/// so the snapshot is always what the store holds after the write. Writes
/// made elsewhere (another tab, another request) are picked up through
/// [`CartContext::sync`].
#[derive(Debug)]
pub struct CartContext<S> {
    store: CartStore<S>,
    items: Vec<CartItem>,
}

impl<S: KeyValueStore> CartContext<S> {
    /// Load the current cart from `store`.
    pub async fn load(store: CartStore<S>) -> Self {
        let items = store.get().await;
        Self { store, items }
    }

    /// Items in the last snapshot.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity.get()).sum()
    }

    /// Whether the snapshot holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The backing store.
    pub const fn store(&self) -> &CartStore<S> {
        &self.store
    }

    /// Add `quantity` units of `key`, then refresh.
    ///
    /// # Errors
    ///
    /// Returns the store's write error; the snapshot is refreshed regardless.
    pub async fn add_item(&mut self, key: &CartKey, quantity: i64) -> Result<(), StorageError> {
        let result = self.store.add(key, quantity).await;
        self.refresh().await;
        result
    }

    /// Remove `key`, then refresh.
    ///
    /// # Errors
    ///
    /// Returns the store's write error; the snapshot is refreshed regardless.
    pub async fn remove_item(&mut self, key: &CartKey) -> Result<(), StorageError> {
        let result = self.store.remove(key).await;
        self.refresh().await;
        result
    }

    /// Overwrite the quantity of `key`, then refresh.
    ///
    /// # Errors
    ///
    /// Returns the store's write error; the snapshot is refreshed regardless.
    pub async fn set_item_quantity(
        &mut self,
        key: &CartKey,
        quantity: i64,
    ) -> Result<(), StorageError> {
        let result = self.store.set_quantity(key, quantity).await;
        self.refresh().await;
        result
    }

    /// Empty the cart, then refresh.
    ///
    /// # Errors
    ///
    /// Returns the store's write error; the snapshot is refreshed regardless.
    pub async fn clear_cart(&mut self) -> Result<(), StorageError> {
        let result = self.store.clear().await;
        self.refresh().await;
        result
    }

    /// Replace the snapshot with the store's current contents.
    pub async fn refresh(&mut self) {
        self.items = self.store.get().await;
    }

    /// Refresh if `change` is a write to this cart. Returns whether it was.
    pub async fn sync(&mut self, change: &StorageChange) -> bool {
        let Some(scope) = self.store.storage().scope() else {
            return false;
        };
        if !change.concerns(&scope, CART_STORAGE_KEY) {
            return false;
        }
        self.refresh().await;
        true
    }

    /// Subscribe to writes to this cart, once the storage has a scope.
    #[must_use]
    pub fn subscribe(&self, events: &StorageEvents) -> Option<StorageSubscription> {
        self.store
            .storage()
            .scope()
            .map(|scope| events.subscribe(scope, CART_STORAGE_KEY))
    }
}
