//! Persistent cart store.

use milkrun_core::{CartItem, CartKey, ProductId, Quantity, VariationId};
use serde_json::Value;
use tracing::instrument;

use crate::storage::{KeyValueStore, StorageError};

/// Storage key holding the serialized cart.
pub const CART_STORAGE_KEY: &str = "milkrun:cart";

/// Cart persistence with merge-by-key semantics.
///
/// Every mutation is a read-modify-write of the whole list. At most one
/// item exists per [`CartKey`] and every quantity is within `[1, 99]`.
#[derive(Debug, Clone)]
pub struct CartStore<S> {
    storage: S,
}

impl<S: KeyValueStore> CartStore<S> {
    /// Create a cart store over `storage`.
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// The underlying storage.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Items currently persisted, in insertion order.
    ///
    /// Corrupt or foreign data yields an empty cart rather than an error.
    pub async fn get(&self) -> Vec<CartItem> {
        match self.storage.get(CART_STORAGE_KEY).await {
            Ok(Some(raw)) => decode_items(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cart from storage");
                Vec::new()
            }
        }
    }

    /// Add `requested` units of `key`.
    ///
    /// The request is clamped to `[1, 99]`; an existing line grows by that
    /// amount and is capped at 99.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the updated cart cannot be written.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn add(&self, key: &CartKey, requested: i64) -> Result<(), StorageError> {
        let quantity = Quantity::clamped(requested);
        let mut items = self.get().await;

        match items.iter_mut().find(|item| item.matches(key)) {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => items.push(CartItem::new(key.clone(), quantity)),
        }

        self.write(&items).await
    }

    /// Overwrite the quantity of `key`, clamped to `[1, 99]`.
    ///
    /// Does nothing when `key` is not in the cart.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the updated cart cannot be written.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn set_quantity(&self, key: &CartKey, quantity: i64) -> Result<(), StorageError> {
        let mut items = self.get().await;

        let Some(item) = items.iter_mut().find(|item| item.matches(key)) else {
            return Ok(());
        };
        item.quantity = Quantity::clamped(quantity);

        self.write(&items).await
    }

    /// Remove `key` from the cart. Removing a missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the updated cart cannot be written.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn remove(&self, key: &CartKey) -> Result<(), StorageError> {
        let mut items = self.get().await;
        let before = items.len();
        items.retain(|item| !item.matches(key));

        if items.len() == before {
            return Ok(());
        }
        self.write(&items).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the storage cannot be updated.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(CART_STORAGE_KEY).await
    }

    async fn write(&self, items: &[CartItem]) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(items)?;
        self.storage.set(CART_STORAGE_KEY, encoded).await
    }
}

/// Decode a persisted cart, dropping entries that fail validation.
///
/// Duplicate keys in foreign data are folded together with the same
/// saturating rule as [`CartStore::add`].
fn decode_items(raw: &str) -> Vec<CartItem> {
    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            tracing::debug!("Discarding cart data that is not a JSON array");
            return Vec::new();
        }
        Err(e) => {
            tracing::debug!(error = %e, "Discarding unreadable cart data");
            return Vec::new();
        }
    };

    let mut items: Vec<CartItem> = Vec::with_capacity(entries.len());
    for item in entries.iter().filter_map(decode_item) {
        let key = item.key();
        match items.iter_mut().find(|existing| existing.matches(&key)) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
    }
    items
}

fn decode_item(entry: &Value) -> Option<CartItem> {
    let object = entry.as_object()?;

    let product_id = object
        .get("productId")
        .and_then(id_text)
        .filter(|id| !id.trim().is_empty())?;
    let variation_id = object
        .get("variationId")
        .and_then(id_text)
        .map(VariationId::from);

    let quantity = object
        .get("quantity")
        .and_then(Value::as_f64)
        .filter(|q| q.is_finite() && *q > 0.0)?;
    // Float-to-int `as` saturates; the clamp below bounds it anyway.
    #[allow(clippy::cast_possible_truncation)]
    let whole = quantity.trunc() as i64;

    Some(CartItem::new(
        CartKey::new(ProductId::from(product_id), variation_id),
        Quantity::clamped(whole),
    ))
}

/// Identifiers may arrive as strings or bare numbers.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
