//! Visitor cart.
//!
//! The cart lives entirely in the visitor's storage under
//! [`CART_STORAGE_KEY`] as a JSON array of
//! `{"productId", "variationId"?, "quantity"}` objects.
//!
//! - [`CartStore`] owns the persisted list and its merge/dedup rules.
//! - [`CartContext`] is a read replica of the store, rebuilt after every
//!   mutation and on storage change notifications.

pub mod context;
pub mod store;

pub use context::CartContext;
pub use store::{CART_STORAGE_KEY, CartStore};
