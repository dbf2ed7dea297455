//! Milkrun Core - Shared types library.
//!
//! This crate provides common types used across the Milkrun components:
//! - `storefront` - Customer-facing shop, cart and admin area
//! - `integration-tests` - In-process HTTP tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no session access. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, cart line items, quantities, roles and prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
