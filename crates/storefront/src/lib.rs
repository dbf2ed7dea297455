//! Milkrun Storefront library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused.
//!
//! # Modules
//!
//! - [`cart`] - Persistent cart store and per-visitor cart context
//! - [`storage`] - Visitor-scoped key-value storage with change notifications
//! - [`sanitize`] - Allow-list HTML sanitizer for rich text
//! - [`middleware`] - Coming-soon gate, route guards, sessions, headers
//! - [`api`] - Milkrun backend client

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod sanitize;
pub mod services;
pub mod state;
pub mod storage;
