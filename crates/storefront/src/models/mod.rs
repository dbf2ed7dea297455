//! Session-stored models.

pub mod session;
