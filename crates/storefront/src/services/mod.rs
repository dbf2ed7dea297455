//! Business logic services for storefront.
//!
//! - `auth` - backend-token sessions, route guard decisions and the admin
//!   panel password

pub mod auth;
