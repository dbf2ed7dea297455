//! Session keys.
//!
//! Values stored in the visitor's `tower_sessions::Session`.

/// Session keys for authentication data.
pub mod keys {
    /// Last user fetched from the backend, for display only. Guards always
    /// re-fetch the user before deciding.
    pub const CURRENT_USER: &str = "current_user";

    /// Backend bearer token issued at login.
    pub const ACCESS_TOKEN: &str = "access_token";

    /// Set once the admin panel password was confirmed in this session.
    pub const ADMIN_VERIFIED: &str = "admin_panel_verified";
}
