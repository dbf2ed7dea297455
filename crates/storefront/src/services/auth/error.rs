//! Authentication error types.

use thiserror::Error;

use crate::api::ApiError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email or password left blank.
    #[error("email and password are required")]
    MissingCredentials,

    /// Backend call failed for another reason.
    #[error("backend error: {0}")]
    Api(#[from] ApiError),

    /// Session could not be read or written.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}
