//! Authentication service.
//!
//! The backend owns accounts. The storefront keeps the bearer token it was
//! issued in the visitor's session and re-validates it against the backend on
//! every guarded request, so role changes and revocations apply immediately.

mod error;
pub mod guard;

pub use error::AuthError;
pub use guard::{AuthState, GuardContext, GuardDecision, GuardPolicy, Navigation};

use secrecy::{ExposeSecret, SecretString};
use tower_sessions::Session;
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, BackendClient, User};
use crate::models::session::keys;

/// Authentication service bound to one visitor session.
pub struct AuthService<'a> {
    api: &'a BackendClient,
    session: &'a Session,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(api: &'a BackendClient, session: &'a Session) -> Self {
        Self { api, session }
    }

    /// Log in with email and password.
    ///
    /// On success the session id is rotated and any earlier admin
    /// verification is discarded.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` for blank input and
    /// `AuthError::InvalidCredentials` if the backend rejects them.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<User, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.expose_secret().is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let response = self.api.login(email, password).await.map_err(|e| match e {
            ApiError::Unauthorized | ApiError::NotFound => AuthError::InvalidCredentials,
            other => AuthError::Api(other),
        })?;

        self.session.cycle_id().await?;
        self.session.remove_value(keys::ADMIN_VERIFIED).await?;
        self.session
            .insert(keys::ACCESS_TOKEN, &response.token)
            .await?;
        self.session
            .insert(keys::CURRENT_USER, &response.user)
            .await?;

        Ok(response.user)
    }

    /// Run the session check.
    ///
    /// Fetches the user for the stored token. Any failure clears the stored
    /// credentials and reports the visitor as anonymous.
    #[instrument(skip(self))]
    pub async fn resolve(&self) -> AuthState {
        let token = match self.session.get::<String>(keys::ACCESS_TOKEN).await {
            Ok(Some(token)) if !token.is_empty() => SecretString::from(token),
            Ok(_) => return AuthState::Anonymous,
            Err(e) => {
                warn!(error = %e, "Failed to read access token from session");
                return AuthState::Anonymous;
            }
        };

        match self.api.current_user(&token).await {
            Ok(user) => {
                if let Err(e) = self.session.insert(keys::CURRENT_USER, &user).await {
                    debug!(error = %e, "Failed to cache current user");
                }
                AuthState::Authenticated(user)
            }
            Err(e) => {
                if matches!(e, ApiError::Unauthorized) {
                    debug!("Stored token rejected, signing out");
                } else {
                    warn!(error = %e, "Session check failed, signing out");
                }
                if let Err(e) = self.clear_credentials().await {
                    warn!(error = %e, "Failed to clear session credentials");
                }
                AuthState::Anonymous
            }
        }
    }

    /// Log out: drop the token, cached user and admin verification.
    ///
    /// The cart is stored per visitor, not in the session, and survives.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the session cannot be modified.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.clear_credentials().await?;
        self.session.cycle_id().await?;
        Ok(())
    }

    async fn clear_credentials(&self) -> Result<(), tower_sessions::session::Error> {
        self.session.remove_value(keys::ACCESS_TOKEN).await?;
        self.session.remove_value(keys::CURRENT_USER).await?;
        self.session.remove_value(keys::ADMIN_VERIFIED).await?;
        Ok(())
    }

    /// Whether the admin panel password was confirmed in this session.
    pub async fn is_admin_verified(&self) -> bool {
        self.session
            .get::<bool>(keys::ADMIN_VERIFIED)
            .await
            .ok()
            .flatten()
            .unwrap_or(false)
    }

    /// Check `input` against the admin panel password and remember a match.
    ///
    /// Returns whether the password matched.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the flag cannot be stored.
    pub async fn verify_admin_password(
        &self,
        input: &str,
        expected: &SecretString,
    ) -> Result<bool, AuthError> {
        if !password_matches(input, expected) {
            return Ok(false);
        }
        self.session.insert(keys::ADMIN_VERIFIED, true).await?;
        Ok(true)
    }
}

/// Compare trimmed input with a trimmed configured password.
///
/// An empty configured password never matches.
#[must_use]
pub fn password_matches(input: &str, expected: &SecretString) -> bool {
    let expected = expected.expose_secret().trim();
    !expected.is_empty() && input.trim() == expected
}
