//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `MILKRUN_API_BASE_URL` - Base URL of the Milkrun backend API
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_STATIC_DIR` - Static asset directory (default: crates/storefront/static)
//! - `STOREFRONT_RICH_TEXT_PARSING` - Parse rich text markup (default: true);
//!   `false` escapes all markup instead
//! - `MILKRUN_API_TIMEOUT_SECS` - Backend request timeout (default: 5)
//! - `CUSTOMER_BASE_URL` - Canonical customer site non-admins are sent to
//!   from the admin subdomain (default: `STOREFRONT_BASE_URL`)
//! - `ADMIN_SUBDOMAIN` - Host label of the admin subdomain (default: admin)
//! - `ADMIN_PANEL_PASSWORD` - Admin panel password (default: built-in
//!   development password, logged as a warning)
//! - `COMING_SOON_PASSWORD` - Password that unlocks the coming-soon gate
//!   (unset: the gate cannot be unlocked)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::sanitize::HtmlCapability;

/// Minimum length of configured passwords.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Admin panel password used when `ADMIN_PANEL_PASSWORD` is unset.
///
/// Development only. Startup logs a warning whenever it is in effect.
pub const DEFAULT_ADMIN_PANEL_PASSWORD: &str = "milkrun-admin-dev";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Canonical customer-facing URL
    pub customer_base_url: Url,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Backend API configuration
    pub api: ApiConfig,
    /// Admin area configuration
    pub admin: AdminConfig,
    /// Coming-soon gate unlock password
    pub coming_soon_password: Option<SecretString>,
    /// Whether rich text markup is parsed or only escaped
    pub rich_text_parsing: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Milkrun backend API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL all endpoints are relative to
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Admin area configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct AdminConfig {
    /// Host label identifying the admin subdomain
    pub subdomain: String,
    /// Admin panel password
    pub panel_password: SecretString,
    /// Whether `panel_password` is the built-in default
    pub using_default_password: bool,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("subdomain", &self.subdomain)
            .field("panel_password", &"[REDACTED]")
            .field("using_default_password", &self.using_default_password)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if a configured password is too short.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Vars(lookup);

        let host = env.parse_or("STOREFRONT_HOST", "127.0.0.1")?;
        let port = env.parse_or("STOREFRONT_PORT", "3000")?;
        let base_url = env.url("STOREFRONT_BASE_URL")?;
        let customer_base_url = match env.optional("CUSTOMER_BASE_URL") {
            Some(_) => env.url("CUSTOMER_BASE_URL")?,
            None => base_url.clone(),
        };
        let static_dir = PathBuf::from(env.or_default("STOREFRONT_STATIC_DIR", "crates/storefront/static"));

        let api = ApiConfig {
            base_url: env.url("MILKRUN_API_BASE_URL")?,
            timeout: Duration::from_secs(env.parse_or("MILKRUN_API_TIMEOUT_SECS", "5")?),
        };

        let admin = AdminConfig::from_vars(&env)?;
        let coming_soon_password = env.password("COMING_SOON_PASSWORD")?;
        let rich_text_parsing = env.parse_or("STOREFRONT_RICH_TEXT_PARSING", "true")?;

        Ok(Self {
            host,
            port,
            base_url,
            customer_base_url,
            static_dir,
            api,
            admin,
            coming_soon_password,
            rich_text_parsing,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.parse_or("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: env.parse_or("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    /// How rich text should be rendered.
    #[must_use]
    pub const fn html_capability(&self) -> HtmlCapability {
        if self.rich_text_parsing {
            HtmlCapability::Dom
        } else {
            HtmlCapability::EscapeOnly
        }
    }
}

impl AdminConfig {
    fn from_vars<F: Fn(&str) -> Option<String>>(env: &Vars<F>) -> Result<Self, ConfigError> {
        let subdomain = env.or_default("ADMIN_SUBDOMAIN", "admin").trim().to_owned();
        let (panel_password, using_default_password) =
            match env.password("ADMIN_PANEL_PASSWORD")? {
                Some(password) => (password, false),
                None => (SecretString::from(DEFAULT_ADMIN_PANEL_PASSWORD), true),
            };

        Ok(Self {
            subdomain,
            panel_password,
            using_default_password,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source with the lookup helpers used above.
struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Get an optional variable; blank counts as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Parse a required absolute URL.
    fn url(&self, key: &str) -> Result<Url, ConfigError> {
        Url::parse(self.required(key)?.trim())
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Get an optional password, rejecting short ones.
    fn password(&self, key: &str) -> Result<Option<SecretString>, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(None);
        };
        let secret = SecretString::from(value);
        validate_password_length(&secret, key)?;
        Ok(Some(secret))
    }
}

/// Validate that a password meets minimum length requirements.
fn validate_password_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let length = secret.expose_secret().trim().chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("must be at least {MIN_PASSWORD_LENGTH} characters (got {length})"),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_vars(|key| vars.get(key).cloned())
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("STOREFRONT_BASE_URL", "https://milkrun.example"),
        ("MILKRUN_API_BASE_URL", "https://api.milkrun.example/v1"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(REQUIRED).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.api.timeout, Duration::from_secs(5));
        assert_eq!(config.customer_base_url, config.base_url);
        assert_eq!(config.admin.subdomain, "admin");
        assert!(config.admin.using_default_password);
        assert_eq!(
            config.admin.panel_password.expose_secret(),
            DEFAULT_ADMIN_PANEL_PASSWORD
        );
        assert!(config.coming_soon_password.is_none());
        assert_eq!(config.html_capability(), HtmlCapability::Dom);
        assert!(config.is_secure());
    }

    #[test]
    fn test_missing_required() {
        let err = load(&[("STOREFRONT_BASE_URL", "https://milkrun.example")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "MILKRUN_API_BASE_URL"));
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("STOREFRONT_PORT", "not-a-port"));
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::InvalidEnvVar(key, _) if key == "STOREFRONT_PORT"
        ));

        let mut vars = REQUIRED.to_vec();
        vars.push(("CUSTOMER_BASE_URL", "/relative"));
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::InvalidEnvVar(key, _) if key == "CUSTOMER_BASE_URL"
        ));
    }

    #[test]
    fn test_short_passwords_rejected() {
        for key in ["ADMIN_PANEL_PASSWORD", "COMING_SOON_PASSWORD"] {
            let mut vars = REQUIRED.to_vec();
            vars.push((key, "short"));
            assert!(matches!(
                load(&vars).unwrap_err(),
                ConfigError::InsecureSecret(name, _) if name == key
            ));
        }
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("STOREFRONT_PORT", "8080"),
            ("CUSTOMER_BASE_URL", "https://shop.milkrun.example"),
            ("ADMIN_SUBDOMAIN", "backoffice"),
            ("ADMIN_PANEL_PASSWORD", "fresh-cream-42"),
            ("COMING_SOON_PASSWORD", "early-bird-99"),
            ("STOREFRONT_RICH_TEXT_PARSING", "false"),
            ("MILKRUN_API_TIMEOUT_SECS", "2"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.customer_base_url.as_str(), "https://shop.milkrun.example/");
        assert_eq!(config.admin.subdomain, "backoffice");
        assert!(!config.admin.using_default_password);
        assert_eq!(
            config.coming_soon_password.as_ref().unwrap().expose_secret(),
            "early-bird-99"
        );
        assert_eq!(config.html_capability(), HtmlCapability::EscapeOnly);
        assert_eq!(config.api.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_admin_config_debug_redacts_password() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("ADMIN_PANEL_PASSWORD", "super-secret-panel"));
        let config = load(&vars).unwrap();

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-panel"));
    }
}
