//! Milkrun backend REST client.
//!
//! Every endpoint wraps its payload in `{"data": ...}`. The client applies
//! one timeout to every call and never retries; callers decide how to
//! degrade.

pub mod types;

use std::sync::Arc;

use milkrun_core::ProductId;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

pub use types::{ContentFlag, LoginResponse, Product, User, Variation};

use crate::config::ApiConfig;
use types::{Envelope, LoginRequest};

/// Errors from the backend API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Non-success status not covered below.
    #[error("backend returned {0}: {1}")]
    Status(StatusCode, String),

    /// 404 from the backend.
    #[error("not found")]
    NotFound,

    /// 401 from the backend.
    #[error("unauthorized")]
    Unauthorized,

    /// Endpoint path could not be joined onto the base URL.
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}

/// Client for the Milkrun backend.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("milkrun-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Url::join drops the last path segment unless it ends with '/'.
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(BackendClientInner { client, base_url }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Whether the coming-soon gate is switched on.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or replies with garbage.
    #[instrument(skip(self))]
    pub async fn coming_soon_enabled(&self) -> Result<bool, ApiError> {
        let response = self
            .inner
            .client
            .get(self.endpoint("content/coming-soon")?)
            .send()
            .await?;
        let flag: ContentFlag = unwrap_envelope(response).await?;
        Ok(flag.value())
    }

    /// Exchange credentials for an access token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for bad credentials.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<LoginResponse, ApiError> {
        let response = self
            .inner
            .client
            .post(self.endpoint("auth/login")?)
            .json(&LoginRequest {
                email,
                password: password.expose_secret(),
            })
            .send()
            .await?;
        unwrap_envelope(response).await
    }

    /// Fetch the user owning `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] if the token is no longer valid.
    #[instrument(skip_all)]
    pub async fn current_user(&self, token: &SecretString) -> Result<User, ApiError> {
        let response = self
            .inner
            .client
            .get(self.endpoint("auth/me")?)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        unwrap_envelope(response).await
    }

    /// List products.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<Vec<Product>, ApiError> {
        let response = self
            .inner
            .client
            .get(self.endpoint("products")?)
            .send()
            .await?;
        unwrap_envelope(response).await
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for unknown ids.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let mut url = self.endpoint("products")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::NotFound)?
            .pop_if_empty()
            .push(id.as_str());

        let response = self.inner.client.get(url).send().await?;
        unwrap_envelope(response).await
    }
}

/// Map the status code and decode `{"data": T}`.
async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED => return Err(ApiError::Unauthorized),
        StatusCode::NOT_FOUND => return Err(ApiError::NotFound),
        _ => {}
    }

    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Status(status, body.chars().take(200).collect()));
    }

    serde_json::from_str::<Envelope<T>>(&body)
        .map(|envelope| envelope.data)
        .map_err(|e| {
            debug!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Unexpected backend payload"
            );
            ApiError::Parse(e)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(&ApiConfig {
            base_url: Url::parse(base).unwrap(),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = client("https://api.milkrun.example/v1");
        assert_eq!(
            api.endpoint("content/coming-soon").unwrap().as_str(),
            "https://api.milkrun.example/v1/content/coming-soon"
        );
        assert_eq!(
            api.endpoint("/auth/me").unwrap().as_str(),
            "https://api.milkrun.example/v1/auth/me"
        );
    }

    #[test]
    fn test_endpoint_with_trailing_slash() {
        let api = client("https://api.milkrun.example/");
        assert_eq!(
            api.endpoint("products").unwrap().as_str(),
            "https://api.milkrun.example/products"
        );
    }
}
