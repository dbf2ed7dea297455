//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use tower_sessions_moka_store::MokaStore;

use crate::api::{ApiError, BackendClient};
use crate::cart::{CartContext, CartStore};
use crate::config::StorefrontConfig;
use crate::storage::{StorageEvents, VisitorId, VisitorStorage, VisitorStore};

/// Most sessions kept in memory at once.
const MAX_SESSIONS: u64 = 100_000;

/// Most visitors whose storage is kept at once.
const MAX_VISITORS: u64 = 100_000;

/// Visitor storage is dropped after this long without access.
const VISITOR_IDLE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend client, the session store and per-visitor storage.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: BackendClient,
    session_store: MokaStore,
    visitors: VisitorStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let api = BackendClient::new(&config.api)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                session_store: MokaStore::new(Some(MAX_SESSIONS)),
                visitors: VisitorStore::new(VISITOR_IDLE, MAX_VISITORS, StorageEvents::default()),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend API client.
    #[must_use]
    pub fn api(&self) -> &BackendClient {
        &self.inner.api
    }

    /// Get a reference to the session store.
    #[must_use]
    pub fn session_store(&self) -> &MokaStore {
        &self.inner.session_store
    }

    /// Get a reference to the storage change channel.
    #[must_use]
    pub fn storage_events(&self) -> &StorageEvents {
        self.inner.visitors.events()
    }

    /// Storage of one visitor.
    #[must_use]
    pub fn visitor_storage(&self, visitor: VisitorId) -> VisitorStorage {
        self.inner.visitors.open(visitor)
    }

    /// Load the cart of `visitor`.
    pub async fn cart(&self, visitor: VisitorId) -> CartContext<VisitorStorage> {
        CartContext::load(CartStore::new(self.visitor_storage(visitor))).await
    }
}
