//! Session middleware configuration.
//!
//! Sign-in state (backend token, cached user, admin verification) lives in a
//! `moka`-backed `tower-sessions` store keyed by the `milkrun_session` cookie.
//! Expired records are evicted by the cache. The cart is not kept here; see
//! [`crate::storage::VisitorStore`].

use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_moka_store::MokaStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "milkrun_session";

/// Session expiry time in seconds (7 days of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer over `store`.
#[must_use]
pub fn create_session_layer(
    store: MokaStore,
    config: &StorefrontConfig,
) -> SessionManagerLayer<MokaStore> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_sessions::session::{Id, Record};
    use tower_sessions::SessionStore;
    use tower_sessions::cookie::time::{Duration, OffsetDateTime};

    use super::*;

    fn record(expiry_date: OffsetDateTime) -> Record {
        Record {
            id: Id::default(),
            data: [("current_user".to_string(), serde_json::json!("casey"))]
                .into_iter()
                .collect(),
            expiry_date,
        }
    }

    #[tokio::test]
    async fn test_expired_sessions_are_not_loaded() {
        let store = MokaStore::new(Some(100));

        let mut live = record(OffsetDateTime::now_utc() + Duration::hours(1));
        store.create(&mut live).await.unwrap();
        let mut expired = record(OffsetDateTime::now_utc() - Duration::hours(1));
        store.create(&mut expired).await.unwrap();

        assert!(store.load(&live.id).await.unwrap().is_some());
        assert!(store.load(&expired.id).await.unwrap().is_none());
    }
}
