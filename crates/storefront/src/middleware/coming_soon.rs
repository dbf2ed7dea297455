//! Coming-soon gate.
//!
//! While the backend's coming-soon flag is on, visitors are sent to the gate
//! page unless they hold the bypass cookie (issued by unlocking the gate) or
//! the admin-session cookie. Admin, auth and gate routes are never gated, and
//! neither are health checks and static assets.
//!
//! The flag is fetched for every gated request. If the fetch fails the gate
//! stays open.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};
use tracing::{debug, warn};

use crate::state::AppState;

/// Gate page.
pub const GATE_PATH: &str = "/coming-soon";

/// Cookie issued after a correct gate password.
pub const BYPASS_COOKIE: &str = "milkrun_coming_soon_bypass";

/// Cookie set by the admin application for signed-in staff.
pub const ADMIN_SESSION_COOKIE: &str = "milkrun_admin_session";

/// Lifetime of the bypass cookie.
const BYPASS_COOKIE_MAX_AGE_HOURS: i64 = 24;

/// Path prefixes that are reachable while the gate is up.
const ALLOWED_PREFIXES: &[&str] = &["/admin", "/auth", GATE_PATH];

/// Infrastructure paths the gate never looks at.
const EXEMPT_PREFIXES: &[&str] = &["/health", "/static"];

/// Whether `path` is `prefix` itself or lies below it.
///
/// `/administrator` does not lie below `/admin`.
fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Whether requests to `path` skip the gate without consulting the flag.
#[must_use]
pub fn is_ungated(path: &str) -> bool {
    ALLOWED_PREFIXES
        .iter()
        .chain(EXEMPT_PREFIXES)
        .any(|prefix| has_segment_prefix(path, prefix))
}

/// Gate-relevant cookies carried by a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateCredentials {
    /// A valid bypass cookie is present.
    pub bypass: bool,
    /// A non-empty admin-session cookie is present.
    pub admin_session: bool,
}

impl GateCredentials {
    /// Read the credentials from the request's `Cookie` headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut credentials = Self::default();

        let cookies = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok);

        for cookie in cookies {
            match cookie.name() {
                BYPASS_COOKIE => {
                    credentials.bypass |= matches!(cookie.value().trim(), "true" | "1");
                }
                ADMIN_SESSION_COOKIE => {
                    credentials.admin_session |= !cookie.value().trim().is_empty();
                }
                _ => {}
            }
        }

        credentials
    }

    /// Whether these credentials let the visitor past an active gate.
    #[must_use]
    pub const fn grants_access(self) -> bool {
        self.bypass || self.admin_session
    }
}

/// Gate middleware. Install with `axum::middleware::from_fn_with_state`.
pub async fn coming_soon_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_ungated(request.uri().path()) {
        return next.run(request).await;
    }

    let enabled = match state.api().coming_soon_enabled().await {
        Ok(enabled) => enabled,
        Err(e) => {
            warn!(error = %e, "Coming-soon flag unavailable, leaving gate open");
            false
        }
    };

    if !enabled || GateCredentials::from_headers(request.headers()).grants_access() {
        return next.run(request).await;
    }

    debug!(path = %request.uri().path(), "Coming-soon gate redirect");
    Redirect::to(GATE_PATH).into_response()
}

/// The cookie issued after the gate password was entered correctly.
#[must_use]
pub fn bypass_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((BYPASS_COOKIE, "true"))
        .path("/")
        .max_age(Duration::hours(BYPASS_COOKIE_MAX_AGE_HOURS))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        headers
    }

    #[test]
    fn test_allow_list_is_segment_based() {
        for path in [
            "/admin",
            "/admin/",
            "/admin/anything",
            "/auth/login",
            "/coming-soon",
            "/health",
            "/static/app.js",
        ] {
            assert!(is_ungated(path), "{path} should skip the gate");
        }

        for path in ["/", "/products", "/administrator", "/authors", "/coming-soonish", "/cart"] {
            assert!(!is_ungated(path), "{path} should be gated");
        }
    }

    #[test]
    fn test_bypass_cookie_detected() {
        let creds = GateCredentials::from_headers(&headers(&[
            "milkrun_session=abc; milkrun_coming_soon_bypass=true",
        ]));
        assert!(creds.bypass);
        assert!(!creds.admin_session);
        assert!(creds.grants_access());
    }

    #[test]
    fn test_admin_session_cookie_detected() {
        let creds = GateCredentials::from_headers(&headers(&["milkrun_admin_session=staff-token"]));
        assert!(creds.admin_session);
        assert!(creds.grants_access());
    }

    #[test]
    fn test_invalid_cookie_values_ignored() {
        let creds = GateCredentials::from_headers(&headers(&[
            "milkrun_coming_soon_bypass=false",
            "milkrun_admin_session=",
        ]));
        assert!(!creds.grants_access());
        assert!(!GateCredentials::from_headers(&HeaderMap::new()).grants_access());
    }

    #[test]
    fn test_bypass_cookie_attributes() {
        let cookie = bypass_cookie(true).to_string();
        assert!(cookie.starts_with("milkrun_coming_soon_bypass=true"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=86400"));

        assert!(!bypass_cookie(false).to_string().contains("Secure"));
    }
}
