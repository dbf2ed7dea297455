//! Authentication extractors.
//!
//! Guarded handlers take one of these extractors. Each runs the session check
//! against the backend, asks [`guard::decide`] what the route may render, and
//! rejects with the matching response when the answer is not "render".
//!
//! ```rust,ignore
//! async fn dashboard(RequireAdmin(user): RequireAdmin) -> impl IntoResponse {
//!     format!("Hello, {}!", user.display_name())
//! }
//! ```

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::debug;

use super::htmx::HxRequest;
use crate::api::User;
use crate::models::session::keys;
use crate::routes::admin::AdminVerifyTemplate;
use crate::services::auth::guard::{self, AuthState, GuardContext, GuardDecision, GuardPolicy};
use crate::services::auth::{AuthService, Navigation};
use crate::state::AppState;

/// Seconds a client should wait before retrying a pending guard.
const RETRY_AFTER_SECONDS: &str = "1";

/// Extractor for routes any signed-in user may see.
pub struct RequireAuth(pub User);

/// Extractor for admin-only routes. Requires the `admin` role and a confirmed
/// admin panel password.
pub struct RequireAdmin(pub User);

/// Extractor for the admin password prompt itself: the `admin` role is
/// required, the password confirmation is not.
pub struct AdminCandidate(pub User);

/// Cached user for display. Never use it for access decisions.
pub struct OptionalAuth(pub Option<User>);

/// Response for a request a guard refused.
#[derive(Debug)]
pub enum GuardRejection {
    /// The session check has not concluded.
    Pending,
    /// Send the visitor elsewhere.
    Navigate { to: Navigation, htmx: bool },
    /// Show only the admin password prompt.
    PromptPassword,
    /// API request without a valid session.
    Unauthorized,
    /// API request by a user lacking the required role or verification.
    Forbidden,
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Pending => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, RETRY_AFTER_SECONDS)],
                "Checking your session",
            )
                .into_response(),
            Self::Navigate {
                to: Navigation::Soft(path),
                htmx: true,
            } => AppendHeaders([("HX-Location", path)]).into_response(),
            Self::Navigate {
                to: Navigation::Soft(path),
                htmx: false,
            } => Redirect::to(&path).into_response(),
            Self::Navigate {
                to: Navigation::Hard(url),
                htmx: true,
            } => AppendHeaders([("HX-Redirect", url.to_string())]).into_response(),
            Self::Navigate {
                to: Navigation::Hard(url),
                htmx: false,
            } => Redirect::to(url.as_str()).into_response(),
            Self::PromptPassword => AdminVerifyTemplate { error: None }.into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

/// Run the session check and the guard for `policy`.
///
/// Returns the decision together with the user it was made for.
async fn check(parts: &Parts, state: &AppState, policy: GuardPolicy) -> (GuardDecision, AuthState) {
    let Some(session) = parts.extensions.get::<Session>() else {
        debug!("No session layer in front of a guarded route");
        let anonymous = AuthState::Anonymous;
        let decision = guard::decide(policy, &anonymous, &context(parts, state, false));
        return (decision, anonymous);
    };

    let auth = AuthService::new(state.api(), session);
    let auth_state = auth.resolve().await;

    let admin_verified = match (&auth_state, policy) {
        (AuthState::Authenticated(user), GuardPolicy::Admin) if user.is_admin() => {
            auth.is_admin_verified().await
        }
        _ => false,
    };

    let decision = guard::decide(policy, &auth_state, &context(parts, state, admin_verified));
    (decision, auth_state)
}

fn context<'a>(parts: &'a Parts, state: &'a AppState, admin_verified: bool) -> GuardContext<'a> {
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.host())
        .unwrap_or_default();

    GuardContext {
        host,
        admin_subdomain: &state.config().admin.subdomain,
        customer_base_url: &state.config().customer_base_url,
        admin_verified,
    }
}

/// Turn a refusal into the response for this kind of request.
fn reject(parts: &Parts, decision: GuardDecision) -> GuardRejection {
    let is_api = parts.uri.path().starts_with("/api/");
    match decision {
        GuardDecision::Navigate(Navigation::Soft(path)) if is_api && path == guard::LOGIN_PATH => {
            GuardRejection::Unauthorized
        }
        GuardDecision::Navigate(_) | GuardDecision::PromptPassword if is_api => {
            GuardRejection::Forbidden
        }
        GuardDecision::Navigate(to) => GuardRejection::Navigate {
            to,
            htmx: HxRequest::from_headers(&parts.headers).0,
        },
        GuardDecision::PromptPassword => GuardRejection::PromptPassword,
        GuardDecision::Pending | GuardDecision::Allow => GuardRejection::Pending,
    }
}

fn into_user(auth_state: AuthState) -> Result<User, GuardRejection> {
    match auth_state {
        AuthState::Authenticated(user) => Ok(user),
        AuthState::Loading | AuthState::Anonymous => Err(GuardRejection::Pending),
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        match check(parts, &state, GuardPolicy::Authenticated).await {
            (GuardDecision::Allow, auth_state) => into_user(auth_state).map(Self),
            (decision, _) => Err(reject(parts, decision)),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        match check(parts, &state, GuardPolicy::Admin).await {
            (GuardDecision::Allow, auth_state) => into_user(auth_state).map(Self),
            (decision, _) => Err(reject(parts, decision)),
        }
    }
}

impl<S> FromRequestParts<S> for AdminCandidate
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        match check(parts, &state, GuardPolicy::Admin).await {
            (GuardDecision::Allow | GuardDecision::PromptPassword, auth_state) => {
                into_user(auth_state).map(Self)
            }
            (decision, _) => Err(reject(parts, decision)),
        }
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<User>(keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;
    use url::Url;

    use super::*;

    fn parts(uri: &str, htmx: bool) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if htmx {
            builder = builder.header("hx-request", "true");
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_reject_page_requests() {
        let login = GuardDecision::Navigate(Navigation::Soft("/auth/login".to_string()));
        assert!(matches!(
            reject(&parts("/account", false), login.clone()),
            GuardRejection::Navigate { htmx: false, .. }
        ));
        assert!(matches!(
            reject(&parts("/account", true), login),
            GuardRejection::Navigate { htmx: true, .. }
        ));
        assert!(matches!(
            reject(&parts("/admin", false), GuardDecision::PromptPassword),
            GuardRejection::PromptPassword
        ));
    }

    #[test]
    fn test_reject_api_requests() {
        let login = GuardDecision::Navigate(Navigation::Soft("/auth/login".to_string()));
        assert!(matches!(
            reject(&parts("/api/orders", false), login),
            GuardRejection::Unauthorized
        ));
        assert!(matches!(
            reject(
                &parts("/api/orders", false),
                GuardDecision::Navigate(Navigation::Soft("/".to_string()))
            ),
            GuardRejection::Forbidden
        ));
        assert!(matches!(
            reject(&parts("/api/orders", false), GuardDecision::PromptPassword),
            GuardRejection::Forbidden
        ));
    }

    #[test]
    fn test_rejection_responses() {
        let pending = GuardRejection::Pending.into_response();
        assert_eq!(pending.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(pending.headers().get(header::RETRY_AFTER).unwrap(), "1");

        let soft = GuardRejection::Navigate {
            to: Navigation::Soft("/".to_string()),
            htmx: false,
        }
        .into_response();
        assert_eq!(soft.status(), StatusCode::SEE_OTHER);
        assert_eq!(soft.headers().get(header::LOCATION).unwrap(), "/");

        let hard = GuardRejection::Navigate {
            to: Navigation::Hard(Url::parse("https://milkrun.example/").unwrap()),
            htmx: true,
        }
        .into_response();
        assert_eq!(
            hard.headers().get("hx-redirect").unwrap(),
            "https://milkrun.example/"
        );
    }
}
