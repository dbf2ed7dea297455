//! Authentication route handlers.
//!
//! Credentials are checked by the backend; the session keeps the issued token.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Query parameters for the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub email: String,
    pub next: Option<String>,
}

/// Only same-site paths are followed after login.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|path| path.starts_with('/') && !path.starts_with("//") && !path.contains('\\'))
}

/// Display the login page.
pub async fn login_page(Query(query): Query<LoginQuery>) -> impl IntoResponse {
    LoginTemplate {
        error: None,
        email: String::new(),
        next: safe_next(query.next.as_deref()).map(str::to_string),
    }
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(query.next.as_deref()).map(str::to_string);
    let password = SecretString::from(form.password);
    let auth = AuthService::new(state.api(), &session);

    let (status, message) = match auth.login(&form.email, &password).await {
        Ok(user) => {
            info!(user_id = %user.id, "Login succeeded");
            set_sentry_user(&user.id, Some(&user.email));
            return Redirect::to(next.as_deref().unwrap_or("/account")).into_response();
        }
        Err(AuthError::MissingCredentials) => (
            StatusCode::BAD_REQUEST,
            "Enter your email address and password.",
        ),
        Err(AuthError::InvalidCredentials) => {
            (StatusCode::UNAUTHORIZED, "Email or password is incorrect.")
        }
        Err(e) => {
            warn!(error = %e, "Login failed");
            (
                StatusCode::BAD_GATEWAY,
                "We could not sign you in right now. Please try again.",
            )
        }
    };

    (
        status,
        LoginTemplate {
            error: Some(message.to_string()),
            email: form.email,
            next,
        },
    )
        .into_response()
}

/// Handle logout. The cart is kept.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    if let Err(e) = AuthService::new(state.api(), &session).logout().await {
        error!(error = %e, "Failed to clear session on logout");
    }
    clear_sentry_user();

    Redirect::to("/").into_response()
}
