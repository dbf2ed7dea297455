//! Coming-soon gate page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::filters;
use crate::middleware::bypass_cookie;
use crate::services::auth::password_matches;
use crate::state::AppState;

/// Gate unlock form data.
#[derive(Deserialize)]
pub struct UnlockForm {
    #[serde(default)]
    pub password: String,
}

/// Coming-soon page template.
#[derive(Template, WebTemplate)]
#[template(path = "coming_soon.html")]
pub struct ComingSoonTemplate {
    pub error: Option<String>,
}

/// Display the gate page.
pub async fn page() -> impl IntoResponse {
    ComingSoonTemplate { error: None }
}

/// Check the gate password and issue the bypass cookie.
#[instrument(skip_all)]
pub async fn unlock(State(state): State<AppState>, Form(form): Form<UnlockForm>) -> Response {
    let unlocked = state
        .config()
        .coming_soon_password
        .as_ref()
        .is_some_and(|expected| password_matches(&form.password, expected));

    if !unlocked {
        return (
            StatusCode::UNAUTHORIZED,
            ComingSoonTemplate {
                error: Some("That password is not right.".to_string()),
            },
        )
            .into_response();
    }

    info!("Coming-soon gate unlocked");
    let cookie = bypass_cookie(state.config().is_secure());
    (
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        Redirect::to("/"),
    )
        .into_response()
}
