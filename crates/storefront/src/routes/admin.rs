//! Admin area route handlers.
//!
//! Every page here sits behind the admin guard. The password prompt is the
//! one page an admin may see before confirming the panel password.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::filters;
use crate::middleware::auth::{AdminCandidate, RequireAdmin};
use crate::routes::account::UserView;
use crate::sanitize::sanitize_rich_text;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Admin password form data.
#[derive(Deserialize)]
pub struct VerifyForm {
    #[serde(default)]
    pub password: String,
}

/// Rich text preview form data.
#[derive(Debug, Deserialize)]
pub struct PreviewForm {
    #[serde(default)]
    pub content: String,
}

/// Admin password prompt template.
///
/// The password field is always rendered empty.
#[derive(Template, WebTemplate)]
#[template(path = "admin/verify.html")]
pub struct AdminVerifyTemplate {
    pub error: Option<String>,
}

/// Admin dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct AdminDashboardTemplate {
    pub user: UserView,
    /// `None` when the flag could not be fetched.
    pub coming_soon: Option<bool>,
    pub rich_text_parsing: bool,
}

/// Sanitized rich text preview fragment.
#[derive(Template, WebTemplate)]
#[template(path = "admin/preview.html")]
pub struct AdminPreviewTemplate {
    pub html: String,
}

/// Display the admin dashboard.
#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
) -> impl IntoResponse {
    let coming_soon = state
        .api()
        .coming_soon_enabled()
        .await
        .inspect_err(|e| warn!(error = %e, "Coming-soon flag unavailable"))
        .ok();

    AdminDashboardTemplate {
        user: UserView::from(&user),
        coming_soon,
        rich_text_parsing: state.config().rich_text_parsing,
    }
}

/// Display the admin password prompt.
pub async fn verify_page(AdminCandidate(_user): AdminCandidate) -> impl IntoResponse {
    AdminVerifyTemplate { error: None }
}

/// Check the admin panel password for this session.
#[instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    session: Session,
    AdminCandidate(user): AdminCandidate,
    Form(form): Form<VerifyForm>,
) -> Result<Response> {
    let auth = AuthService::new(state.api(), &session);
    if auth
        .verify_admin_password(&form.password, &state.config().admin.panel_password)
        .await?
    {
        info!(user_id = %user.id, "Admin panel unlocked");
        return Ok(Redirect::to("/admin").into_response());
    }

    Ok((
        StatusCode::UNAUTHORIZED,
        AdminVerifyTemplate {
            error: Some("Incorrect admin password.".to_string()),
        },
    )
        .into_response())
}

/// Render submitted rich text the way the storefront would.
#[instrument(skip_all)]
pub async fn preview(
    State(state): State<AppState>,
    RequireAdmin(_user): RequireAdmin,
    Form(form): Form<PreviewForm>,
) -> impl IntoResponse {
    AdminPreviewTemplate {
        html: sanitize_rich_text(&form.content, state.config().html_capability()),
    }
}
