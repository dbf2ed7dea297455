//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};

use crate::api::User;
use crate::filters;
use crate::middleware::Visitor;
use crate::middleware::auth::RequireAuth;
use crate::state::AppState;

/// User display data for templates.
#[derive(Clone)]
pub struct UserView {
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            name: user.display_name().to_string(),
            email: user.email.clone(),
            is_admin: user.is_admin(),
        }
    }
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub user: UserView,
    pub cart_count: u32,
}

/// Display account overview page.
///
/// The `RequireAuth` extractor ensures the user is logged in.
pub async fn index(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
    RequireAuth(current_user): RequireAuth,
) -> impl IntoResponse {
    let cart = state.cart(visitor).await;

    AccountIndexTemplate {
        user: UserView::from(&current_user),
        cart_count: cart.item_count(),
    }
}
