//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::{instrument, warn};

use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::products::ProductView;
use crate::state::AppState;

/// Number of products shown on the home page.
const FEATURED_PRODUCTS: usize = 3;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub greeting_name: Option<String>,
    pub featured: Vec<ProductView>,
}

/// Display the home page.
///
/// A catalog outage leaves the featured section empty.
#[instrument(skip_all)]
pub async fn home(State(state): State<AppState>, OptionalAuth(user): OptionalAuth) -> impl IntoResponse {
    let capability = state.config().html_capability();
    let featured = match state.api().products().await {
        Ok(products) => products
            .iter()
            .take(FEATURED_PRODUCTS)
            .map(|product| ProductView::new(product, capability))
            .collect(),
        Err(e) => {
            warn!(error = %e, "Failed to load featured products");
            Vec::new()
        }
    };

    HomeTemplate {
        greeting_name: user.map(|user| user.display_name().to_string()),
        featured,
    }
}
