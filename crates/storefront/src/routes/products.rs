//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use milkrun_core::ProductId;
use tracing::instrument;

use crate::api::Product;
use crate::error::Result;
use crate::filters;
use crate::sanitize::{HtmlCapability, sanitize_rich_text};
use crate::state::AppState;

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    /// Sanitized description markup, safe to render unescaped.
    pub description_html: String,
    pub price: String,
    pub image_url: Option<String>,
    pub variations: Vec<VariationView>,
}

/// Variation display data for templates.
#[derive(Clone)]
pub struct VariationView {
    pub id: String,
    pub name: String,
    pub price: String,
}

impl ProductView {
    /// Build the view, sanitizing the description.
    #[must_use]
    pub fn new(product: &Product, capability: HtmlCapability) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description_html: sanitize_rich_text(&product.description, capability),
            price: product.price.display(),
            image_url: product.image_url.clone(),
            variations: product
                .variations
                .iter()
                .map(|variation| VariationView {
                    id: variation.id.to_string(),
                    name: variation.name.clone(),
                    price: variation.price.unwrap_or(product.price).display(),
                })
                .collect(),
        }
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub products: Vec<ProductView>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub product: ProductView,
}

/// Display product listing page.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let capability = state.config().html_capability();
    let products = state
        .api()
        .products()
        .await?
        .iter()
        .map(|product| ProductView::new(product, capability))
        .collect();

    Ok(ProductsIndexTemplate { products })
}

/// Display product detail page.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let product = state.api().product(&ProductId::new(id)).await?;

    Ok(ProductShowTemplate {
        product: ProductView::new(&product, state.config().html_capability()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(description: &str) -> Product {
        serde_json::from_value(serde_json::json!({
            "id": "milk",
            "name": "Whole milk",
            "description": description,
            "price": {"amount": "2.5"},
            "variations": [{"id": "2l", "name": "2 litres", "price": {"amount": "4.5"}}]
        }))
        .unwrap()
    }

    #[test]
    fn test_description_is_sanitized() {
        let view = ProductView::new(
            &product("<p onclick=\"x()\">Creamy</p><script>steal()</script>"),
            HtmlCapability::Dom,
        );
        assert_eq!(view.description_html, "<p>Creamy</p>");
        assert_eq!(view.price, "$2.50");
        assert_eq!(view.variations[0].price, "$4.50");
    }

    #[test]
    fn test_description_escaped_without_parser() {
        let view = ProductView::new(&product("<b>Creamy</b>"), HtmlCapability::EscapeOnly);
        assert_eq!(view.description_html, "&lt;b&gt;Creamy&lt;/b&gt;");
    }
}
