//! Cart route handlers.
//!
//! The cart lives in the visitor's storage under `milkrun:cart`. Mutations
//! answer htmx requests with a fragment plus an `HX-Trigger: cart-updated`
//! header, and plain form posts with a redirect back to the cart page.
//! Other open tabs learn about changes through `GET /cart/events`.

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{
        AppendHeaders, IntoResponse, Redirect, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::Stream;
use milkrun_core::{CartItem, CartKey, CurrencyCode, Price, VariationId};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::api::Product;
use crate::cart::{CART_STORAGE_KEY, CartContext};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{HxRequest, Visitor};
use crate::state::AppState;
use crate::storage::VisitorStorage;

/// SSE event name announcing a new cart count.
pub const CART_UPDATED_EVENT: &str = "cart-updated";

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub product_id: String,
    pub variation_id: String,
    pub name: String,
    pub variation_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<String>,
    pub line_price: Option<String>,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub subtotal: Option<String>,
    pub item_count: u32,
}

impl CartView {
    /// Join cart lines with catalog data. Lines for unknown products keep
    /// their ids and show no price.
    #[must_use]
    pub fn new(items: &[CartItem], catalog: &[Product]) -> Self {
        let mut line_prices = Vec::with_capacity(items.len());

        let lines = items
            .iter()
            .map(|item| {
                let product = catalog.iter().find(|p| p.id == item.product_id);
                let variation = product
                    .zip(item.variation_id.as_ref())
                    .and_then(|(p, id)| p.variation(id));
                let unit = product.map(|p| p.unit_price(item.variation_id.as_ref()));
                let line = unit.map(|price| price.times(item.quantity.get()));
                line_prices.push(line);

                CartLineView {
                    product_id: item.product_id.to_string(),
                    variation_id: item
                        .variation_id
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    name: product.map_or_else(|| item.product_id.to_string(), |p| p.name.clone()),
                    variation_name: variation
                        .map(|v| v.name.clone())
                        .or_else(|| item.variation_id.as_ref().map(ToString::to_string)),
                    quantity: item.quantity.get(),
                    unit_price: unit.map(|price| price.display()),
                    line_price: line.map(|price| price.display()),
                }
            })
            .collect();

        Self {
            items: lines,
            subtotal: subtotal(line_prices).map(|total| total.display()),
            item_count: items.iter().map(|item| item.quantity.get()).sum(),
        }
    }
}

/// Sum of line prices, or `None` when a line is unpriced or currencies differ.
fn subtotal(prices: Vec<Option<Price>>) -> Option<Price> {
    let mut prices = prices.into_iter();
    let Some(first) = prices.next() else {
        return Some(Price::new(Decimal::ZERO, CurrencyCode::default()));
    };

    prices.try_fold(first?, |total, price| {
        let price = price?;
        (price.currency_code == total.currency_code)
            .then(|| Price::new(total.amount + price.amount, total.currency_code))
    })
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    #[serde(default)]
    pub variation_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    #[serde(default)]
    pub variation_id: Option<String>,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: String,
    #[serde(default)]
    pub variation_id: Option<String>,
}

/// Build a cart key from form fields, rejecting a blank product.
fn cart_key(product_id: &str, variation_id: Option<&str>) -> Result<CartKey> {
    let product_id = product_id.trim();
    if product_id.is_empty() {
        return Err(AppError::BadRequest("product_id is required".to_string()));
    }
    let variation_id = variation_id
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(VariationId::new);
    Ok(CartKey::new(product_id, variation_id))
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Join the cart with the catalog; a catalog outage only hides names and prices.
async fn cart_view(state: &AppState, cart: &CartContext<VisitorStorage>) -> CartView {
    if cart.is_empty() {
        return CartView::new(&[], &[]);
    }
    let catalog = state.api().products().await.unwrap_or_else(|e| {
        warn!(error = %e, "Catalog unavailable, rendering cart without prices");
        Vec::new()
    });
    CartView::new(cart.items(), &catalog)
}

/// Respond to a cart mutation.
async fn mutation_response(
    state: &AppState,
    cart: &CartContext<VisitorStorage>,
    htmx: bool,
) -> Response {
    if !htmx {
        return Redirect::to("/cart").into_response();
    }
    (
        AppendHeaders([("HX-Trigger", CART_UPDATED_EVENT)]),
        CartItemsTemplate {
            cart: cart_view(state, cart).await,
        },
    )
        .into_response()
}

/// Display cart page.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Visitor(visitor): Visitor) -> impl IntoResponse {
    let cart = state.cart(visitor).await;
    CartShowTemplate {
        cart: cart_view(&state, &cart).await,
    }
}

/// Add item to cart.
///
/// htmx requests get the new count badge back.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
    HxRequest(htmx): HxRequest,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let key = cart_key(&form.product_id, form.variation_id.as_deref())?;
    let mut cart = state.cart(visitor).await;
    cart.add_item(&key, form.quantity.unwrap_or(1)).await?;

    let item = key.to_string();
    add_breadcrumb("cart", "Added item to cart", Some(&[("item", item.as_str())]));

    if !htmx {
        return Ok(Redirect::to("/cart").into_response());
    }
    Ok((
        AppendHeaders([("HX-Trigger", CART_UPDATED_EVENT)]),
        CartCountTemplate {
            count: cart.item_count(),
        },
    )
        .into_response())
}

/// Set the quantity of a cart line.
#[instrument(skip(state))]
pub async fn update(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
    HxRequest(htmx): HxRequest,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let key = cart_key(&form.product_id, form.variation_id.as_deref())?;
    let mut cart = state.cart(visitor).await;
    cart.set_item_quantity(&key, form.quantity).await?;
    Ok(mutation_response(&state, &cart, htmx).await)
}

/// Remove a cart line.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
    HxRequest(htmx): HxRequest,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let key = cart_key(&form.product_id, form.variation_id.as_deref())?;
    let mut cart = state.cart(visitor).await;
    cart.remove_item(&key).await?;
    Ok(mutation_response(&state, &cart, htmx).await)
}

/// Empty the cart.
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
    HxRequest(htmx): HxRequest,
) -> Result<Response> {
    let mut cart = state.cart(visitor).await;
    cart.clear_cart().await?;
    Ok(mutation_response(&state, &cart, htmx).await)
}

/// Get cart count badge (HTMX).
#[instrument(skip(state))]
pub async fn count(State(state): State<AppState>, Visitor(visitor): Visitor) -> impl IntoResponse {
    let cart = state.cart(visitor).await;
    CartCountTemplate {
        count: cart.item_count(),
    }
}

fn count_event(count: u32) -> Event {
    Event::default()
        .event(CART_UPDATED_EVENT)
        .data(count.to_string())
}

/// Stream cart count changes made by any tab of this visitor.
///
/// Sends the current count first.
#[instrument(skip(state))]
pub async fn events(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    // Subscribe before reading so no write slips between the two.
    let mut changes = state
        .storage_events()
        .subscribe(visitor.to_string(), CART_STORAGE_KEY);
    let mut cart = state.cart(visitor).await;

    let stream = async_stream::stream! {
        yield Ok(count_event(cart.item_count()));

        while let Ok(change) = changes.changed().await {
            if cart.sync(&change).await {
                yield Ok(count_event(cart.item_count()));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use milkrun_core::Quantity;

    use super::*;

    fn catalog() -> Vec<Product> {
        serde_json::from_value(serde_json::json!([
            {
                "id": "milk",
                "name": "Whole milk",
                "price": {"amount": "2.50"},
                "variations": [{"id": "2l", "name": "2 litres", "price": {"amount": "4.50"}}]
            },
            {"id": "eggs", "name": "Free-range eggs", "price": {"amount": "3.00"}}
        ]))
        .unwrap()
    }

    fn item(product: &str, variation: Option<&str>, quantity: i64) -> CartItem {
        CartItem::new(
            CartKey::new(product, variation.map(VariationId::new)),
            Quantity::clamped(quantity),
        )
    }

    #[test]
    fn test_cart_view_prices_lines() {
        let view = CartView::new(
            &[item("milk", Some("2l"), 2), item("eggs", None, 1)],
            &catalog(),
        );

        assert_eq!(view.item_count, 3);
        assert_eq!(view.items[0].name, "Whole milk");
        assert_eq!(view.items[0].variation_name.as_deref(), Some("2 litres"));
        assert_eq!(view.items[0].line_price.as_deref(), Some("$9.00"));
        assert_eq!(view.items[1].unit_price.as_deref(), Some("$3.00"));
        assert_eq!(view.subtotal.as_deref(), Some("$12.00"));
    }

    #[test]
    fn test_cart_view_without_catalog() {
        let view = CartView::new(&[item("milk", None, 2)], &[]);
        assert_eq!(view.items[0].name, "milk");
        assert_eq!(view.items[0].line_price, None);
        assert_eq!(view.subtotal, None);
        assert_eq!(view.item_count, 2);
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::new(&[], &[]);
        assert!(view.items.is_empty());
        assert_eq!(view.subtotal.as_deref(), Some("$0.00"));
    }

    #[test]
    fn test_subtotal_needs_matching_currencies() {
        let usd = Price::new(Decimal::ONE, CurrencyCode::USD);
        let eur = Price::new(Decimal::ONE, CurrencyCode::EUR);
        assert_eq!(subtotal(vec![Some(usd), Some(usd)]).unwrap().display(), "$2.00");
        assert_eq!(subtotal(vec![Some(usd), Some(eur)]), None);
        assert_eq!(subtotal(vec![Some(usd), None]), None);
    }

    #[test]
    fn test_cart_key_from_form() {
        assert!(cart_key("  ", None).is_err());
        assert_eq!(cart_key(" milk ", Some(" ")).unwrap(), CartKey::product("milk"));
        assert_eq!(
            cart_key("milk", Some("2l")).unwrap(),
            CartKey::new("milk", Some(VariationId::new("2l")))
        );
    }
}
