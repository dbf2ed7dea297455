//! Visitor cookie.
//!
//! Every browser gets a long-lived `milkrun_visitor` cookie naming its
//! [`VisitorId`]. The cart is stored under that id, so it is shared by all
//! tabs of the browser and outlives sign-in and sign-out.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header::COOKIE, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};
use tracing::{debug, warn};

use crate::state::AppState;
use crate::storage::VisitorId;

/// Cookie naming the visitor.
pub const VISITOR_COOKIE: &str = "milkrun_visitor";

/// Lifetime of the visitor cookie.
const VISITOR_COOKIE_MAX_AGE_DAYS: i64 = 365;

/// The browser a request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visitor(pub VisitorId);

impl<S> FromRequestParts<S> for Visitor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .copied()
            .or_else(|| visitor_from_headers(&parts.headers).map(Self))
            .unwrap_or_else(|| Self(VisitorId::generate())))
    }
}

/// The visitor named by the request's `Cookie` headers, if any.
#[must_use]
pub fn visitor_from_headers(headers: &HeaderMap) -> Option<VisitorId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .filter(|cookie| cookie.name() == VISITOR_COOKIE)
        .find_map(|cookie| VisitorId::parse(cookie.value()))
}

/// The cookie naming `visitor`.
#[must_use]
pub fn visitor_cookie(visitor: VisitorId, secure: bool) -> Cookie<'static> {
    Cookie::build((VISITOR_COOKIE, visitor.to_string()))
        .path("/")
        .max_age(Duration::days(VISITOR_COOKIE_MAX_AGE_DAYS))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Attach a [`Visitor`] to every request, issuing the cookie to new browsers.
pub async fn visitor_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let known = visitor_from_headers(request.headers());
    let visitor = known.unwrap_or_else(VisitorId::generate);
    request.extensions_mut().insert(Visitor(visitor));

    let mut response = next.run(request).await;

    if known.is_none() {
        debug!(%visitor, "Issuing visitor cookie");
        let cookie = visitor_cookie(visitor, state.config().is_secure());
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Failed to encode visitor cookie"),
        }
    }

    response
}
