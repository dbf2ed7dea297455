//! Integration tests for the Milkrun storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p milkrun-integration-tests
//! ```
//!
//! Each test spawns its own storefront on an ephemeral port, wired to a fake
//! backend (also in-process) that serves the coming-soon flag, accounts and
//! the product catalog. Nothing external is required.
//!
//! # Accounts
//!
//! | Email | Password | Role |
//! |---|---|---|
//! | `customer@milkrun.example` | `customer-pass` | `customer` |
//! | `admin@milkrun.example` | `admin-pass` | `ADMIN` |

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use milkrun_storefront::{config::StorefrontConfig, routes, state::AppState};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Password that unlocks the coming-soon gate.
pub const GATE_PASSWORD: &str = "early-access";

/// Admin panel password.
pub const ADMIN_PANEL_PASSWORD: &str = "dairy-door-42";

/// Canonical customer URL admins are sent to from the admin subdomain.
pub const CUSTOMER_BASE_URL: &str = "https://milkrun.example/";

pub const CUSTOMER_EMAIL: &str = "customer@milkrun.example";
pub const CUSTOMER_PASSWORD: &str = "customer-pass";
pub const ADMIN_EMAIL: &str = "admin@milkrun.example";
pub const ADMIN_PASSWORD: &str = "admin-pass";

/// What the fake backend answers for the coming-soon flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlagMode {
    Off = 0,
    On = 1,
    /// Reply with a server error.
    Broken = 2,
    /// Reply `{"isActive": true}` the way older backends do.
    LegacyOn = 3,
}

/// Shared, mutable behaviour of the fake backend.
#[derive(Clone)]
pub struct BackendControl {
    flag: Arc<AtomicU8>,
    tokens_valid: Arc<AtomicBool>,
}

impl BackendControl {
    fn new() -> Self {
        Self {
            flag: Arc::new(AtomicU8::new(FlagMode::Off as u8)),
            tokens_valid: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Set the coming-soon flag answer.
    pub fn set_flag(&self, mode: FlagMode) {
        self.flag.store(mode as u8, Ordering::SeqCst);
    }

    fn flag(&self) -> FlagMode {
        match self.flag.load(Ordering::SeqCst) {
            1 => FlagMode::On,
            2 => FlagMode::Broken,
            3 => FlagMode::LegacyOn,
            _ => FlagMode::Off,
        }
    }

    /// Make `GET /auth/me` reject every token from now on.
    pub fn revoke_tokens(&self) {
        self.tokens_valid.store(false, Ordering::SeqCst);
    }
}

fn account(email: &str) -> Option<(&'static str, &'static str, Value)> {
    match email {
        CUSTOMER_EMAIL => Some((
            CUSTOMER_PASSWORD,
            "customer-token",
            json!({"id": "u-1", "email": CUSTOMER_EMAIL, "name": "Casey", "role": "customer"}),
        )),
        ADMIN_EMAIL => Some((
            ADMIN_PASSWORD,
            "admin-token",
            json!({"id": "u-2", "email": ADMIN_EMAIL, "name": "Avery", "role": "ADMIN"}),
        )),
        _ => None,
    }
}

fn user_for_token(token: &str) -> Option<Value> {
    [CUSTOMER_EMAIL, ADMIN_EMAIL]
        .into_iter()
        .filter_map(account)
        .find(|(_, issued, _)| *issued == token)
        .map(|(_, _, user)| user)
}

fn catalog() -> Value {
    json!([
        {
            "id": "whole-milk",
            "name": "Whole milk",
            "description": "<p>Creamy <b>whole</b> milk.</p><script>alert(1)</script>",
            "price": {"amount": "2.50", "currencyCode": "USD"},
            "variations": [
                {"id": "1l", "name": "1 litre"},
                {"id": "2l", "name": "2 litres", "price": {"amount": "4.50", "currencyCode": "USD"}}
            ]
        },
        {
            "id": "eggs",
            "name": "Free-range eggs",
            "description": "Six eggs.\nLaid this week.",
            "price": {"amount": "3.00", "currencyCode": "USD"}
        }
    ])
}

async fn coming_soon(State(control): State<BackendControl>) -> Response {
    match control.flag() {
        FlagMode::Off => Json(json!({"data": {"enabled": false}})).into_response(),
        FlagMode::On => Json(json!({"data": {"enabled": true}})).into_response(),
        FlagMode::LegacyOn => Json(json!({"data": {"isActive": true}})).into_response(),
        FlagMode::Broken => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn login(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    match account(email) {
        Some((expected, token, user)) if expected == password => {
            Json(json!({"data": {"token": token, "user": user}})).into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn me(State(control): State<BackendControl>, headers: HeaderMap) -> Response {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token.and_then(user_for_token) {
        Some(user) if control.tokens_valid.load(Ordering::SeqCst) => {
            Json(json!({"data": user})).into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn products() -> Json<Value> {
    Json(json!({"data": catalog()}))
}

async fn product(Path(id): Path<String>) -> Response {
    catalog()
        .as_array()
        .and_then(|products| products.iter().find(|p| p["id"] == id.as_str()))
        .map_or_else(
            || StatusCode::NOT_FOUND.into_response(),
            |p| Json(json!({"data": p})).into_response(),
        )
}

async fn spawn_backend() -> (String, BackendControl) {
    let control = BackendControl::new();
    let app = Router::new()
        .route("/api/content/coming-soon", get(coming_soon))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/products", get(products))
        .route("/api/products/{id}", get(product))
        .with_state(control.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake backend");
    let addr = listener.local_addr().expect("fake backend address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake backend");
    });

    (format!("http://{addr}/api"), control)
}

/// A running storefront plus its fake backend.
pub struct TestApp {
    pub base_url: String,
    pub backend: BackendControl,
}

impl TestApp {
    /// Spawn with the default test configuration.
    pub async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    /// Spawn with extra or overriding environment variables.
    pub async fn spawn_with(overrides: &[(&str, &str)]) -> Self {
        let (api_url, backend) = spawn_backend().await;

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind storefront");
        let addr = listener.local_addr().expect("storefront address");
        let base_url = format!("http://{addr}");

        let static_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../storefront/static");
        let mut vars: Vec<(String, String)> = vec![
            ("STOREFRONT_BASE_URL".into(), base_url.clone()),
            ("MILKRUN_API_BASE_URL".into(), api_url),
            ("MILKRUN_API_TIMEOUT_SECS".into(), "2".into()),
            ("CUSTOMER_BASE_URL".into(), CUSTOMER_BASE_URL.into()),
            ("ADMIN_PANEL_PASSWORD".into(), ADMIN_PANEL_PASSWORD.into()),
            ("COMING_SOON_PASSWORD".into(), GATE_PASSWORD.into()),
            ("STOREFRONT_STATIC_DIR".into(), static_dir.into()),
        ];
        for (key, value) in overrides {
            vars.retain(|(k, _)| k != key);
            vars.push(((*key).to_string(), (*value).to_string()));
        }

        let config = StorefrontConfig::from_vars(|key| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .expect("test configuration");
        let state = AppState::new(config).expect("application state");
        let app = routes::app(state);

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("storefront");
        });

        Self { base_url, backend }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A browser-like client: keeps cookies, never follows redirects.
    #[must_use]
    pub fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()
            .expect("test client")
    }

    /// Sign `client` in and return the login response.
    pub async fn login(
        &self,
        client: &reqwest::Client,
        email: &str,
        password: &str,
    ) -> reqwest::Response {
        client
            .post(self.url("/auth/login"))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .expect("login request")
    }
}

/// The `Location` header of a response.
#[must_use]
pub fn location(response: &reqwest::Response) -> Option<&str> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
}
