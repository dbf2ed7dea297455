//! Backend API payloads.

use milkrun_core::{Price, ProductId, UserId, UserRole, VariationId};
use serde::{Deserialize, Serialize};

/// Standard response envelope: `{"data": ...}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Payload of `GET /content/coming-soon`.
///
/// Older backends report `isActive` instead of `enabled`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFlag {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl ContentFlag {
    /// Resolved flag value; absent means off.
    #[must_use]
    pub fn value(&self) -> bool {
        self.enabled.or(self.is_active).unwrap_or(false)
    }
}

/// An account as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

impl User {
    /// Whether the user's role is `admin`, ignoring case.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Name for greetings, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response body of `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// A product offered for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Rich text authored in the back office. Render only after sanitizing.
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub variations: Vec<Variation>,
}

impl Product {
    /// Look up a variation by id.
    #[must_use]
    pub fn variation(&self, id: &VariationId) -> Option<&Variation> {
        self.variations.iter().find(|v| &v.id == id)
    }

    /// Unit price of the product, or of one of its variations.
    #[must_use]
    pub fn unit_price(&self, variation: Option<&VariationId>) -> Price {
        variation
            .and_then(|id| self.variation(id))
            .and_then(|v| v.price)
            .unwrap_or(self.price)
    }
}

/// A purchasable variant of a product (bottle size, cadence, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    pub id: VariationId,
    pub name: String,
    /// Overrides the product price when present.
    #[serde(default)]
    pub price: Option<Price>,
}
