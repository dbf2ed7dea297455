//! Cart line items and their identity key.
//!
//! A cart holds at most one [`CartItem`] per [`CartKey`], and every quantity
//! stays within `[Quantity::MIN, Quantity::MAX]`.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariationId};

/// Quantity of a single cart line, always within `1..=99`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u8);

/// Error returned when converting an out-of-range number into a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("quantity must be between {min} and {max} (got {got})", min = Quantity::MIN, max = Quantity::MAX)]
pub struct QuantityOutOfRange {
    /// The rejected value.
    pub got: u32,
}

impl Quantity {
    /// Smallest quantity a cart line can hold.
    pub const MIN: u8 = 1;
    /// Largest quantity a cart line can hold.
    pub const MAX: u8 = 99;

    /// A quantity of one.
    pub const ONE: Self = Self(Self::MIN);

    /// Clamp an arbitrary requested amount into `[MIN, MAX]`.
    ///
    /// Zero and negative requests become `MIN`.
    #[must_use]
    pub fn clamped(requested: i64) -> Self {
        let clamped = requested.clamp(i64::from(Self::MIN), i64::from(Self::MAX));
        // In range after the clamp above.
        Self(u8::try_from(clamped).unwrap_or(Self::MAX))
    }

    /// Add another quantity, saturating at `MAX`.
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0).min(Self::MAX))
    }

    /// Numeric value of the quantity.
    #[must_use]
    pub fn get(self) -> u32 {
        u32::from(self.0)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityOutOfRange;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(QuantityOutOfRange { got: value })
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a cart line: a product plus an optional variation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CartKey {
    /// Product being purchased.
    pub product_id: ProductId,
    /// Variation of the product (bottle size, delivery cadence, ...).
    pub variation_id: Option<VariationId>,
}

impl CartKey {
    /// Build a key, treating an empty variation as absent.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, variation_id: Option<VariationId>) -> Self {
        Self {
            product_id: product_id.into(),
            variation_id: variation_id.filter(|v| !v.is_empty()),
        }
    }

    /// Key for a product without a variation.
    #[must_use]
    pub fn product(product_id: impl Into<ProductId>) -> Self {
        Self::new(product_id, None)
    }
}

impl fmt::Display for CartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variation_id {
            Some(variation) => write!(f, "{}:{variation}", self.product_id),
            None => write!(f, "{}", self.product_id),
        }
    }
}

/// A persisted cart line item.
///
/// Serialised as `{"productId": "...", "variationId": "...", "quantity": n}`
/// with `variationId` omitted when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Product being purchased.
    pub product_id: ProductId,
    /// Optional product variation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<VariationId>,
    /// Number of units.
    pub quantity: Quantity,
}

impl CartItem {
    /// Create a new line item for `key`.
    #[must_use]
    pub fn new(key: CartKey, quantity: Quantity) -> Self {
        Self {
            product_id: key.product_id,
            variation_id: key.variation_id,
            quantity,
        }
    }

    /// The identity key of this line.
    #[must_use]
    pub fn key(&self) -> CartKey {
        CartKey::new(self.product_id.clone(), self.variation_id.clone())
    }

    /// Whether this line belongs to `key`.
    #[must_use]
    pub fn matches(&self, key: &CartKey) -> bool {
        self.product_id == key.product_id
            && self.variation_id.as_ref().filter(|v| !v.is_empty()) == key.variation_id.as_ref()
    }
}
