//! User roles as reported by the backend.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Role attached to a backend user account.
///
/// The backend sends a free-form string. Matching is case-insensitive and
/// unknown roles are preserved rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserRole {
    /// Back-office administrator.
    Admin,
    /// Regular subscriber.
    Customer,
    /// Any other role string.
    Other(String),
}

impl UserRole {
    /// Parse a role string, ignoring ASCII case only.
    #[must_use]
    pub fn parse(role: &str) -> Self {
        if role.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else if role.eq_ignore_ascii_case("customer") {
            Self::Customer
        } else {
            Self::Other(role.to_owned())
        }
    }

    /// Whether this role grants access to the admin area.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Customer
    }
}

impl From<String> for UserRole {
    fn from(role: String) -> Self {
        Self::parse(&role)
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.to_string()
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Customer => f.write_str("customer"),
            Self::Other(role) => f.write_str(role),
        }
    }
}
