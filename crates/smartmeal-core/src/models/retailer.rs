//! Grocery retailer and store location models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Third-party grocery retailers a SmartMeal account can link to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retailer {
    /// Kroger family of stores (OAuth account linking)
    Kroger,
    /// Instacart marketplace
    Instacart,
}

impl Retailer {
    /// Stable identifier used in storage keys and backend payloads
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Kroger => "kroger",
            Self::Instacart => "instacart",
        }
    }

    /// Human-readable retailer name
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Kroger => "Kroger",
            Self::Instacart => "Instacart",
        }
    }
}

impl fmt::Display for Retailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Retailer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kroger" => Ok(Self::Kroger),
            "instacart" => Ok(Self::Instacart),
            other => Err(format!("unknown retailer '{other}'")),
        }
    }
}

/// A physical store selected as the default for a retailer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLocation {
    /// Retailer identifier (see [`Retailer::id`])
    pub retailer_id: String,
    /// Retailer-specific location identifier
    pub location_id: String,
    /// Optional display name reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StoreLocation {
    /// Create a store location for the given retailer
    pub fn new(retailer: Retailer, location_id: impl Into<String>) -> Self {
        Self {
            retailer_id: retailer.id().to_string(),
            location_id: location_id.into(),
            name: None,
        }
    }

    /// Whether this location belongs to `retailer`
    #[must_use]
    pub fn is_for(&self, retailer: Retailer) -> bool {
        self.retailer_id == retailer.id()
    }
}
