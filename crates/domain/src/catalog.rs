//! Catalog view of a product as seen at order time.

use serde::{Deserialize, Serialize};

use crate::order::Money;

/// Catalog product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Priced, stocked product as returned by the catalog.
///
/// `base_price` is the consumer price, `b2b_price` the business price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub image: Option<String>,
    pub base_price: Money,
    pub b2b_price: Money,
    #[serde(default = "default_b2b_minimum_order")]
    pub b2b_minimum_order: u32,
    pub stock: u32,
}

fn default_b2b_minimum_order() -> u32 {
    10
}
