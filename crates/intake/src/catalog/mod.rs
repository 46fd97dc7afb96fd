//! Catalog gateway: product lookup and atomic stock mutation.

mod memory;
mod postgres;

use std::path::Path;

use async_trait::async_trait;
use domain::{ProductId, ProductSnapshot};
use thiserror::Error;

pub use memory::InMemoryCatalog;
pub use postgres::PostgresCatalog;

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockUpdate {
    /// The decrement was applied; `remaining` is the stock left afterwards.
    Applied { remaining: u32 },
    /// Stock was left untouched because it could not cover the request.
    Insufficient { available: u32 },
}

/// Errors raised by catalog backends.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid seed data: {0}")]
    InvalidSeed(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CatalogError {
    pub fn is_transient(&self) -> bool {
        match self {
            CatalogError::Unavailable(_) => true,
            CatalogError::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            CatalogError::NotFound(_) | CatalogError::InvalidSeed(_) => false,
        }
    }
}

/// Read access to products and the only way stock is allowed to change.
///
/// `decrement_stock` must check and subtract in one indivisible step so that
/// concurrent callers can never drive stock below zero.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, CatalogError>;

    /// Subtracts `quantity` if and only if the current stock covers it.
    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockUpdate, CatalogError>;

    /// Adds `quantity` back. Used to compensate a decrement.
    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<(), CatalogError>;
}

/// Reads a JSON array of product snapshots.
pub async fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<ProductSnapshot>, CatalogError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CatalogError::InvalidSeed(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| CatalogError::InvalidSeed(format!("{}: {e}", path.display())))
}
