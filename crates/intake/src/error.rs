//! Intake error types.

use domain::{DomainError, OrderError, PricingError, ProductId};
use event_store::EventStoreError;
use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors returned by order intake and lifecycle operations.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The request was malformed. Raised before any side effect.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    #[error("Minimum order not met for {sku}: required {required}, requested {requested}")]
    MinimumOrderNotMet {
        sku: String,
        required: u32,
        requested: u32,
    },

    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: u32,
        requested: u32,
    },

    /// A bounded catalog call did not answer in time.
    #[error("Timed out waiting for {operation}")]
    Timeout { operation: &'static str },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl IntakeError {
    /// Returns true when the caller can fix the request.
    pub fn is_client_error(&self) -> bool {
        match self {
            IntakeError::Validation(_)
            | IntakeError::ProductNotFound { .. }
            | IntakeError::MinimumOrderNotMet { .. }
            | IntakeError::InsufficientStock { .. } => true,
            IntakeError::Domain(e) => e.is_client_error(),
            IntakeError::Timeout { .. } | IntakeError::Catalog(_) => false,
        }
    }

    /// Returns true when an identical retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            IntakeError::Timeout { .. } => true,
            IntakeError::Catalog(e) => e.is_transient(),
            IntakeError::Domain(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Stable snake_case name of the failure, used for metric labels and
    /// error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            IntakeError::Validation(_) => "validation_error",
            IntakeError::ProductNotFound { .. } => "product_not_found",
            IntakeError::MinimumOrderNotMet { .. } => "minimum_order_not_met",
            IntakeError::InsufficientStock { .. } => "insufficient_stock",
            IntakeError::Timeout { .. } => "timeout",
            IntakeError::Catalog(CatalogError::NotFound(_)) => "product_not_found",
            IntakeError::Catalog(_) => "catalog_unavailable",
            IntakeError::Domain(e) => domain_kind(e),
        }
    }
}

fn domain_kind(err: &DomainError) -> &'static str {
    match err {
        DomainError::Order(OrderError::InvalidStatus { .. }) => "invalid_status",
        DomainError::Order(_) => "invalid_order",
        DomainError::OrderNotFound(_) => "order_not_found",
        DomainError::Forbidden { .. } => "forbidden",
        DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => "conflict",
        DomainError::EventStore(e) if e.is_transient() => "storage_unavailable",
        DomainError::EventStore(_) | DomainError::Serialization(_) => "internal_error",
    }
}

impl From<PricingError> for IntakeError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::MinimumOrderNotMet {
                sku,
                required,
                requested,
            } => IntakeError::MinimumOrderNotMet {
                sku,
                required,
                requested,
            },
            PricingError::InvalidQuantity { sku } => {
                IntakeError::Validation(vec![format!("quantity for {sku} must be greater than 0")])
            }
            PricingError::LineTotalOutOfRange { sku } => {
                IntakeError::Validation(vec![format!("line total for {sku} is out of range")])
            }
            PricingError::TotalOutOfRange => {
                IntakeError::Validation(vec!["order total is out of range".to_string()])
            }
        }
    }
}

impl From<OrderError> for IntakeError {
    fn from(e: OrderError) -> Self {
        IntakeError::Domain(DomainError::from(e))
    }
}

/// Result type for intake operations.
pub type Result<T> = std::result::Result<T, IntakeError>;
