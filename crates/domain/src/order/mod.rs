//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod status;
mod value_objects;

pub use aggregate::Order;
pub use commands::*;
pub use events::{
    InventoryReleasedData, OrderEvent, OrderPlacedData, PaymentStatusRecordedData,
    StatusChangedData,
};
pub use service::OrderService;
pub use status::{OrderStatus, PaymentStatus};
pub use value_objects::{Address, LineItem, Money};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order already placed")]
    AlreadyPlaced,

    /// The order stream does not exist.
    #[error("Order has not been placed")]
    NotPlaced,

    #[error("Order has no items")]
    NoItems,

    #[error("Invalid quantity for {sku}: must be greater than 0")]
    InvalidQuantity { sku: String },

    /// Totals do not add up or disagree with the line items.
    #[error("Order totals are inconsistent with its line items")]
    InconsistentTotals,

    #[error("Invalid status: {value}")]
    InvalidStatus { value: String },

    #[error("Invalid payment status: {value}")]
    InvalidPaymentStatus { value: String },
}
