//! Domain error types.

use common::{AggregateId, UserId};
use event_store::EventStoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors surfaced by [`crate::OrderService`] and the command handler.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Order error: {0}")]
    Order(OrderError),

    #[error("Order not found: {0}")]
    OrderNotFound(AggregateId),

    /// The caller is authenticated but not allowed to perform the action.
    #[error("User {user_id} is not allowed to {action}")]
    Forbidden {
        user_id: UserId,
        action: &'static str,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true when the caller can fix the request and retry.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DomainError::Order(_) | DomainError::OrderNotFound(_) | DomainError::Forbidden { .. }
        )
    }

    /// Returns true when an identical retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_transient())
    }
}
