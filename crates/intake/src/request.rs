//! Order intake request and receipt shapes.

use common::AggregateId;
use domain::{Address, Money, OrderStatus, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::{IntakeError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    /// Signed so that zero and negative quantities reach validation instead
    /// of failing deserialization.
    pub quantity: i64,
}

impl OrderItemRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A cart submitted for ordering. The channel is never part of the request;
/// it comes from the caller's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Address,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    /// Checks the request shape. Reports every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.items.is_empty() {
            problems.push("items must contain at least one entry".to_string());
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.product_id.as_str().trim().is_empty() {
                problems.push(format!("items[{index}].product_id is required"));
            }
            if item.quantity <= 0 {
                problems.push(format!("items[{index}].quantity must be greater than 0"));
            } else if u32::try_from(item.quantity).is_err() {
                problems.push(format!("items[{index}].quantity is too large"));
            }
        }

        if self.payment_method.trim().is_empty() {
            problems.push("payment_method is required".to_string());
        }
        problems.extend(self.shipping_address.validate("shipping_address"));
        problems.extend(self.billing_address.validate("billing_address"));

        if problems.is_empty() {
            Ok(())
        } else {
            Err(IntakeError::Validation(problems))
        }
    }

    /// Notes with surrounding whitespace removed; blank notes become `None`.
    pub fn trimmed_notes(&self) -> Option<String> {
        self.notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

/// What the caller gets back for a created order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub order_id: AggregateId,
    pub total: Money,
    pub status: OrderStatus,
}
