//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::pricing::{Channel, OrderTotals};

use super::{Address, LineItem, OrderDraft, OrderStatus, PaymentStatus};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// A fully priced, stock-reserved order was accepted.
    OrderPlaced(OrderPlacedData),

    StatusChanged(StatusChangedData),

    PaymentStatusRecorded(PaymentStatusRecordedData),

    /// Stock held by the order was handed back to the catalog.
    InventoryReleased(InventoryReleasedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::StatusChanged(_) => "StatusChanged",
            OrderEvent::PaymentStatusRecorded(_) => "PaymentStatusRecorded",
            OrderEvent::InventoryReleased(_) => "InventoryReleased",
        }
    }
}

/// Data for OrderPlaced event. Carries the whole order as placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub channel: Channel,
    pub items: Vec<LineItem>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: String,
    pub totals: OrderTotals,
    #[serde(default)]
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusRecordedData {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReleasedData {
    pub released_at: DateTime<Utc>,
}

// Event construction helpers
impl OrderEvent {
    pub fn order_placed(order_id: AggregateId, draft: OrderDraft) -> Self {
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            user_id: draft.user_id,
            channel: draft.channel,
            items: draft.items,
            shipping_address: draft.shipping_address,
            billing_address: draft.billing_address,
            payment_method: draft.payment_method,
            totals: draft.totals,
            notes: draft.notes,
            placed_at: Utc::now(),
        })
    }

    pub fn status_changed(from: OrderStatus, to: OrderStatus) -> Self {
        OrderEvent::StatusChanged(StatusChangedData {
            from,
            to,
            changed_at: Utc::now(),
        })
    }

    pub fn payment_status_recorded(from: PaymentStatus, to: PaymentStatus) -> Self {
        OrderEvent::PaymentStatusRecorded(PaymentStatusRecordedData {
            from,
            to,
            recorded_at: Utc::now(),
        })
    }

    pub fn inventory_released() -> Self {
        OrderEvent::InventoryReleased(InventoryReleasedData {
            released_at: Utc::now(),
        })
    }
}
