//! Order commands.

use common::{AggregateId, UserId};

use crate::command::Command;
use crate::pricing::{Channel, OrderTotals};

use super::{Address, LineItem, Order, PaymentStatus};

/// Everything needed to place an order, already priced and reserved.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub channel: Channel,
    pub items: Vec<LineItem>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: String,
    pub totals: OrderTotals,
    pub notes: Option<String>,
}

/// Command to persist a newly assembled order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,
    pub draft: OrderDraft,
}

impl PlaceOrder {
    pub fn new(order_id: AggregateId, draft: OrderDraft) -> Self {
        Self { order_id, draft }
    }

    /// Creates a PlaceOrder command with a generated order ID.
    pub fn with_new_id(draft: OrderDraft) -> Self {
        Self::new(AggregateId::new(), draft)
    }
}

impl Command for PlaceOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to set an order's status.
///
/// `target` is the raw requested value; it is parsed when the command runs so
/// unknown names surface as `InvalidStatus`.
#[derive(Debug, Clone)]
pub struct TransitionStatus {
    pub order_id: AggregateId,
    pub target: String,
}

impl TransitionStatus {
    pub fn new(order_id: AggregateId, target: impl Into<String>) -> Self {
        Self {
            order_id,
            target: target.into(),
        }
    }
}

impl Command for TransitionStatus {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command issued by payment collaborators.
#[derive(Debug, Clone)]
pub struct RecordPaymentStatus {
    pub order_id: AggregateId,
    pub status: PaymentStatus,
}

impl RecordPaymentStatus {
    pub fn new(order_id: AggregateId, status: PaymentStatus) -> Self {
        Self { order_id, status }
    }
}

impl Command for RecordPaymentStatus {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
