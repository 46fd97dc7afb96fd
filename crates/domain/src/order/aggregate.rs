//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::pricing::{Channel, OrderTotals};

use super::{
    Address, LineItem, Money, OrderDraft, OrderError, OrderEvent, OrderStatus, PaymentStatus,
    events::OrderPlacedData,
};

/// Order aggregate root.
///
/// Created once by `OrderPlaced` with its items, prices and totals frozen.
/// Afterwards only the status, payment status and inventory flag change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    user_id: Option<UserId>,
    channel: Channel,
    items: Vec<LineItem>,
    shipping_address: Address,
    billing_address: Address,
    payment_method: String,
    totals: OrderTotals,
    notes: Option<String>,
    status: OrderStatus,
    payment_status: PaymentStatus,

    /// Set once the order's stock has been returned to the catalog.
    inventory_released: bool,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::StatusChanged(data) => {
                self.status = data.to;
                self.updated_at = data.changed_at;
            }
            OrderEvent::PaymentStatusRecorded(data) => {
                self.payment_status = data.to;
                self.updated_at = data.recorded_at;
            }
            OrderEvent::InventoryReleased(_) => {
                self.inventory_released = true;
            }
        }
    }
}

// Query methods
impl Order {
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn inventory_released(&self) -> bool {
        self.inventory_released
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Command methods (return events)
impl Order {
    /// Places a new order from an assembled draft.
    pub fn place(
        &self,
        order_id: AggregateId,
        draft: OrderDraft,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }

        if draft.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        if let Some(item) = draft.items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                sku: item.sku.clone(),
            });
        }

        let subtotal: Money = draft.items.iter().map(LineItem::line_total).sum();
        if subtotal != draft.totals.subtotal || !draft.totals.is_consistent() {
            return Err(OrderError::InconsistentTotals);
        }

        Ok(vec![OrderEvent::order_placed(order_id, draft)])
    }

    /// Sets the status to `target`.
    ///
    /// Cancelling an order that has not shipped also releases its inventory,
    /// unless that already happened earlier in the order's life.
    pub fn transition(&self, target: OrderStatus) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }

        let mut events = vec![OrderEvent::status_changed(self.status, target)];
        if self.releases_inventory_on(target) {
            events.push(OrderEvent::inventory_released());
        }
        Ok(events)
    }

    pub fn record_payment_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }

        Ok(vec![OrderEvent::payment_status_recorded(
            self.payment_status,
            status,
        )])
    }

    fn releases_inventory_on(&self, target: OrderStatus) -> bool {
        target == OrderStatus::Cancelled
            && self.status.is_before_fulfillment()
            && !self.inventory_released
    }
}

// Apply event helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.user_id = Some(data.user_id);
        self.channel = data.channel;
        self.items = data.items;
        self.shipping_address = data.shipping_address;
        self.billing_address = data.billing_address;
        self.payment_method = data.payment_method;
        self.totals = data.totals;
        self.notes = data.notes;
        self.status = OrderStatus::Pending;
        self.payment_status = PaymentStatus::Pending;
        self.created_at = data.placed_at;
        self.updated_at = data.placed_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductId;
    use crate::pricing::PricingPolicy;

    fn draft() -> OrderDraft {
        let items = vec![LineItem {
            product_id: ProductId::new("p-1"),
            name: "Widget".to_string(),
            sku: "W-1".to_string(),
            image: None,
            quantity: 2,
            unit_price: Money::from_cents(1500),
        }];
        let subtotal = items.iter().map(LineItem::line_total).sum();
        OrderDraft {
            user_id: UserId::new(),
            channel: Channel::B2c,
            items,
            shipping_address: Address::default(),
            billing_address: Address::default(),
            payment_method: "card".to_string(),
            totals: PricingPolicy::default().totals(Channel::B2c, subtotal),
            notes: None,
        }
    }

    fn placed() -> Order {
        let mut order = Order::default();
        let events = order.place(AggregateId::new(), draft()).unwrap();
        order.apply_events(events);
        order
    }

    #[test]
    fn test_place_order() {
        let draft = draft();
        let user = draft.user_id;
        let order = {
            let mut order = Order::default();
            order.apply_events(order.place(AggregateId::new(), draft).unwrap());
            order
        };

        assert!(order.id().is_some());
        assert!(order.is_owned_by(user));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.total(), Money::from_cents(3_800));
        assert_eq!(order.created_at(), order.updated_at());
    }

    #[test]
    fn test_cannot_place_twice() {
        let order = placed();
        assert!(matches!(
            order.place(AggregateId::new(), draft()),
            Err(OrderError::AlreadyPlaced)
        ));
    }

    #[test]
    fn test_place_requires_items() {
        let mut draft = draft();
        draft.items.clear();
        draft.totals = OrderTotals::default();
        assert!(matches!(
            Order::default().place(AggregateId::new(), draft),
            Err(OrderError::NoItems)
        ));
    }

    #[test]
    fn test_place_rejects_totals_that_do_not_match_items() {
        let mut draft = draft();
        draft.items[0].quantity = 3;
        assert!(matches!(
            Order::default().place(AggregateId::new(), draft),
            Err(OrderError::InconsistentTotals)
        ));
    }

    #[test]
    fn test_any_status_can_follow_any_status() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let mut order = placed();
                order.status = from;
                let events = order.transition(to).unwrap();
                order.apply_events(events);
                assert_eq!(order.status(), to);
            }
        }
    }

    #[test]
    fn test_transition_bumps_updated_at_only() {
        let mut order = placed();
        let created = order.created_at();
        let events = order.transition(OrderStatus::Shipped).unwrap();
        let OrderEvent::StatusChanged(ref changed) = events[0] else {
            panic!("expected StatusChanged");
        };
        let changed_at = changed.changed_at;

        order.apply_events(events);

        assert_eq!(order.updated_at(), changed_at);
        assert_eq!(order.created_at(), created);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_cancel_before_fulfillment_releases_inventory_once() {
        let mut order = placed();

        let events = order.transition(OrderStatus::Cancelled).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], OrderEvent::InventoryReleased(_)));
        order.apply_events(events);
        assert!(order.inventory_released());

        order.apply_events(order.transition(OrderStatus::Pending).unwrap());
        let events = order.transition(OrderStatus::Cancelled).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_cancel_after_shipping_keeps_inventory() {
        let mut order = placed();
        order.apply_events(order.transition(OrderStatus::Shipped).unwrap());

        let events = order.transition(OrderStatus::Cancelled).unwrap();

        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_unplaced_order_rejects_commands() {
        let order = Order::default();
        assert!(matches!(
            order.transition(OrderStatus::Shipped),
            Err(OrderError::NotPlaced)
        ));
        assert!(matches!(
            order.record_payment_status(PaymentStatus::Paid),
            Err(OrderError::NotPlaced)
        ));
    }

    #[test]
    fn test_payment_status_is_independent_of_status() {
        let mut order = placed();
        order.apply_events(order.record_payment_status(PaymentStatus::Paid).unwrap());

        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(order.status(), OrderStatus::Pending);
    }
}
