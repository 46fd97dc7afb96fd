//! Order lifecycle: status changes on persisted orders.

use common::AggregateId;
use domain::{Order, OrderEvent, OrderService, Principal, TransitionStatus};
use event_store::EventStore;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::reservation::Inventory;

/// Applies administrator status changes and returns stock for orders
/// cancelled before fulfillment.
pub struct OrderLifecycle<S: EventStore, C: Catalog + Clone + 'static> {
    order_service: OrderService<S>,
    inventory: Inventory<C>,
}

impl<S, C> OrderLifecycle<S, C>
where
    S: EventStore + Clone,
    C: Catalog + Clone + 'static,
{
    pub fn new(store: S, inventory: Inventory<C>) -> Self {
        Self {
            order_service: OrderService::new(store),
            inventory,
        }
    }

    /// Sets an order's status.
    ///
    /// When the change releases the order's inventory, every line is put
    /// back into stock, even if the caller is cancelled part way. A line
    /// that cannot be restocked is recorded for reconciliation; the status
    /// change itself stands.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn transition(
        &self,
        actor: &Principal,
        order_id: AggregateId,
        target: &str,
    ) -> Result<Order> {
        let result = self
            .order_service
            .transition_status(actor, TransitionStatus::new(order_id, target))
            .await?;

        let released = result
            .events
            .iter()
            .any(|e| matches!(e, OrderEvent::InventoryReleased(_)));

        if released {
            let restocked = self
                .inventory
                .restock_order(result.aggregate.items().to_vec(), order_id)
                .await;
            tracing::info!(
                %order_id,
                restocked,
                lines = result.aggregate.items().len(),
                "cancelled order restocked"
            );
        }

        tracing::info!(%order_id, status = %result.aggregate.status(), "order status changed");
        Ok(result.aggregate)
    }

    /// Loads an order for its owner or an administrator.
    pub async fn get_order(&self, principal: &Principal, order_id: AggregateId) -> Result<Order> {
        Ok(self.order_service.get_order_for(principal, order_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::error::IntakeError;
    use crate::reconciliation::{ReconciliationLog, ReconciliationReason};
    use common::UserId;
    use domain::{
        Address, Channel, DomainError, LineItem, Money, OrderDraft, OrderStatus, PaymentStatus,
        PlaceOrder, PricingPolicy, ProductId, ProductSnapshot, Role,
    };
    use event_store::InMemoryEventStore;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        lifecycle: OrderLifecycle<InMemoryEventStore, InMemoryCatalog>,
        catalog: InMemoryCatalog,
        reconciliation: ReconciliationLog,
        order_id: AggregateId,
        owner: UserId,
    }

    // The order holds 3 units; the catalog has 7 left.
    async fn fixture() -> Fixture {
        let store = InMemoryEventStore::new();
        let catalog = InMemoryCatalog::with_products([ProductSnapshot {
            id: ProductId::new("lamp"),
            name: "Desk lamp".to_string(),
            sku: "LMP-1".to_string(),
            image: None,
            base_price: Money::from_cents(4_000),
            b2b_price: Money::from_cents(3_500),
            b2b_minimum_order: 10,
            stock: 7,
        }])
        .await;
        let reconciliation = ReconciliationLog::new();
        let inventory = Inventory::new(catalog.clone(), reconciliation.clone());

        let owner = UserId::new();
        let items = vec![LineItem {
            product_id: ProductId::new("lamp"),
            name: "Desk lamp".to_string(),
            sku: "LMP-1".to_string(),
            image: None,
            quantity: 3,
            unit_price: Money::from_cents(4_000),
        }];
        let subtotal = items.iter().map(LineItem::line_total).sum();
        let cmd = PlaceOrder::with_new_id(OrderDraft {
            user_id: owner,
            channel: Channel::B2c,
            items,
            shipping_address: Address::default(),
            billing_address: Address::default(),
            payment_method: "card".to_string(),
            totals: PricingPolicy::default().totals(Channel::B2c, subtotal),
            notes: None,
        });
        let order_id = cmd.order_id;
        OrderService::new(store.clone()).place_order(cmd).await.unwrap();

        Fixture {
            lifecycle: OrderLifecycle::new(store, inventory),
            catalog,
            reconciliation,
            order_id,
            owner,
        }
    }

    fn admin() -> Principal {
        Principal::new(UserId::new(), Role::Admin)
    }

    async fn stock(f: &Fixture) -> Option<u32> {
        f.catalog.stock_of(&ProductId::new("lamp")).await
    }

    #[tokio::test]
    async fn test_cancel_pending_order_restocks() {
        let f = fixture().await;

        let order = f
            .lifecycle
            .transition(&admin(), f.order_id, "cancelled")
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.inventory_released());
        assert_eq!(stock(&f).await, Some(10));
    }

    #[tokio::test]
    async fn test_restock_happens_once_across_reassignments() {
        let f = fixture().await;
        let admin = admin();

        for target in ["cancelled", "pending", "cancelled", "processing", "cancelled"] {
            f.lifecycle
                .transition(&admin, f.order_id, target)
                .await
                .unwrap();
        }

        assert_eq!(stock(&f).await, Some(10));
    }

    #[tokio::test]
    async fn test_cancel_after_shipping_does_not_restock() {
        let f = fixture().await;
        let admin = admin();

        f.lifecycle
            .transition(&admin, f.order_id, "shipped")
            .await
            .unwrap();
        f.lifecycle
            .transition(&admin, f.order_id, "cancelled")
            .await
            .unwrap();

        assert_eq!(stock(&f).await, Some(7));
    }

    #[tokio::test]
    async fn test_failed_restock_is_recorded_and_status_stands() {
        let f = fixture().await;
        f.catalog.set_fail_increments(true);

        let order = f
            .lifecycle
            .transition(&admin(), f.order_id, "cancelled")
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Cancelled);
        let entries = f.reconciliation.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, ReconciliationReason::RestockFailed);
        assert_eq!(entries[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_aborted_cancel_still_restocks() {
        let f = fixture().await;
        f.catalog.set_increment_delay(Duration::from_millis(200));
        let lifecycle = Arc::new(f.lifecycle);
        let order_id = f.order_id;

        let task = tokio::spawn({
            let lifecycle = Arc::clone(&lifecycle);
            async move { lifecycle.transition(&admin(), order_id, "cancelled").await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let order = lifecycle.get_order(&admin(), order_id).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(
            f.catalog.stock_of(&ProductId::new("lamp")).await,
            Some(10)
        );
        assert!(f.reconciliation.is_empty());
    }

    #[tokio::test]
    async fn test_transition_keeps_payment_status_and_bumps_updated_at() {
        let f = fixture().await;
        let before = f
            .lifecycle
            .get_order(&admin(), f.order_id)
            .await
            .unwrap()
            .updated_at();

        let order = f
            .lifecycle
            .transition(&admin(), f.order_id, "pending")
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert!(order.updated_at() >= before);
    }

    #[tokio::test]
    async fn test_rejections() {
        let f = fixture().await;
        let owner = Principal::new(f.owner, Role::B2cCustomer);

        let forbidden = f
            .lifecycle
            .transition(&owner, f.order_id, "cancelled")
            .await
            .unwrap_err();
        assert!(matches!(
            forbidden,
            IntakeError::Domain(DomainError::Forbidden { .. })
        ));

        let invalid = f
            .lifecycle
            .transition(&admin(), f.order_id, "Lost")
            .await
            .unwrap_err();
        assert_eq!(invalid.kind(), "invalid_status");

        let missing = f
            .lifecycle
            .transition(&admin(), AggregateId::new(), "shipped")
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), "order_not_found");
        assert_eq!(stock(&f).await, Some(7));
    }

    #[tokio::test]
    async fn test_get_order_access() {
        let f = fixture().await;
        let owner = Principal::new(f.owner, Role::B2cCustomer);
        let stranger = Principal::new(UserId::new(), Role::B2bCustomer);

        assert!(f.lifecycle.get_order(&owner, f.order_id).await.is_ok());
        assert!(f.lifecycle.get_order(&admin(), f.order_id).await.is_ok());
        assert_eq!(
            f.lifecycle
                .get_order(&stranger, f.order_id)
                .await
                .unwrap_err()
                .kind(),
            "forbidden"
        );
    }
}
