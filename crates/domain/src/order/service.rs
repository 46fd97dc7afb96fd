//! Order service providing a simplified API for order operations.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::principal::Principal;

use super::{Order, OrderError, OrderStatus, PlaceOrder, RecordPaymentStatus, TransitionStatus};

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}

/// Service for managing orders.
///
/// Wraps the command handler and adds the access rules that apply to
/// reading and changing orders.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Persists a newly assembled order. Fails with a concurrency conflict
    /// if the order id is already taken.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<CommandResult<Order>, DomainError> {
        let order_id = cmd.order_id;
        let user_id = cmd.draft.user_id;
        let draft = cmd.draft;

        self.handler
            .execute_as(order_id, user_id, |order| order.place(order_id, draft))
            .await
    }

    /// Sets an order's status. Only administrators may do this.
    #[tracing::instrument(skip(self))]
    pub async fn transition_status(
        &self,
        actor: &Principal,
        cmd: TransitionStatus,
    ) -> Result<CommandResult<Order>, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden {
                user_id: actor.user_id,
                action: "change order status",
            });
        }

        let target: OrderStatus = cmd.target.parse()?;
        let order_id = cmd.order_id;

        self.handler
            .execute_as(order_id, actor.user_id, |order| order.transition(target))
            .await
            .map_err(|e| not_placed_as_not_found(e, order_id))
    }

    /// Records a payment status reported by a payment collaborator.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment_status(
        &self,
        cmd: RecordPaymentStatus,
    ) -> Result<CommandResult<Order>, DomainError> {
        let order_id = cmd.order_id;
        let status = cmd.status;

        self.handler
            .execute(order_id, |order| order.record_payment_status(status))
            .await
            .map_err(|e| not_placed_as_not_found(e, order_id))
    }

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    /// Loads an order on behalf of `principal`, who must own it or be an
    /// administrator.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_for(
        &self,
        principal: &Principal,
        order_id: AggregateId,
    ) -> Result<Order, DomainError> {
        let order = self
            .get_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;

        if !principal.is_admin() && !order.is_owned_by(principal.user_id) {
            return Err(DomainError::Forbidden {
                user_id: principal.user_id,
                action: "view this order",
            });
        }

        Ok(order)
    }
}

fn not_placed_as_not_found(err: DomainError, order_id: AggregateId) -> DomainError {
    match err {
        DomainError::Order(OrderError::NotPlaced) => DomainError::OrderNotFound(order_id),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::catalog::ProductId;
    use crate::order::{Address, LineItem, Money, OrderDraft, OrderEvent, PaymentStatus};
    use crate::pricing::{Channel, PricingPolicy};
    use crate::principal::Role;
    use common::UserId;
    use event_store::InMemoryEventStore;

    fn draft(user_id: UserId) -> OrderDraft {
        let items = vec![LineItem {
            product_id: ProductId::new("p-1"),
            name: "Widget".to_string(),
            sku: "W-1".to_string(),
            image: None,
            quantity: 4,
            unit_price: Money::from_cents(2_500),
        }];
        let subtotal = items.iter().map(LineItem::line_total).sum();
        OrderDraft {
            user_id,
            channel: Channel::B2c,
            items,
            shipping_address: Address::default(),
            billing_address: Address::default(),
            payment_method: "card".to_string(),
            totals: PricingPolicy::default().totals(Channel::B2c, subtotal),
            notes: Some("leave at the door".to_string()),
        }
    }

    async fn placed_order(service: &OrderService<InMemoryEventStore>, owner: UserId) -> AggregateId {
        let cmd = PlaceOrder::with_new_id(draft(owner));
        let order_id = cmd.order_id;
        service.place_order(cmd).await.unwrap();
        order_id
    }

    fn admin() -> Principal {
        Principal::new(UserId::new(), Role::Admin)
    }

    #[tokio::test]
    async fn test_place_order() {
        let service = OrderService::new(InMemoryEventStore::new());
        let owner = UserId::new();

        let cmd = PlaceOrder::with_new_id(draft(owner));
        let order_id = cmd.order_id;
        let result = service.place_order(cmd).await.unwrap();

        assert_eq!(result.aggregate.id(), Some(order_id));
        assert_eq!(result.aggregate.status(), OrderStatus::Pending);
        assert_eq!(result.aggregate.notes(), Some("leave at the door"));
        assert_eq!(result.events.len(), 1);
    }

    #[tokio::test]
    async fn test_same_order_id_cannot_be_placed_twice() {
        let service = OrderService::new(InMemoryEventStore::new());
        let owner = UserId::new();
        let order_id = placed_order(&service, owner).await;

        let result = service
            .place_order(PlaceOrder::new(order_id, draft(owner)))
            .await;

        assert!(matches!(result, Err(DomainError::Order(OrderError::AlreadyPlaced))));
    }

    #[tokio::test]
    async fn test_admin_transitions_status() {
        let service = OrderService::new(InMemoryEventStore::new());
        let order_id = placed_order(&service, UserId::new()).await;

        let result = service
            .transition_status(&admin(), TransitionStatus::new(order_id, "shipped"))
            .await
            .unwrap();

        assert_eq!(result.aggregate.status(), OrderStatus::Shipped);
        assert_eq!(result.aggregate.payment_status(), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_non_admin_cannot_transition() {
        let service = OrderService::new(InMemoryEventStore::new());
        let owner = UserId::new();
        let order_id = placed_order(&service, owner).await;

        let result = service
            .transition_status(
                &Principal::new(owner, Role::B2bCustomer),
                TransitionStatus::new(order_id, "delivered"),
            )
            .await;

        assert!(matches!(result, Err(DomainError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_unknown_status_is_rejected() {
        let service = OrderService::new(InMemoryEventStore::new());
        let order_id = placed_order(&service, UserId::new()).await;

        let result = service
            .transition_status(&admin(), TransitionStatus::new(order_id, "lost"))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidStatus { ref value })) if value == "lost"
        ));
    }

    #[tokio::test]
    async fn test_transition_of_missing_order_is_not_found() {
        let service = OrderService::new(InMemoryEventStore::new());
        let missing = AggregateId::new();

        let result = service
            .transition_status(&admin(), TransitionStatus::new(missing, "shipped"))
            .await;

        assert!(matches!(result, Err(DomainError::OrderNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn test_cancel_records_inventory_release() {
        let service = OrderService::new(InMemoryEventStore::new());
        let order_id = placed_order(&service, UserId::new()).await;

        let result = service
            .transition_status(&admin(), TransitionStatus::new(order_id, "cancelled"))
            .await
            .unwrap();

        assert!(
            result
                .events
                .iter()
                .any(|e| matches!(e, OrderEvent::InventoryReleased(_)))
        );
        assert!(result.aggregate.inventory_released());
    }

    #[tokio::test]
    async fn test_record_payment_status() {
        let service = OrderService::new(InMemoryEventStore::new());
        let order_id = placed_order(&service, UserId::new()).await;

        let result = service
            .record_payment_status(RecordPaymentStatus::new(order_id, PaymentStatus::Paid))
            .await
            .unwrap();

        assert_eq!(result.aggregate.payment_status(), PaymentStatus::Paid);
        assert_eq!(result.aggregate.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_order_access_rules() {
        let service = OrderService::new(InMemoryEventStore::new());
        let owner = UserId::new();
        let order_id = placed_order(&service, owner).await;

        let as_owner = Principal::new(owner, Role::B2cCustomer);
        let stranger = Principal::new(UserId::new(), Role::B2cCustomer);

        assert!(service.get_order_for(&as_owner, order_id).await.is_ok());
        assert!(service.get_order_for(&admin(), order_id).await.is_ok());
        assert!(matches!(
            service.get_order_for(&stranger, order_id).await,
            Err(DomainError::Forbidden { .. })
        ));
        assert!(matches!(
            service.get_order_for(&as_owner, AggregateId::new()).await,
            Err(DomainError::OrderNotFound(_))
        ));
    }
}
