//! Customer orders read model: each user's orders, most recent first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{Channel, Money, OrderEvent, OrderStatus, PaymentStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Listing entry for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub channel: Channel,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub item_count: usize,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct CustomerOrdersState {
    orders: HashMap<AggregateId, OrderSummary>,
    by_user: HashMap<UserId, Vec<AggregateId>>,
    position: ProjectionPosition,
}

/// Read model answering "which orders does this user have".
#[derive(Clone, Default)]
pub struct CustomerOrdersView {
    state: Arc<RwLock<CustomerOrdersState>>,
}

impl CustomerOrdersView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders owned by `user_id`, newest first.
    pub async fn list_for_user(&self, user_id: UserId) -> Vec<OrderSummary> {
        let state = self.state.read().await;
        let mut orders: Vec<OrderSummary> = state
            .by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .rev()
            .filter_map(|id| state.orders.get(id).cloned())
            .collect();
        // Stable, so orders placed in the same instant stay in reverse log order.
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    pub async fn get(&self, order_id: AggregateId) -> Option<OrderSummary> {
        self.state.read().await.orders.get(&order_id).cloned()
    }
}

#[async_trait]
impl Projection for CustomerOrdersView {
    fn name(&self) -> &'static str {
        "CustomerOrdersView"
    }

    async fn handle(&self, position: u64, event: &EventEnvelope) -> Result<()> {
        let order_event = if event.aggregate_type == "Order" {
            Some(serde_json::from_value::<OrderEvent>(event.payload.clone())?)
        } else {
            None
        };

        let order_id = event.aggregate_id;
        let mut state = self.state.write().await;

        match order_event {
            Some(OrderEvent::OrderPlaced(data)) => {
                let summary = OrderSummary {
                    order_id,
                    user_id: data.user_id,
                    channel: data.channel,
                    status: OrderStatus::Pending,
                    payment_status: PaymentStatus::Pending,
                    item_count: data.items.len(),
                    total: data.totals.total,
                    created_at: data.placed_at,
                    updated_at: data.placed_at,
                };
                state.by_user.entry(data.user_id).or_default().push(order_id);
                state.orders.insert(order_id, summary);
            }
            Some(OrderEvent::StatusChanged(data)) => {
                if let Some(summary) = state.orders.get_mut(&order_id) {
                    summary.status = data.to;
                    summary.updated_at = data.changed_at;
                } else {
                    tracing::warn!(%order_id, "status change for unknown order");
                }
            }
            Some(OrderEvent::PaymentStatusRecorded(data)) => {
                if let Some(summary) = state.orders.get_mut(&order_id) {
                    summary.payment_status = data.to;
                    summary.updated_at = data.recorded_at;
                }
            }
            Some(OrderEvent::InventoryReleased(_)) | None => {}
        }

        state.position = state.position.advance_to(position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = CustomerOrdersState::default();
        Ok(())
    }
}

impl ReadModel for CustomerOrdersView {
    fn name(&self) -> &'static str {
        "CustomerOrdersView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.orders.len()).unwrap_or(0)
    }
}
