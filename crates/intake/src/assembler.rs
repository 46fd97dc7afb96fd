//! Order assembler: validates, prices and reserves a cart, then persists it.

use std::time::Instant;

use common::AggregateId;
use domain::{
    Channel, LineItem, Money, OrderDraft, OrderService, OrderTotals, PlaceOrder, PricingError,
    PricingPolicy, Principal, resolve_price,
};
use event_store::EventStore;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::request::{CreateOrderRequest, OrderItemRequest, OrderReceipt};
use crate::reservation::{Inventory, Reservation, ReservationLedger};

/// Turns order requests into persisted orders.
///
/// Items are handled one at a time in request order. The first failing item
/// stops the request and every reservation made before it is released, so
/// either the whole order is persisted or stock is back where it started.
pub struct OrderAssembler<S, C>
where
    S: EventStore,
    C: Catalog + Clone + 'static,
{
    order_service: OrderService<S>,
    inventory: Inventory<C>,
    pricing: PricingPolicy,
}

impl<S, C> OrderAssembler<S, C>
where
    S: EventStore + Clone,
    C: Catalog + Clone + 'static,
{
    pub fn new(store: S, inventory: Inventory<C>, pricing: PricingPolicy) -> Self {
        Self {
            order_service: OrderService::new(store),
            inventory,
            pricing,
        }
    }

    pub fn inventory(&self) -> &Inventory<C> {
        &self.inventory
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    /// Creates an order for `principal`, priced in the principal's channel.
    #[tracing::instrument(
        skip(self, principal, request),
        fields(user_id = %principal.user_id, channel = %principal.channel(), items = request.items.len())
    )]
    pub async fn create_order(
        &self,
        principal: &Principal,
        request: CreateOrderRequest,
    ) -> Result<OrderReceipt> {
        let started = Instant::now();
        let channel = principal.channel();

        let result = self.assemble(principal, channel, request).await;

        metrics::histogram!("order_intake_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                metrics::counter!("orders_created_total", "channel" => channel.as_str())
                    .increment(1);
                tracing::info!(order_id = %receipt.order_id, total = %receipt.total, "order created");
            }
            Err(err) => {
                metrics::counter!("order_rejections_total", "reason" => err.kind()).increment(1);
                tracing::info!(reason = err.kind(), error = %err, "order rejected");
            }
        }

        result
    }

    async fn assemble(
        &self,
        principal: &Principal,
        channel: Channel,
        request: CreateOrderRequest,
    ) -> Result<OrderReceipt> {
        request.validate()?;

        let order_id = AggregateId::new();
        let mut ledger = self.inventory.ledger(order_id);
        let mut items = Vec::with_capacity(request.items.len());

        for item in &request.items {
            match self.reserve_line(channel, item, order_id).await {
                Ok((line, reservation)) => {
                    ledger.push(reservation);
                    items.push(line);
                }
                Err(err) => {
                    self.compensate(ledger).await;
                    return Err(err);
                }
            }
        }

        let totals = match self.order_totals(channel, &items) {
            Ok(totals) => totals,
            Err(err) => {
                self.compensate(ledger).await;
                return Err(err);
            }
        };
        let notes = request.trimmed_notes();
        let draft = OrderDraft {
            user_id: principal.user_id,
            channel,
            items,
            shipping_address: request.shipping_address,
            billing_address: request.billing_address,
            payment_method: request.payment_method.trim().to_string(),
            totals,
            notes,
        };

        match self
            .order_service
            .place_order(PlaceOrder::new(order_id, draft))
            .await
        {
            Ok(placed) => {
                ledger.commit();
                Ok(OrderReceipt {
                    order_id,
                    total: placed.aggregate.total(),
                    status: placed.aggregate.status(),
                })
            }
            Err(err) => {
                tracing::warn!(%order_id, error = %err, "persisting order failed");
                self.compensate(ledger).await;
                Err(err.into())
            }
        }
    }

    /// Looks up, prices and reserves one requested line.
    async fn reserve_line(
        &self,
        channel: Channel,
        item: &OrderItemRequest,
        order_id: AggregateId,
    ) -> Result<(LineItem, Reservation)> {
        // validate() has already bounded the quantity
        let quantity = u32::try_from(item.quantity).unwrap_or(0);

        let product = self.inventory.lookup(&item.product_id).await?;
        let quote = resolve_price(channel, &product, quantity)?;
        let reservation = self.inventory.reserve(&product, quantity, order_id).await?;

        Ok((
            LineItem::from_snapshot(&product, quantity, quote.unit_price),
            reservation,
        ))
    }

    fn order_totals(&self, channel: Channel, items: &[LineItem]) -> Result<OrderTotals> {
        let subtotal = items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.checked_add(item.line_total()))
            .ok_or(PricingError::TotalOutOfRange)?;
        Ok(self.pricing.checked_totals(channel, subtotal)?)
    }

    async fn compensate(&self, ledger: ReservationLedger<C>) {
        if ledger.is_empty() {
            return;
        }

        let order_id = ledger.order_id();
        let reserved = ledger.len();
        let released = ledger.release_all().await;
        metrics::counter!("stock_compensations_total").increment(released as u64);
        if released < reserved {
            tracing::error!(%order_id, reserved, released, "compensation incomplete");
        } else {
            tracing::info!(%order_id, released, "reservations released");
        }
    }
}
