//! Order intake, lookup, listing and admin status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{Address, Channel, LineItem, Order, OrderStatus, PaymentStatus, ProductId};
use event_store::EventStore;
use intake::{
    Catalog, CreateOrderRequest, OrderAssembler, OrderLifecycle, ReconciliationEntry,
    ReconciliationLog,
};
use projections::{CustomerOrdersView, OrderSummary, ProjectionProcessor};
use serde::{Deserialize, Serialize};

use crate::auth::Authenticated;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, C>
where
    S: EventStore,
    C: Catalog + Clone + 'static,
{
    pub assembler: OrderAssembler<S, C>,
    pub lifecycle: OrderLifecycle<S, C>,
    pub customer_orders: CustomerOrdersView,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
    pub reconciliation: ReconciliationLog,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: AggregateId,
    pub total_cents: i64,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<&LineItem> for LineItemResponse {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            name: item.name.clone(),
            sku: item.sku.clone(),
            image: item.image.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            line_total_cents: item.line_total().cents(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: AggregateId,
    pub user_id: Option<UserId>,
    pub channel: Channel,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub items: Vec<LineItemResponse>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    fn new(id: AggregateId, order: &Order) -> Self {
        let totals = order.totals();
        Self {
            id,
            user_id: order.user_id(),
            channel: order.channel(),
            status: order.status(),
            payment_status: order.payment_status(),
            payment_method: order.payment_method().to_string(),
            items: order.items().iter().map(LineItemResponse::from).collect(),
            shipping_address: order.shipping_address().clone(),
            billing_address: order.billing_address().clone(),
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            shipping_cents: totals.shipping.cents(),
            discount_cents: totals.discount.cents(),
            total_cents: totals.total.cents(),
            notes: order.notes().map(str::to_string),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderSummaryResponse {
    pub order_id: AggregateId,
    pub channel: Channel,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub item_count: usize,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderSummary> for OrderSummaryResponse {
    fn from(summary: OrderSummary) -> Self {
        Self {
            order_id: summary.order_id,
            channel: summary.channel,
            status: summary.status,
            payment_status: summary.payment_status,
            item_count: summary.item_count,
            total_cents: summary.total.cents(),
            created_at: summary.created_at,
            updated_at: summary.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders: price, reserve and persist a new order.
#[tracing::instrument(skip(state, payload), fields(user_id = %principal.user_id))]
pub async fn create<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Authenticated(principal): Authenticated,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError>
where
    S: EventStore + Clone + 'static,
    C: Catalog + Clone + 'static,
{
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let receipt = state.assembler.create_order(&principal, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            order_id: receipt.order_id,
            total_cents: receipt.total.cents(),
            status: receipt.status,
        }),
    ))
}

/// GET /orders: the caller's orders, newest first.
#[tracing::instrument(skip(state), fields(user_id = %principal.user_id))]
pub async fn list<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Authenticated(principal): Authenticated,
) -> Result<Json<Vec<OrderSummaryResponse>>, ApiError>
where
    S: EventStore + Clone + 'static,
    C: Catalog + Clone + 'static,
{
    // Run catch-up to ensure the read model includes latest events
    state.projection_processor.run_catch_up().await?;

    let orders = state
        .customer_orders
        .list_for_user(principal.user_id)
        .await
        .into_iter()
        .map(OrderSummaryResponse::from)
        .collect();

    Ok(Json(orders))
}

/// GET /orders/{id}: full order for its owner or an administrator.
#[tracing::instrument(skip(state), fields(user_id = %principal.user_id))]
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    C: Catalog + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.lifecycle.get_order(&principal, order_id).await?;
    Ok(Json(OrderResponse::new(order_id, &order)))
}

/// PUT /admin/orders/{id}/status: set an order's status.
#[tracing::instrument(skip(state, payload), fields(user_id = %principal.user_id))]
pub async fn transition<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<String>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    C: Catalog + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let order = state
        .lifecycle
        .transition(&principal, order_id, &request.status)
        .await?;

    Ok(Json(OrderResponse::new(order_id, &order)))
}

/// GET /admin/reconciliation: stock changes that need an operator.
#[tracing::instrument(skip(state), fields(user_id = %principal.user_id))]
pub async fn reconciliation<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Authenticated(principal): Authenticated,
) -> Result<Json<Vec<ReconciliationEntry>>, ApiError>
where
    S: EventStore + Clone + 'static,
    C: Catalog + Clone + 'static,
{
    if !principal.is_admin() {
        return Err(domain::DomainError::Forbidden {
            user_id: principal.user_id,
            action: "view reconciliation entries",
        }
        .into());
    }
    Ok(Json(state.reconciliation.entries()))
}

fn parse_order_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}
