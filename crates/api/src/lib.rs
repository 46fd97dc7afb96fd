//! HTTP surface for order intake.
//!
//! Exposes order creation, lookup, listing and administrator status changes,
//! with structured logging (tracing) and Prometheus metrics.
//!
//! Callers are identified by the `x-user-id` and `x-user-role` headers set by
//! the authentication layer in front of this service.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::EventStore;
use intake::{Catalog, Inventory, OrderAssembler, OrderLifecycle, ReconciliationLog};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{CustomerOrdersView, Projection, ProjectionProcessor};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C>(state: Arc<AppState<S, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: EventStore + Clone + 'static,
    C: Catalog + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create::<S, C>).get(routes::orders::list::<S, C>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S, C>))
        .route(
            "/admin/orders/{id}/status",
            put(routes::orders::transition::<S, C>),
        )
        .route(
            "/admin/reconciliation",
            get(routes::orders::reconciliation::<S, C>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the intake services, read model and projection processor over the
/// given event store and catalog.
pub fn create_state<S, C>(config: &Config, event_store: S, catalog: C) -> Arc<AppState<S, C>>
where
    S: EventStore + Clone + 'static,
    C: Catalog + Clone + 'static,
{
    let reconciliation = ReconciliationLog::new();
    let inventory =
        Inventory::new(catalog, reconciliation.clone()).with_timeout(config.catalog_timeout());

    let assembler = OrderAssembler::new(
        event_store.clone(),
        inventory.clone(),
        config.pricing_policy(),
    );
    let lifecycle = OrderLifecycle::new(event_store.clone(), inventory);

    let customer_orders = CustomerOrdersView::new();
    let mut processor = ProjectionProcessor::new(event_store);
    processor.register(Box::new(customer_orders.clone()) as Box<dyn Projection>);

    Arc::new(AppState {
        assembler,
        lifecycle,
        customer_orders,
        projection_processor: Arc::new(processor),
        reconciliation,
    })
}

/// Creates application state with the default configuration.
pub fn create_default_state<S, C>(event_store: S, catalog: C) -> Arc<AppState<S, C>>
where
    S: EventStore + Clone + 'static,
    C: Catalog + Clone + 'static,
{
    create_state(&Config::default(), event_store, catalog)
}
