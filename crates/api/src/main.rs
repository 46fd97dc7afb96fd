//! API server entry point.

use std::error::Error;
use std::sync::Arc;

use api::config::Config;
use api::routes::orders::AppState;
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use intake::{Catalog, InMemoryCatalog, PostgresCatalog};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S, C>(
    config: &Config,
    state: Arc<AppState<S, C>>,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError>
where
    S: EventStore + Clone + 'static,
    C: Catalog + Clone + 'static,
{
    // Replay existing events into the read model
    state.projection_processor.run_catch_up().await?;

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let seed = match &config.catalog_seed_file {
        Some(path) => {
            let products = intake::load_seed_file(path).await?;
            tracing::info!(path = %path, products = products.len(), "loaded catalog seed");
            products
        }
        None => Vec::new(),
    };

    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let event_store = PostgresEventStore::new(pool.clone());
            event_store.run_migrations().await?;

            let catalog = PostgresCatalog::new(pool);
            for product in &seed {
                catalog.upsert_product(product).await?;
            }

            tracing::info!("using PostgreSQL event store and catalog");
            let state = api::create_state(&config, event_store, catalog);
            serve(&config, state, metrics_handle).await
        }
        None => {
            let catalog = InMemoryCatalog::with_products(seed).await;
            tracing::warn!("DATABASE_URL not set, orders and stock are kept in memory");
            let state = api::create_state(&config, InMemoryEventStore::new(), catalog);
            serve(&config, state, metrics_handle).await
        }
    }
}
