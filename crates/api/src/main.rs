//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use domain::{DomainConfig, InMemoryWarehouseDirectory};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use orchestrator::with_store_timeout;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_store(
    config: &Config,
    domain: &DomainConfig,
) -> Result<Arc<dyn EventStore>, BoxError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("DATABASE_URL not set, using the in-memory event store");
        return Ok(with_store_timeout(InMemoryEventStore::new(), domain));
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await?;
    let store = PostgresEventStore::new(pool);
    store.run_migrations().await?;
    tracing::info!("connected to PostgreSQL event store");
    Ok(with_store_timeout(store, domain))
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(%err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to install SIGTERM handler");
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

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env()?;
    let domain_config = DomainConfig::from_env();
    init_tracing(&config);

    let metrics_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let store = open_store(&config, &domain_config).await?;
    let directory = InMemoryWarehouseDirectory::with_entries(config.warehouses.iter().cloned());
    tracing::info!(
        warehouses = config.warehouses.len(),
        precision = domain_config.currency_precision,
        "warehouse directory seeded"
    );

    let state = api::create_default_state(store, directory, domain_config);

    // Replay whatever the store already holds before serving reads.
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
