//! HTTP API over the cajas, stock lots and traspasos of the branch network.
//!
//! Every request goes through the [`DomainOrchestrator`]; list endpoints read
//! the projections after bringing them up to date. Structured logging comes
//! from `tracing` and metrics are scraped from `/metrics`.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{DomainConfig, InMemoryWarehouseDirectory};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{DomainOrchestrator, EventPublisher, TracingPublisher};
use projections::{ProjectionProcessor, TransferBoardView, WarehouseStockView};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/cajas",
            post(routes::cajas::open).get(routes::cajas::find_open),
        )
        .route("/cajas/{id}", get(routes::cajas::summary))
        .route("/cajas/{id}/balance", get(routes::cajas::balance))
        .route(
            "/cajas/{id}/entries",
            get(routes::cajas::entries).post(routes::cajas::post_entry),
        )
        .route("/cajas/{id}/close", post(routes::cajas::close))
        .route("/lots/{warehouse}/{article}", get(routes::lots::get))
        .route(
            "/lots/{warehouse}/{article}/debit",
            post(routes::lots::debit),
        )
        .route(
            "/lots/{warehouse}/{article}/credit",
            post(routes::lots::credit),
        )
        .route("/warehouses/{id}", put(routes::warehouses::register))
        .route("/warehouses/{id}/stock", get(routes::warehouses::stock))
        .route(
            "/traspasos",
            post(routes::traspasos::request).get(routes::traspasos::board),
        )
        .route("/traspasos/{id}", get(routes::traspasos::get))
        .route("/traspasos/{id}/approve", post(routes::traspasos::approve))
        .route("/traspasos/{id}/receive", post(routes::traspasos::receive))
        .route("/traspasos/{id}/reject", post(routes::traspasos::reject))
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

/// Wires the orchestrator, the read models and their processor around `store`.
pub fn create_state(
    store: Arc<dyn EventStore>,
    directory: InMemoryWarehouseDirectory,
    publisher: Arc<dyn EventPublisher>,
    config: DomainConfig,
) -> Arc<AppState> {
    let precision = config.currency_precision;
    let orchestrator = DomainOrchestrator::new(
        store.clone(),
        Arc::new(directory.clone()),
        publisher,
        config,
    );

    let stock = WarehouseStockView::new();
    let board = TransferBoardView::new();
    let processor = ProjectionProcessor::new(store)
        .with(Arc::new(stock.clone()))
        .with(Arc::new(board.clone()));

    Arc::new(AppState {
        orchestrator,
        directory,
        stock,
        board,
        projection_processor: Arc::new(processor),
        precision,
    })
}

/// Same as [`create_state`], announcing changes through the log.
pub fn create_default_state(
    store: Arc<dyn EventStore>,
    directory: InMemoryWarehouseDirectory,
    config: DomainConfig,
) -> Arc<AppState> {
    create_state(store, directory, Arc::new(TracingPublisher), config)
}
