//! HTTP handlers and the helpers they share.

pub mod cajas;
pub mod health;
pub mod lots;
pub mod metrics;
pub mod traspasos;
pub mod warehouses;

use axum::body::Bytes;
use axum::http::HeaderMap;
use common::{AggregateId, Money};
use domain::InMemoryWarehouseDirectory;
use orchestrator::DomainOrchestrator;
use projections::{ProjectionProcessor, TransferBoardView, WarehouseStockView};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::ApiError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: DomainOrchestrator,
    pub directory: InMemoryWarehouseDirectory,
    pub stock: WarehouseStockView,
    pub board: TransferBoardView,
    pub projection_processor: Arc<ProjectionProcessor>,
    /// Decimals used to read and render money.
    pub precision: u32,
}

impl AppState {
    /// Brings the read models up to date with the store.
    pub async fn catch_up(&self) -> Result<(), ApiError> {
        self.projection_processor.run_catch_up().await?;
        Ok(())
    }

    pub fn render(&self, amount: Money) -> String {
        amount.display(self.precision).to_string()
    }
}

pub(crate) fn parse_aggregate_id(raw: &str) -> Result<AggregateId, ApiError> {
    uuid::Uuid::parse_str(raw)
        .map(AggregateId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID: {e}")))
}

/// Reads the `Idempotency-Key` header, if present.
pub(crate) fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("Idempotency-Key must be visible ASCII".into()))?
        .trim();
    if key.is_empty() {
        return Err(ApiError::BadRequest("Idempotency-Key must not be blank".into()));
    }
    Ok(Some(key.to_string()))
}

/// JSON body that may be omitted entirely.
pub(crate) fn optional_json<T>(body: &Bytes) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid body: {e}")))
}

/// Money as sent by clients: a decimal string (`"100.50"`) or a JSON number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    pub fn parse(&self, precision: u32) -> Result<Money, ApiError> {
        let raw = match self {
            AmountInput::Text(text) => text.clone(),
            AmountInput::Number(number) => number.to_string(),
        };
        Money::parse(&raw, precision).map_err(|e| ApiError::BadRequest(e.to_string()))
    }
}
