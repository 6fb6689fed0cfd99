//! Stock lot endpoints, keyed by warehouse and article.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use common::{ArticleId, Quantity, WarehouseId};
use domain::{CreditStock, DebitStock, StockLevel, StockReason};
use orchestrator::{DomainRequest, DomainResponse};
use serde::{Deserialize, Serialize};

use super::cajas::unexpected;
use super::{AppState, idempotency_key};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub quantity: Quantity,
    pub reason: StockReason,
    pub reference: Option<String>,
}

#[derive(Serialize)]
pub struct LotResponse {
    #[serde(flatten)]
    pub lot: StockLevel,
    pub replayed: bool,
}

fn lot_response(response: DomainResponse) -> Result<(StatusCode, Json<LotResponse>), ApiError> {
    match response {
        DomainResponse::Lot { lot, replayed } => {
            Ok((StatusCode::OK, Json(LotResponse { lot, replayed })))
        }
        other => Err(unexpected(other)),
    }
}

/// GET /lots/{warehouse}/{article} — an untouched lot reads as zero.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((warehouse, article)): Path<(String, String)>,
) -> Result<Json<LotResponse>, ApiError> {
    let request = DomainRequest::GetLot {
        warehouse: WarehouseId::new(warehouse),
        article: ArticleId::new(article),
    };
    let (_, body) = lot_response(state.orchestrator.handle(request).await?)?;
    Ok(body)
}

/// POST /lots/{warehouse}/{article}/debit
#[tracing::instrument(skip(state, headers))]
pub async fn debit(
    State(state): State<Arc<AppState>>,
    Path((warehouse, article)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<MovementRequest>,
) -> Result<(StatusCode, Json<LotResponse>), ApiError> {
    let mut cmd = DebitStock::new(warehouse, article, req.quantity, req.reason);
    if let Some(reference) = req.reference {
        cmd = cmd.with_reference(reference);
    }
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }
    lot_response(state.orchestrator.handle(DomainRequest::DebitStock(cmd)).await?)
}

/// POST /lots/{warehouse}/{article}/credit
#[tracing::instrument(skip(state, headers))]
pub async fn credit(
    State(state): State<Arc<AppState>>,
    Path((warehouse, article)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<MovementRequest>,
) -> Result<(StatusCode, Json<LotResponse>), ApiError> {
    let mut cmd = CreditStock::new(warehouse, article, req.quantity, req.reason);
    if let Some(reference) = req.reference {
        cmd = cmd.with_reference(reference);
    }
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }
    lot_response(state.orchestrator.handle(DomainRequest::CreditStock(cmd)).await?)
}
