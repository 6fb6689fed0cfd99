//! Warehouse directory and stock read model endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{BranchId, Quantity, WarehouseId};
use projections::StockRow;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RegisterWarehouseRequest {
    pub branch: String,
}

#[derive(Serialize)]
pub struct WarehouseResponse {
    pub warehouse: WarehouseId,
    pub branch: BranchId,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub warehouse: WarehouseId,
    pub total_units: Quantity,
    /// Units approved towards this warehouse and not yet received.
    pub incoming_units: Quantity,
    pub articles: Vec<StockRow>,
}

/// PUT /warehouses/{id} — assign a warehouse to a branch.
#[tracing::instrument(skip(state))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RegisterWarehouseRequest>,
) -> Result<Json<WarehouseResponse>, ApiError> {
    let warehouse = WarehouseId::new(id);
    let branch = BranchId::new(req.branch);
    if warehouse.is_blank() || branch.is_blank() {
        return Err(ApiError::BadRequest(
            "warehouse and branch must not be blank".into(),
        ));
    }

    state
        .directory
        .register(warehouse.clone(), branch.clone())
        .await;
    Ok(Json(WarehouseResponse { warehouse, branch }))
}

/// GET /warehouses/{id}/stock — every article on hand, from the projection.
#[tracing::instrument(skip(state))]
pub async fn stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StockResponse>, ApiError> {
    state.catch_up().await?;

    let warehouse = WarehouseId::new(id);
    let articles = state.stock.stock_for(&warehouse).await;
    Ok(Json(StockResponse {
        total_units: articles.iter().map(|row| row.quantity).sum(),
        incoming_units: state.board.incoming_to(&warehouse).await,
        warehouse,
        articles,
    }))
}
