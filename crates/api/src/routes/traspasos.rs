//! Traspaso (inter-branch transfer) endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::Quantity;
use domain::{
    ApproveTraspaso, ReceiveTraspaso, RejectTraspaso, RequestLine, RequestTraspaso, Traspaso,
    TraspasoState,
};
use orchestrator::{DomainRequest, DomainResponse};
use projections::TransferCard;
use serde::{Deserialize, Serialize};

use super::cajas::unexpected;
use super::{AppState, idempotency_key, optional_json, parse_aggregate_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct RequestTraspasoRequest {
    pub origin: String,
    pub destination: String,
    pub requester: String,
    pub lines: Vec<RequestLine>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ActorRequest {
    /// Operator performing the transition.
    pub by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
    pub by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    pub status: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct TraspasoResponse {
    #[serde(flatten)]
    pub traspaso: Traspaso,
    pub in_transit: Quantity,
    pub replayed: bool,
}

#[derive(Serialize)]
pub struct BoardResponse {
    pub counts: BTreeMap<&'static str, usize>,
    pub traspasos: Vec<TransferCard>,
}

fn written(
    response: DomainResponse,
    created: StatusCode,
) -> Result<(StatusCode, Json<TraspasoResponse>), ApiError> {
    match response {
        DomainResponse::Traspaso { traspaso, replayed } => {
            let status = if replayed { StatusCode::OK } else { created };
            Ok((
                status,
                Json(TraspasoResponse {
                    in_transit: traspaso.in_transit(),
                    traspaso,
                    replayed,
                }),
            ))
        }
        other => Err(unexpected(other)),
    }
}

// -- Handlers --

/// POST /traspasos — request a transfer between warehouses of two branches.
#[tracing::instrument(skip(state, headers, req))]
pub async fn request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RequestTraspasoRequest>,
) -> Result<(StatusCode, Json<TraspasoResponse>), ApiError> {
    let mut cmd = RequestTraspaso::new(req.origin, req.destination, req.requester, req.lines);
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }
    let response = state
        .orchestrator
        .handle(DomainRequest::RequestTraspaso(cmd))
        .await?;
    written(response, StatusCode::CREATED)
}

/// GET /traspasos?status= — the transfer board, oldest request first.
#[tracing::instrument(skip(state))]
pub async fn board(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<BoardResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<TraspasoState>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    state.catch_up().await?;

    let counts = state
        .board
        .counts_by_state()
        .await
        .into_iter()
        .map(|(traspaso_state, count)| (traspaso_state.as_str(), count))
        .collect();
    Ok(Json(BoardResponse {
        counts,
        traspasos: state.board.list(status).await,
    }))
}

/// GET /traspasos/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TraspasoResponse>, ApiError> {
    let id = parse_aggregate_id(&id)?;
    let response = state
        .orchestrator
        .handle(DomainRequest::GetTraspaso(id))
        .await?;
    let (_, body) = written(response, StatusCode::OK)?;
    Ok(body)
}

/// POST /traspasos/{id}/approve — debits the origin and puts the stock in transit.
#[tracing::instrument(skip(state, headers, body))]
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<TraspasoResponse>), ApiError> {
    let mut cmd = ApproveTraspaso::new(parse_aggregate_id(&id)?);
    if let Some(by) = optional_json::<ActorRequest>(&body)?.by {
        cmd = cmd.by(by);
    }
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }
    let response = state
        .orchestrator
        .handle(DomainRequest::ApproveTraspaso(cmd))
        .await?;
    written(response, StatusCode::OK)
}

/// POST /traspasos/{id}/receive — credits the destination.
#[tracing::instrument(skip(state, headers, body))]
pub async fn receive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<TraspasoResponse>), ApiError> {
    let mut cmd = ReceiveTraspaso::new(parse_aggregate_id(&id)?);
    if let Some(by) = optional_json::<ActorRequest>(&body)?.by {
        cmd = cmd.by(by);
    }
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }
    let response = state
        .orchestrator
        .handle(DomainRequest::ReceiveTraspaso(cmd))
        .await?;
    written(response, StatusCode::OK)
}

/// POST /traspasos/{id}/reject — returns any debited stock to the origin.
#[tracing::instrument(skip(state, headers, req))]
pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<RejectRequest>,
) -> Result<(StatusCode, Json<TraspasoResponse>), ApiError> {
    let mut cmd = RejectTraspaso::new(parse_aggregate_id(&id)?, req.reason);
    if let Some(by) = req.by {
        cmd = cmd.by(by);
    }
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }
    let response = state
        .orchestrator
        .handle(DomainRequest::RejectTraspaso(cmd))
        .await?;
    written(response, StatusCode::OK)
}
