//! Caja (cash register) endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{AggregateId, BranchId, OperatorId};
use domain::{
    Aggregate, CajaAccount, CajaStatus, CajaSummary, CashCount, CloseCaja, DomainError, EntryKind,
    LedgerEntry, OpenCaja, PostEntry,
};
use orchestrator::{DomainRequest, DomainResponse};
use serde::{Deserialize, Serialize};

use super::{AmountInput, AppState, idempotency_key, optional_json, parse_aggregate_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct OpenCajaRequest {
    pub branch: String,
    pub operator: String,
    pub opening_balance: AmountInput,
}

#[derive(Debug, Deserialize)]
pub struct PostEntryRequest {
    pub kind: EntryKind,
    pub amount: AmountInput,
    pub reference: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CloseCajaRequest {
    pub counted_cash: Option<AmountInput>,
}

#[derive(Debug, Deserialize)]
pub struct OpenCajaQuery {
    pub branch: String,
    pub operator: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct ClosingResponse {
    pub expected_cash: String,
    pub counted_cash: Option<String>,
    pub difference: Option<String>,
}

#[derive(Serialize)]
pub struct CajaResponse {
    pub id: Option<AggregateId>,
    pub branch: Option<BranchId>,
    pub operator: Option<OperatorId>,
    pub status: CajaStatus,
    pub opening_balance: String,
    pub balance: String,
    pub cash_on_hand: String,
    pub entry_count: usize,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closing: Option<ClosingResponse>,
    pub replayed: bool,
}

#[derive(Serialize)]
pub struct TotalsResponse {
    pub sale_cash: String,
    pub sale_credit: String,
    pub sale_qr: String,
    pub purchase_cash: String,
    pub purchase_credit: String,
    pub deposits: String,
    pub withdrawals: String,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub id: AggregateId,
    pub branch: BranchId,
    pub operator: OperatorId,
    pub status: CajaStatus,
    pub opening_balance: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub totals: TotalsResponse,
    pub total_sales: String,
    pub total_purchases: String,
    pub net_balance: String,
    pub cash_on_hand: String,
    pub entry_count: usize,
    pub closing: Option<ClosingResponse>,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub caja_id: AggregateId,
    pub balance: String,
}

#[derive(Serialize)]
pub struct EntryResponse {
    pub sequence: u32,
    pub kind: EntryKind,
    pub amount: String,
    pub timestamp: DateTime<Utc>,
    pub reference: Option<String>,
    pub description: Option<String>,
}

impl AppState {
    fn closing_response(&self, count: &CashCount) -> ClosingResponse {
        ClosingResponse {
            expected_cash: self.render(count.expected_cash),
            counted_cash: count.counted_cash.map(|m| self.render(m)),
            difference: count.difference.map(|m| self.render(m)),
        }
    }

    fn caja_response(&self, caja: &CajaAccount, replayed: bool) -> CajaResponse {
        CajaResponse {
            id: caja.id(),
            branch: caja.branch().cloned(),
            operator: caja.operator().cloned(),
            status: caja.status(),
            opening_balance: self.render(caja.opening_balance()),
            balance: self.render(caja.balance()),
            cash_on_hand: self.render(caja.cash_on_hand()),
            entry_count: caja.entries().len(),
            opened_at: caja.opened_at(),
            closed_at: caja.closed_at(),
            closing: caja.closing().map(|c| self.closing_response(c)),
            replayed,
        }
    }

    fn summary_response(&self, summary: CajaSummary) -> SummaryResponse {
        let t = summary.totals;
        SummaryResponse {
            id: summary.caja_id,
            branch: summary.branch,
            operator: summary.operator,
            status: summary.status,
            opening_balance: self.render(summary.opening_balance),
            opened_at: summary.opened_at,
            closed_at: summary.closed_at,
            totals: TotalsResponse {
                sale_cash: self.render(t.sale_cash),
                sale_credit: self.render(t.sale_credit),
                sale_qr: self.render(t.sale_qr),
                purchase_cash: self.render(t.purchase_cash),
                purchase_credit: self.render(t.purchase_credit),
                deposits: self.render(t.deposits),
                withdrawals: self.render(t.withdrawals),
            },
            total_sales: self.render(summary.total_sales),
            total_purchases: self.render(summary.total_purchases),
            net_balance: self.render(summary.net_balance),
            cash_on_hand: self.render(summary.cash_on_hand),
            entry_count: summary.entry_count,
            closing: summary.closing.as_ref().map(|c| self.closing_response(c)),
        }
    }

    fn entry_response(&self, entry: LedgerEntry) -> EntryResponse {
        EntryResponse {
            sequence: entry.sequence,
            kind: entry.kind,
            amount: self.render(entry.amount),
            timestamp: entry.timestamp,
            reference: entry.reference,
            description: entry.description,
        }
    }
}

fn written(
    state: &AppState,
    response: DomainResponse,
    created: StatusCode,
) -> Result<(StatusCode, Json<CajaResponse>), ApiError> {
    match response {
        DomainResponse::Caja { caja, replayed } => {
            let status = if replayed { StatusCode::OK } else { created };
            Ok((status, Json(state.caja_response(&caja, replayed))))
        }
        other => Err(unexpected(other)),
    }
}

pub(crate) fn unexpected(response: DomainResponse) -> ApiError {
    tracing::error!(?response, "orchestrator answered with the wrong response");
    ApiError::Internal("unexpected orchestrator response".into())
}

// -- Handlers --

/// POST /cajas — open a register session.
#[tracing::instrument(skip(state, headers, req))]
pub async fn open(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<OpenCajaRequest>,
) -> Result<(StatusCode, Json<CajaResponse>), ApiError> {
    let opening_balance = req.opening_balance.parse(state.precision)?;
    let mut cmd = OpenCaja::new(req.branch, req.operator, opening_balance);
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }

    let response = state.orchestrator.handle(DomainRequest::OpenCaja(cmd)).await?;
    written(&state, response, StatusCode::CREATED)
}

/// GET /cajas?branch=&operator= — the open caja of an operator, if any.
#[tracing::instrument(skip(state))]
pub async fn find_open(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OpenCajaQuery>,
) -> Result<Json<CajaResponse>, ApiError> {
    let branch = BranchId::new(query.branch);
    let operator = OperatorId::new(query.operator);
    let key = format!("{branch}/{operator}");
    let request = DomainRequest::GetOpenCaja { branch, operator };
    match state.orchestrator.handle(request).await? {
        DomainResponse::OpenCaja(Some(caja)) => Ok(Json(state.caja_response(&caja, false))),
        DomainResponse::OpenCaja(None) => Err(DomainError::not_found("Open caja", key).into()),
        other => Err(unexpected(other)),
    }
}

/// GET /cajas/{id} — full summary with per-kind totals.
#[tracing::instrument(skip(state))]
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let id = parse_aggregate_id(&id)?;
    match state.orchestrator.handle(DomainRequest::GetSummary(id)).await? {
        DomainResponse::Summary(summary) => Ok(Json(state.summary_response(summary))),
        other => Err(unexpected(other)),
    }
}

/// GET /cajas/{id}/balance
#[tracing::instrument(skip(state))]
pub async fn balance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let caja_id = parse_aggregate_id(&id)?;
    match state
        .orchestrator
        .handle(DomainRequest::GetBalance(caja_id))
        .await?
    {
        DomainResponse::Balance(balance) => Ok(Json(BalanceResponse {
            caja_id,
            balance: state.render(balance),
        })),
        other => Err(unexpected(other)),
    }
}

/// GET /cajas/{id}/entries — postings in sequence order.
#[tracing::instrument(skip(state))]
pub async fn entries(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EntryResponse>>, ApiError> {
    let id = parse_aggregate_id(&id)?;
    match state.orchestrator.handle(DomainRequest::GetEntries(id)).await? {
        DomainResponse::Entries(entries) => Ok(Json(
            entries
                .into_iter()
                .map(|e| state.entry_response(e))
                .collect(),
        )),
        other => Err(unexpected(other)),
    }
}

/// POST /cajas/{id}/entries — post a movement.
#[tracing::instrument(skip(state, headers, req))]
pub async fn post_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<PostEntryRequest>,
) -> Result<(StatusCode, Json<CajaResponse>), ApiError> {
    let id = parse_aggregate_id(&id)?;
    let amount = req.amount.parse(state.precision)?;
    let mut cmd = PostEntry::new(id, req.kind, amount);
    if let Some(reference) = req.reference {
        cmd = cmd.with_reference(reference);
    }
    if let Some(description) = req.description {
        cmd = cmd.with_description(description);
    }
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }

    let response = state.orchestrator.handle(DomainRequest::PostEntry(cmd)).await?;
    written(&state, response, StatusCode::CREATED)
}

/// POST /cajas/{id}/close — close with an optional cash count.
#[tracing::instrument(skip(state, headers, body))]
pub async fn close(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<CajaResponse>), ApiError> {
    let id = parse_aggregate_id(&id)?;
    let req: CloseCajaRequest = optional_json(&body)?;
    let mut cmd = CloseCaja::new(id);
    if let Some(counted) = req.counted_cash {
        cmd = cmd.with_counted_cash(counted.parse(state.precision)?);
    }
    if let Some(key) = idempotency_key(&headers)? {
        cmd = cmd.with_idempotency_key(key);
    }

    let response = state.orchestrator.handle(DomainRequest::CloseCaja(cmd)).await?;
    written(&state, response, StatusCode::OK)
}
