//! Requests accepted by the orchestrator and what they answer with.

use common::{AggregateId, ArticleId, BranchId, Money, OperatorId, WarehouseId};
use domain::{
    ApproveTraspaso, CajaAccount, CajaSummary, CloseCaja, CreditStock, DebitStock, LedgerEntry,
    OpenCaja, PostEntry, ReceiveTraspaso, RejectTraspaso, RequestTraspaso, StockLevel, Traspaso,
};

/// Every operation the domain core exposes.
#[derive(Debug, Clone)]
pub enum DomainRequest {
    OpenCaja(OpenCaja),
    PostEntry(PostEntry),
    CloseCaja(CloseCaja),
    GetCaja(AggregateId),
    GetBalance(AggregateId),
    GetSummary(AggregateId),
    GetEntries(AggregateId),
    GetOpenCaja {
        branch: BranchId,
        operator: OperatorId,
    },

    DebitStock(DebitStock),
    CreditStock(CreditStock),
    GetLot {
        warehouse: WarehouseId,
        article: ArticleId,
    },

    RequestTraspaso(RequestTraspaso),
    ApproveTraspaso(ApproveTraspaso),
    ReceiveTraspaso(ReceiveTraspaso),
    RejectTraspaso(RejectTraspaso),
    GetTraspaso(AggregateId),
}

impl DomainRequest {
    /// Stable operation name, used as the metrics label.
    pub fn operation(&self) -> &'static str {
        match self {
            DomainRequest::OpenCaja(_) => "caja.open",
            DomainRequest::PostEntry(_) => "caja.post",
            DomainRequest::CloseCaja(_) => "caja.close",
            DomainRequest::GetCaja(_) => "caja.get",
            DomainRequest::GetBalance(_) => "caja.balance",
            DomainRequest::GetSummary(_) => "caja.summary",
            DomainRequest::GetEntries(_) => "caja.entries",
            DomainRequest::GetOpenCaja { .. } => "caja.open_lookup",
            DomainRequest::DebitStock(_) => "stock.debit",
            DomainRequest::CreditStock(_) => "stock.credit",
            DomainRequest::GetLot { .. } => "stock.get",
            DomainRequest::RequestTraspaso(_) => "traspaso.request",
            DomainRequest::ApproveTraspaso(_) => "traspaso.approve",
            DomainRequest::ReceiveTraspaso(_) => "traspaso.receive",
            DomainRequest::RejectTraspaso(_) => "traspaso.reject",
            DomainRequest::GetTraspaso(_) => "traspaso.get",
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            DomainRequest::OpenCaja(_)
                | DomainRequest::PostEntry(_)
                | DomainRequest::CloseCaja(_)
                | DomainRequest::DebitStock(_)
                | DomainRequest::CreditStock(_)
                | DomainRequest::RequestTraspaso(_)
                | DomainRequest::ApproveTraspaso(_)
                | DomainRequest::ReceiveTraspaso(_)
                | DomainRequest::RejectTraspaso(_)
        )
    }
}

/// Result of a [`DomainRequest`].
///
/// Mutations carry `replayed`, set when an idempotency key had already been
/// committed and nothing new was written.
#[derive(Debug, Clone)]
pub enum DomainResponse {
    Caja { caja: CajaAccount, replayed: bool },
    Balance(Money),
    Summary(CajaSummary),
    Entries(Vec<LedgerEntry>),
    OpenCaja(Option<CajaAccount>),
    Lot { lot: StockLevel, replayed: bool },
    Traspaso { traspaso: Traspaso, replayed: bool },
}

impl DomainResponse {
    pub fn replayed(&self) -> bool {
        match self {
            DomainResponse::Caja { replayed, .. }
            | DomainResponse::Lot { replayed, .. }
            | DomainResponse::Traspaso { replayed, .. } => *replayed,
            _ => false,
        }
    }
}
