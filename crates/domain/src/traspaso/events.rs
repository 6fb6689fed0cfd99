//! Traspaso domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, ArticleId, BranchId, OperatorId, Quantity, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on a traspaso aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TraspasoEvent {
    TraspasoRequested(TraspasoRequestedData),
    TraspasoApproved(TraspasoApprovedData),
    /// Entered automatically right after approval.
    TraspasoDispatched(TraspasoDispatchedData),
    TraspasoReceived(TraspasoReceivedData),
    TraspasoRejected(TraspasoRejectedData),
}

impl DomainEvent for TraspasoEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TraspasoEvent::TraspasoRequested(_) => "TraspasoRequested",
            TraspasoEvent::TraspasoApproved(_) => "TraspasoApproved",
            TraspasoEvent::TraspasoDispatched(_) => "TraspasoDispatched",
            TraspasoEvent::TraspasoReceived(_) => "TraspasoReceived",
            TraspasoEvent::TraspasoRejected(_) => "TraspasoRejected",
        }
    }
}

/// A line as requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    pub article: ArticleId,
    pub source_lot: AggregateId,
    pub quantity: Quantity,
}

/// A per-article quantity recorded on approval or receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQuantity {
    pub article: ArticleId,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraspasoRequestedData {
    pub traspaso_id: AggregateId,
    pub origin: WarehouseId,
    pub origin_branch: BranchId,
    pub destination: WarehouseId,
    pub destination_branch: BranchId,
    pub requester: OperatorId,
    pub lines: Vec<RequestedLine>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraspasoApprovedData {
    pub approved_by: Option<OperatorId>,
    pub lines: Vec<LineQuantity>,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraspasoDispatchedData {
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraspasoReceivedData {
    pub received_by: Option<OperatorId>,
    pub lines: Vec<LineQuantity>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraspasoRejectedData {
    pub rejected_by: Option<OperatorId>,
    pub reason: String,
    /// Quantities credited back to the origin; empty when nothing had been
    /// debited yet.
    pub restocked: Vec<LineQuantity>,
    pub rejected_at: DateTime<Utc>,
}
