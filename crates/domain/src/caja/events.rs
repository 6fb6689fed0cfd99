//! Caja and register-slot events.

use chrono::{DateTime, Utc};
use common::{AggregateId, BranchId, Money, OperatorId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{CashCount, EntryKind};

/// Events recorded on a caja stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CajaEvent {
    CajaOpened(CajaOpenedData),
    EntryPosted(EntryPostedData),
    CajaClosed(CajaClosedData),
}

impl DomainEvent for CajaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CajaEvent::CajaOpened(_) => "CajaOpened",
            CajaEvent::EntryPosted(_) => "EntryPosted",
            CajaEvent::CajaClosed(_) => "CajaClosed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CajaOpenedData {
    pub caja_id: AggregateId,
    pub branch: BranchId,
    pub operator: OperatorId,
    pub opening_balance: Money,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPostedData {
    pub sequence: u32,
    pub kind: EntryKind,
    pub amount: Money,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CajaClosedData {
    pub closed_at: DateTime<Utc>,
    /// Net balance at close, recomputed from the entries.
    pub net_balance: Money,
    #[serde(flatten)]
    pub count: CashCount,
}

/// Events recorded on a register-slot stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SlotEvent {
    SlotClaimed {
        slot_id: AggregateId,
        branch: BranchId,
        operator: OperatorId,
        caja_id: AggregateId,
        claimed_at: DateTime<Utc>,
    },
    SlotReleased {
        caja_id: AggregateId,
        released_at: DateTime<Utc>,
    },
}

impl DomainEvent for SlotEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SlotEvent::SlotClaimed { .. } => "SlotClaimed",
            SlotEvent::SlotReleased { .. } => "SlotReleased",
        }
    }
}
