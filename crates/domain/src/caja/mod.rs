//! Cash-register (caja) sessions and their ledger.

mod aggregate;
mod commands;
mod events;
mod ledger;
mod service;
mod slot;
mod state;

pub use aggregate::CajaAccount;
pub use commands::{CloseCaja, OpenCaja, PostEntry};
pub use events::{CajaClosedData, CajaEvent, CajaOpenedData, EntryPostedData, SlotEvent};
pub use ledger::{CajaSummary, CajaTotals, CashCount, EntryKind, LedgerEntry};
pub use service::CajaService;
pub use slot::CajaSlot;
pub use state::CajaStatus;

use common::{AggregateId, BranchId, Money, OperatorId};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during caja operations.
#[derive(Debug, Error)]
pub enum CajaError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Opening balance cannot be negative: {amount}")]
    NegativeOpeningBalance { amount: Money },

    /// Manual postings must be positive; document postings non-negative.
    #[error("Invalid {kind} amount {amount}: {reason}")]
    InvalidAmount {
        kind: EntryKind,
        amount: Money,
        reason: &'static str,
    },

    #[error("Counted cash cannot be negative: {amount}")]
    NegativeCountedCash { amount: Money },

    #[error("Counted cash {amount} is out of range")]
    CountedCashOutOfRange { amount: Money },

    /// Another caja is already open for the same branch and operator.
    #[error("Operator {operator} already has caja {caja_id} open at branch {branch}")]
    AlreadyOpen {
        branch: BranchId,
        operator: OperatorId,
        caja_id: AggregateId,
    },

    #[error("Caja already opened")]
    AlreadyCreated,

    #[error("Caja {caja_id} is closed")]
    Closed { caja_id: AggregateId },

    #[error("Cannot close caja {caja_id} with negative balance {net_balance}")]
    NegativeBalance {
        caja_id: AggregateId,
        net_balance: Money,
    },

    #[error("Register slot is not held by caja {caja_id}")]
    SlotNotHeld { caja_id: AggregateId },
}

impl CajaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CajaError::MissingField(_)
            | CajaError::NegativeOpeningBalance { .. }
            | CajaError::InvalidAmount { .. }
            | CajaError::NegativeCountedCash { .. }
            | CajaError::CountedCashOutOfRange { .. } => ErrorKind::Validation,
            CajaError::AlreadyOpen { .. } => ErrorKind::Conflict,
            CajaError::AlreadyCreated
            | CajaError::Closed { .. }
            | CajaError::NegativeBalance { .. }
            | CajaError::SlotNotHeld { .. } => ErrorKind::InvalidState,
        }
    }
}
