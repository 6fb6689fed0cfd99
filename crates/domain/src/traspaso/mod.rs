//! Inter-warehouse stock transfers (traspasos).

mod aggregate;
mod commands;
mod directory;
mod events;
mod state;
mod workflow;

pub use aggregate::{Traspaso, TraspasoLine};
pub use commands::{ApproveTraspaso, ReceiveTraspaso, RejectTraspaso, RequestLine, RequestTraspaso};
pub use directory::{InMemoryWarehouseDirectory, WarehouseDirectory};
pub use events::{
    LineQuantity, RequestedLine, TraspasoApprovedData, TraspasoDispatchedData, TraspasoEvent,
    TraspasoReceivedData, TraspasoRejectedData, TraspasoRequestedData,
};
pub use state::TraspasoState;
pub use workflow::TraspasoWorkflow;

use common::{ArticleId, BranchId, WarehouseId};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during traspaso operations.
#[derive(Debug, Error)]
pub enum TraspasoError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Origin and destination are the same warehouse: {warehouse}")]
    SameWarehouse { warehouse: WarehouseId },

    #[error("Origin and destination warehouses both belong to branch {branch}")]
    SameBranch { branch: BranchId },

    #[error("Traspaso has no lines")]
    NoLines,

    #[error("Article {article} appears on more than one line")]
    DuplicateArticle { article: ArticleId },

    #[error("Requested quantity for {article} must be greater than 0")]
    ZeroQuantity { article: ArticleId },

    #[error("Rejection reason is required")]
    EmptyRejectReason,

    /// Traspaso is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current} state")]
    InvalidTransition {
        current: TraspasoState,
        action: &'static str,
    },

    #[error("Traspaso already requested")]
    AlreadyCreated,
}

impl TraspasoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TraspasoError::InvalidTransition { .. } | TraspasoError::AlreadyCreated => {
                ErrorKind::InvalidState
            }
            _ => ErrorKind::Validation,
        }
    }
}
