//! Stock on hand per warehouse and article.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::{InventoryLot, StockLevel};
pub use commands::{CreditStock, DebitStock};
pub use events::{InventoryEvent, LotMovementData, StockMovement, StockReason};
pub use service::InventoryService;
pub(crate) use service::record_movement;

use common::{ArticleId, Quantity, WarehouseId};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during stock movements.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Stock movement quantity must be greater than 0")]
    ZeroQuantity,

    /// A debit would leave the lot below zero.
    #[error(
        "Insufficient stock of {article} at {warehouse}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        warehouse: WarehouseId,
        article: ArticleId,
        available: Quantity,
        requested: Quantity,
    },

    #[error("Crediting {quantity} to {article} at {warehouse} overflows the lot")]
    Overflow {
        warehouse: WarehouseId,
        article: ArticleId,
        quantity: Quantity,
    },
}

impl InventoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            InventoryError::MissingField(_)
            | InventoryError::ZeroQuantity
            | InventoryError::Overflow { .. } => ErrorKind::Validation,
        }
    }
}
