//! Domain layer for the caja and traspaso services.
//!
//! This crate provides:
//! - the `Aggregate` / `DomainEvent` traits and command plumbing
//!   (`CommandHandler`, `UnitOfWork`, conflict retries, idempotent replays)
//! - `CajaAccount` and `CajaService`: cash-register sessions and their ledger
//! - `InventoryLot` and `InventoryService`: stock on hand per warehouse
//! - `Traspaso` and `TraspasoWorkflow`: stock transfers between branches
//! - the error taxonomy and `DomainConfig`

pub mod aggregate;
pub mod caja;
pub mod command;
pub mod config;
pub mod error;
pub mod inventory;
pub mod traspaso;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use caja::{
    CajaAccount, CajaError, CajaEvent, CajaService, CajaSlot, CajaStatus, CajaSummary,
    CajaTotals, CashCount, CloseCaja, EntryKind, LedgerEntry, OpenCaja, PostEntry,
};
pub use command::{Command, CommandHandler, CommandResult, CommitOutcome, Operation, UnitOfWork};
pub use config::DomainConfig;
pub use error::{DomainError, ErrorKind};
pub use inventory::{
    CreditStock, DebitStock, InventoryError, InventoryEvent, InventoryLot, InventoryService,
    LotMovementData, StockLevel, StockMovement, StockReason,
};
pub use traspaso::{
    ApproveTraspaso, InMemoryWarehouseDirectory, ReceiveTraspaso, RejectTraspaso, RequestLine,
    RequestTraspaso, Traspaso, TraspasoError, TraspasoEvent, TraspasoLine, TraspasoState,
    TraspasoWorkflow, WarehouseDirectory,
};
