//! Domain error types.

use common::{AggregateId, Quantity};
use event_store::EventStoreError;
use serde::Serialize;
use thiserror::Error;

use crate::caja::CajaError;
use crate::inventory::InventoryError;
use crate::traspaso::TraspasoError;

/// Category of a domain failure, as seen by callers.
///
/// Only `ConcurrencyConflict` is retried automatically; `Infrastructure`
/// failures are safe for the caller to retry with the same idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    InvalidState,
    InsufficientStock,
    Conflict,
    ConcurrencyConflict,
    NotFound,
    Infrastructure,
}

impl ErrorKind {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Infrastructure => "INFRASTRUCTURE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Caja(#[from] CajaError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Traspaso(#[from] TraspasoError),

    /// Aggregate or directory entry not found.
    #[error("{aggregate_type} {id} not found")]
    NotFound {
        aggregate_type: &'static str,
        id: String,
    },

    /// The idempotency key was committed by a different kind of operation.
    #[error("Idempotency key {key} was already used for a different operation")]
    IdempotencyKeyReused { key: String },

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(aggregate_type: &'static str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound {
            aggregate_type,
            id: id.to_string(),
        }
    }

    /// Maps the error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Caja(e) => e.kind(),
            DomainError::Inventory(e) => e.kind(),
            DomainError::Traspaso(e) => e.kind(),
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::IdempotencyKeyReused { .. } => ErrorKind::Conflict,
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => {
                ErrorKind::ConcurrencyConflict
            }
            DomainError::EventStore(EventStoreError::DuplicateRequest { .. }) => {
                ErrorKind::Conflict
            }
            DomainError::EventStore(_) | DomainError::Serialization(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Machine-readable error code, shorthand for `kind().code()`.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Missing quantity of an insufficient-stock failure.
    pub fn shortfall(&self) -> Option<Quantity> {
        match self {
            DomainError::Inventory(InventoryError::InsufficientStock {
                available,
                requested,
                ..
            }) => Some(available.shortfall_for(*requested)),
            _ => None,
        }
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        self.kind() == ErrorKind::ConcurrencyConflict
    }

    /// Aggregate whose stale version caused a concurrency conflict.
    pub fn conflicting_aggregate(&self) -> Option<AggregateId> {
        match self {
            DomainError::EventStore(EventStoreError::ConcurrencyConflict {
                aggregate_id, ..
            }) => Some(*aggregate_id),
            _ => None,
        }
    }
}
