use std::time::Duration;

use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A concurrency conflict occurred when appending events.
    /// The expected version did not match the actual version.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// A batch carrying this idempotency key was already committed.
    #[error("Duplicate request: idempotency key {key} was already used")]
    DuplicateRequest { key: String },

    /// The batch was malformed (empty, mixed aggregates, gaps in versions).
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// The store did not answer within the caller-supplied timeout.
    #[error("Event store operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Returns true for optimistic version mismatches, which are safe to retry.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }

    /// Returns true for failures of the storage backend itself.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            EventStoreError::Timeout { .. }
                | EventStoreError::Database(_)
                | EventStoreError::Migration(_)
        )
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
