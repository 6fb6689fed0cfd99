//! Projection error types.

use thiserror::Error;

/// Errors that can occur while feeding projections.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// An event payload did not match the type its stream declares.
    #[error("Cannot decode {event_type} event: {source}")]
    Decode {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProjectionError {
    pub(crate) fn decode(event_type: &str, source: serde_json::Error) -> Self {
        ProjectionError::Decode {
            event_type: event_type.to_string(),
            source,
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
