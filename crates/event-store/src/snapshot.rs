use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{AggregateId, Version};

/// Serialized aggregate state at `version`.
///
/// Loading starts from the snapshot and replays only the events after it.
/// Snapshots never replace events; dropping every snapshot is always safe.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    /// Version of the last event folded into `state`.
    pub version: Version,
    pub timestamp: DateTime<Utc>,
    pub state: serde_json::Value,
}

impl Snapshot {
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            state,
        }
    }

    /// Captures `aggregate` as it stands at `version`.
    pub fn capture<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        aggregate: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            aggregate_id,
            aggregate_type,
            version,
            serde_json::to_value(aggregate)?,
        ))
    }

    /// True when the snapshot was taken of an aggregate of `aggregate_type`.
    pub fn is_for(&self, aggregate_type: &str) -> bool {
        self.aggregate_type == aggregate_type
    }

    pub fn restore<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}
