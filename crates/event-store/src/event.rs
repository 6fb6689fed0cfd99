use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError};

/// Unique identifier for a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version number of an aggregate stream, used for optimistic concurrency control.
///
/// A stream with no events is at version 0; the first event is version 1 and
/// every following event increments by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of a stream that has no events yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Version carried by the first event of a stream.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored event: the serialized domain event plus the metadata needed to
/// place it in its aggregate stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// Event type name (e.g. "CajaOpened", "LotDebited").
    pub event_type: String,

    pub aggregate_id: AggregateId,

    /// Aggregate type name (e.g. "CajaAccount", "InventoryLot").
    pub aggregate_type: String,

    /// Version of the aggregate after this event.
    pub version: Version,

    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Free-form metadata (correlation ids, actor).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Deserializes the payload into a domain event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Builder for [`EventEnvelope`].
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the timestamp. Defaults to now.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Serializes `payload` into the envelope.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the envelope, failing if a required field was not set.
    pub fn build(self) -> Result<EventEnvelope, EventStoreError> {
        let missing = |field: &str| EventStoreError::InvalidAppend(format!("{field} is required"));
        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type.ok_or_else(|| missing("event_type"))?,
            aggregate_id: self.aggregate_id.ok_or_else(|| missing("aggregate_id"))?,
            aggregate_type: self.aggregate_type.ok_or_else(|| missing("aggregate_type"))?,
            version: self.version.ok_or_else(|| missing("version"))?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self.payload.ok_or_else(|| missing("payload"))?,
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_sequence() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::initial().next(), Version::first());
        assert!(Version::new(1) < Version::new(2));
    }

    #[test]
    fn builder_sets_all_fields() {
        let aggregate_id = AggregateId::new();
        let payload = serde_json::json!({"amount": 5000});

        let envelope = EventEnvelope::builder()
            .event_type("EntryPosted")
            .aggregate_id(aggregate_id)
            .aggregate_type("CajaAccount")
            .version(Version::first())
            .payload_raw(payload.clone())
            .metadata("actor", serde_json::json!("op-1"))
            .build()
            .unwrap();

        assert_eq!(envelope.event_type, "EntryPosted");
        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.version, Version::first());
        assert_eq!(envelope.payload, payload);
        assert_eq!(
            envelope.metadata.get("actor"),
            Some(&serde_json::json!("op-1"))
        );
    }

    #[test]
    fn builder_reports_missing_fields() {
        let result = EventEnvelope::builder().event_type("X").build();
        assert!(matches!(result, Err(EventStoreError::InvalidAppend(msg)) if msg.contains("aggregate_id")));
    }

    #[test]
    fn decode_reads_payload() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Posted {
            amount: i64,
        }

        let envelope = EventEnvelope::builder()
            .event_type("EntryPosted")
            .aggregate_id(AggregateId::new())
            .aggregate_type("CajaAccount")
            .version(Version::first())
            .payload_raw(serde_json::json!({"amount": 5000}))
            .build()
            .unwrap();

        let posted: Posted = envelope.decode().unwrap();
        assert_eq!(posted, Posted { amount: 5000 });
    }
}
