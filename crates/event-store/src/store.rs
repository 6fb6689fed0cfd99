use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version};

/// Options for appending events to one aggregate stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the aggregate for optimistic concurrency control.
    /// If None, no version check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the aggregate to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the aggregate to not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Events destined for a single aggregate stream within a batch.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub events: Vec<EventEnvelope>,
    pub options: AppendOptions,
}

impl StreamAppend {
    pub fn new(events: Vec<EventEnvelope>, options: AppendOptions) -> Self {
        Self { events, options }
    }

    /// Aggregate this stream append targets.
    pub fn aggregate_id(&self) -> Option<AggregateId> {
        self.events.first().map(|e| e.aggregate_id)
    }
}

/// What an idempotency key was recorded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    /// Primary aggregate of the batch that recorded the key.
    pub aggregate_id: AggregateId,
    /// Name of the operation that committed the batch; empty when unnamed.
    pub operation: String,
}

/// A set of stream appends committed all-or-nothing.
///
/// The first stream is the batch's primary aggregate: it is what an
/// idempotency key resolves to.
#[derive(Debug, Clone, Default)]
pub struct AppendBatch {
    pub streams: Vec<StreamAppend>,
    pub idempotency_key: Option<String>,
    pub operation: String,
}

impl AppendBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a batch holding one stream.
    pub fn single(events: Vec<EventEnvelope>, options: AppendOptions) -> Self {
        Self {
            streams: vec![StreamAppend::new(events, options)],
            ..Self::default()
        }
    }

    /// Adds a stream to the batch.
    pub fn stream(mut self, events: Vec<EventEnvelope>, options: AppendOptions) -> Self {
        self.streams.push(StreamAppend::new(events, options));
        self
    }

    /// Records an idempotency key with the batch.
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Names the operation stored alongside the idempotency key.
    pub fn operation(mut self, name: impl Into<String>) -> Self {
        self.operation = name.into();
        self
    }

    /// What the idempotency key of this batch will resolve to.
    pub fn idempotency_record(&self) -> Option<IdempotencyRecord> {
        Some(IdempotencyRecord {
            aggregate_id: self.primary_aggregate()?,
            operation: self.operation.clone(),
        })
    }

    /// Aggregate of the first stream.
    pub fn primary_aggregate(&self) -> Option<AggregateId> {
        self.streams.first().and_then(StreamAppend::aggregate_id)
    }

    /// Total number of events across all streams.
    pub fn event_count(&self) -> usize {
        self.streams.iter().map(|s| s.events.len()).sum()
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Persistence for event-sourced aggregates.
///
/// All implementations must be thread-safe and must apply an [`AppendBatch`]
/// atomically: either every stream is written or none is.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of streams atomically.
    ///
    /// Fails with `ConcurrencyConflict` if any stream's current version differs
    /// from its expected version, and with `DuplicateRequest` if the batch's
    /// idempotency key was already recorded. Returns the new version of each
    /// stream, in batch order.
    async fn append_batch(&self, batch: AppendBatch) -> Result<Vec<Version>>;

    /// Retrieves all events for an aggregate, oldest first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves the events of an aggregate starting at `from_version`.
    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Streams every event in the store in insertion order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Gets the current version of an aggregate, None if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Returns the primary aggregate and operation of the batch that
    /// recorded `key`.
    async fn find_idempotency_key(&self, key: &str) -> Result<Option<IdempotencyRecord>>;

    /// Saves (or replaces) the snapshot of an aggregate.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Retrieves the latest snapshot of an aggregate.
    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>>;
}

/// Convenience methods available on every event store.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends events to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let versions = self.append_batch(AppendBatch::single(events, options)).await?;
        versions
            .into_iter()
            .next()
            .ok_or_else(|| EventStoreError::InvalidAppend("empty batch".to_string()))
    }

    /// Checks if an aggregate has any events.
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Loads an aggregate's events, starting after its snapshot if one exists.
    async fn load_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<EventEnvelope>)> {
        if let Some(snapshot) = self.get_snapshot(aggregate_id).await? {
            let events = self
                .get_events_for_aggregate_from_version(aggregate_id, snapshot.version.next())
                .await?;
            Ok((Some(snapshot), events))
        } else {
            let events = self.get_events_for_aggregate(aggregate_id).await?;
            Ok((None, events))
        }
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks a batch for structural problems before any backend touches it.
pub fn validate_batch(batch: &AppendBatch) -> Result<()> {
    if batch.streams.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for stream in &batch.streams {
        validate_stream(stream)?;
        let aggregate_id = stream.events[0].aggregate_id;
        if !seen.insert(aggregate_id) {
            return Err(EventStoreError::InvalidAppend(format!(
                "aggregate {aggregate_id} appears twice in one batch"
            )));
        }
    }

    Ok(())
}

fn validate_stream(stream: &StreamAppend) -> Result<()> {
    let Some(first) = stream.events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty event list".to_string(),
        ));
    };

    if let Some(expected) = stream.options.expected_version
        && first.version != expected.next()
    {
        return Err(EventStoreError::InvalidAppend(format!(
            "first event of {} has version {}, expected {}",
            first.aggregate_id,
            first.version,
            expected.next()
        )));
    }

    let mut expected_version = first.version;
    for event in stream.events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id
            || event.aggregate_type != first.aggregate_type
        {
            return Err(EventStoreError::InvalidAppend(
                "all events of a stream must belong to the same aggregate".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Test")
            .event_type("Happened")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            validate_batch(&AppendBatch::new()),
            Err(EventStoreError::InvalidAppend(_))
        ));
    }

    #[test]
    fn version_gaps_are_rejected() {
        let id = AggregateId::new();
        let batch = AppendBatch::single(vec![event(id, 1), event(id, 3)], AppendOptions::new());
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn first_version_must_follow_expected() {
        let id = AggregateId::new();
        let batch = AppendBatch::single(
            vec![event(id, 3)],
            AppendOptions::expect_version(Version::first()),
        );
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn same_aggregate_twice_is_rejected() {
        let id = AggregateId::new();
        let batch = AppendBatch::new()
            .stream(vec![event(id, 1)], AppendOptions::expect_new())
            .stream(vec![event(id, 2)], AppendOptions::new());
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn multi_stream_batch_is_valid() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        let batch = AppendBatch::new()
            .stream(vec![event(a, 1), event(a, 2)], AppendOptions::expect_new())
            .stream(vec![event(b, 5)], AppendOptions::expect_version(Version::new(4)))
            .idempotency_key("req-1")
            .operation("traspaso.approve");
        assert!(validate_batch(&batch).is_ok());
        assert_eq!(batch.primary_aggregate(), Some(a));
        assert_eq!(
            batch.idempotency_record(),
            Some(IdempotencyRecord {
                aggregate_id: a,
                operation: "traspaso.approve".to_string(),
            })
        );
        assert_eq!(batch.event_count(), 3);
    }
}
