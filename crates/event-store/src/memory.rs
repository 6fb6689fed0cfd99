use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version,
    store::{AppendBatch, EventStore, EventStream, IdempotencyRecord, validate_batch},
};

#[derive(Default)]
struct MemoryState {
    /// Every event in insertion order.
    log: Vec<EventEnvelope>,
    /// Positions in `log` per aggregate, in version order.
    streams: HashMap<AggregateId, Vec<usize>>,
    idempotency_keys: HashMap<String, IdempotencyRecord>,
    snapshots: HashMap<AggregateId, Snapshot>,
}

impl MemoryState {
    fn current_version(&self, aggregate_id: AggregateId) -> Version {
        self.streams
            .get(&aggregate_id)
            .and_then(|positions| positions.last())
            .map(|&pos| self.log[pos].version)
            .unwrap_or(Version::initial())
    }

    fn events_for(&self, aggregate_id: AggregateId, from: Version) -> Vec<EventEnvelope> {
        self.streams
            .get(&aggregate_id)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&pos| &self.log[pos])
                    .filter(|e| e.version >= from)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-memory event store.
///
/// A batch is checked and applied under one write lock, so readers never see
/// part of a multi-stream commit. Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.log.len()
    }

    /// Clears all events, keys and snapshots.
    pub async fn clear(&self) {
        *self.state.write().await = MemoryState::default();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_batch(&self, batch: AppendBatch) -> Result<Vec<Version>> {
        validate_batch(&batch)?;

        let mut state = self.state.write().await;

        if let Some(ref key) = batch.idempotency_key
            && state.idempotency_keys.contains_key(key)
        {
            return Err(EventStoreError::DuplicateRequest { key: key.clone() });
        }

        // Check every stream before writing any of them.
        for stream in &batch.streams {
            let first = &stream.events[0];
            let current = state.current_version(first.aggregate_id);
            let conflict = match stream.options.expected_version {
                Some(expected) => current != expected,
                None => first.version <= current,
            };
            if conflict {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: first.aggregate_id,
                    expected: stream.options.expected_version.unwrap_or(current),
                    actual: current,
                });
            }
        }

        let record = batch.idempotency_record();
        let mut versions = Vec::with_capacity(batch.streams.len());
        for stream in batch.streams {
            let mut last = Version::initial();
            for event in stream.events {
                last = event.version;
                let position = state.log.len();
                state
                    .streams
                    .entry(event.aggregate_id)
                    .or_default()
                    .push(position);
                state.log.push(event);
            }
            versions.push(last);
        }

        if let (Some(key), Some(record)) = (batch.idempotency_key, record) {
            state.idempotency_keys.insert(key, record);
        }

        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        Ok(self
            .state
            .read()
            .await
            .events_for(aggregate_id, Version::initial()))
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        Ok(self.state.read().await.events_for(aggregate_id, from_version))
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.state.read().await.log.clone();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let state = self.state.read().await;
        Ok(state
            .streams
            .contains_key(&aggregate_id)
            .then(|| state.current_version(aggregate_id)))
    }

    async fn find_idempotency_key(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        Ok(self.state.read().await.idempotency_keys.get(key).cloned())
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.state
            .write()
            .await
            .snapshots
            .insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        Ok(self.state.read().await.snapshots.get(&aggregate_id).cloned())
    }
}
