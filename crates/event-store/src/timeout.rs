use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, IdempotencyRecord, Result, Snapshot, Version,
    store::{AppendBatch, EventStore, EventStream},
};

/// Wraps an event store so every call fails with [`EventStoreError::Timeout`]
/// instead of hanging past `timeout`.
///
/// A timed-out append may or may not have committed; callers should retry with
/// the same idempotency key.
#[derive(Clone)]
pub struct TimeoutEventStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutEventStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn guard<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.timeout, "event store call timed out");
                metrics::counter!("event_store_timeouts_total", "operation" => operation)
                    .increment(1);
                Err(EventStoreError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl<S: EventStore> EventStore for TimeoutEventStore<S> {
    async fn append_batch(&self, batch: AppendBatch) -> Result<Vec<Version>> {
        self.guard("append_batch", self.inner.append_batch(batch))
            .await
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.guard(
            "get_events_for_aggregate",
            self.inner.get_events_for_aggregate(aggregate_id),
        )
        .await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        self.guard(
            "get_events_for_aggregate_from_version",
            self.inner
                .get_events_for_aggregate_from_version(aggregate_id, from_version),
        )
        .await
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        self.guard("stream_all_events", self.inner.stream_all_events())
            .await
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        self.guard(
            "get_aggregate_version",
            self.inner.get_aggregate_version(aggregate_id),
        )
        .await
    }

    async fn find_idempotency_key(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        self.guard("find_idempotency_key", self.inner.find_idempotency_key(key))
            .await
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.guard("save_snapshot", self.inner.save_snapshot(snapshot))
            .await
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        self.guard("get_snapshot", self.inner.get_snapshot(aggregate_id))
            .await
    }
}
