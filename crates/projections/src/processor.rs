//! Feeds events from the store to registered projections.

use std::sync::Arc;

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Delivers the global event stream to projections.
///
/// Catch-up replays everything a projection has not seen yet; `process_event`
/// pushes a single freshly committed event; `rebuild_all` starts over.
/// Delivery is serialised so two callers never hand the same event to a
/// projection, or skip one, by reading its position at the same time.
pub struct ProjectionProcessor {
    store: Arc<dyn EventStore>,
    projections: Vec<Arc<dyn Projection>>,
    delivery: Mutex<()>,
}

impl ProjectionProcessor {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            projections: Vec::new(),
            delivery: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, projection: Arc<dyn Projection>) -> Self {
        self.register(projection);
        self
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams every stored event to each projection that is behind it.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let _delivery = self.delivery.lock().await;
        self.catch_up().await
    }

    async fn catch_up(&self) -> Result<()> {
        let mut stream = self.store.stream_all_events().await?;
        let mut index: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            index += 1;

            for projection in &self.projections {
                if projection.position().await.is_behind(index) {
                    projection.handle(&event).await?;
                    delivered += 1;
                }
            }
        }

        if delivered > 0 {
            metrics::counter!("projections_events_processed").increment(delivered);
        }
        tracing::debug!(events = index, delivered, "catch-up complete");
        Ok(())
    }

    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        let _delivery = self.delivery.lock().await;
        for projection in &self.projections {
            projection.handle(event).await?;
        }
        metrics::counter!("projections_events_processed")
            .increment(self.projections.len() as u64);
        Ok(())
    }

    /// Resets every projection and replays the store from the start.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        let _delivery = self.delivery.lock().await;
        for projection in &self.projections {
            projection.reset().await?;
            tracing::info!(projection = projection.name(), "projection reset");
        }
        self.catch_up().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionPosition;
    use async_trait::async_trait;
    use common::AggregateId;
    use event_store::{AppendOptions, EventStoreExt, InMemoryEventStore, Version};
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct Tally {
        seen: RwLock<Vec<String>>,
        position: RwLock<ProjectionPosition>,
    }

    #[async_trait]
    impl Projection for Tally {
        fn name(&self) -> &'static str {
            "Tally"
        }

        async fn handle(&self, event: &EventEnvelope) -> Result<()> {
            self.seen.write().await.push(event.event_type.clone());
            tokio::task::yield_now().await;
            let mut pos = self.position.write().await;
            *pos = pos.advance();
            Ok(())
        }

        async fn position(&self) -> ProjectionPosition {
            *self.position.read().await
        }

        async fn reset(&self) -> Result<()> {
            self.seen.write().await.clear();
            *self.position.write().await = ProjectionPosition::zero();
            Ok(())
        }
    }

    fn event(aggregate_id: AggregateId, version: i64, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("CajaAccount")
            .event_type(event_type)
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    async fn seeded_store(count: i64) -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        if count > 0 {
            let id = AggregateId::new();
            let events = (1..=count).map(|v| event(id, v, &format!("E{v}"))).collect();
            store
                .append(events, AppendOptions::expect_new())
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn catch_up_delivers_in_order() {
        let store = seeded_store(3).await;
        let tally = Arc::new(Tally::default());
        let processor = ProjectionProcessor::new(Arc::new(store)).with(tally.clone());

        processor.run_catch_up().await.unwrap();

        assert_eq!(*tally.seen.read().await, ["E1", "E2", "E3"]);
    }

    #[tokio::test]
    async fn second_catch_up_only_delivers_new_events() {
        let store = seeded_store(2).await;
        let tally = Arc::new(Tally::default());
        let processor =
            ProjectionProcessor::new(Arc::new(store.clone())).with(tally.clone());
        processor.run_catch_up().await.unwrap();

        let other = AggregateId::new();
        store
            .append(vec![event(other, 1, "Late")], AppendOptions::expect_new())
            .await
            .unwrap();
        processor.run_catch_up().await.unwrap();

        assert_eq!(*tally.seen.read().await, ["E1", "E2", "Late"]);
    }

    #[tokio::test]
    async fn rebuild_replays_from_scratch() {
        let store = seeded_store(2).await;
        let tally = Arc::new(Tally::default());
        let processor = ProjectionProcessor::new(Arc::new(store)).with(tally.clone());
        processor.run_catch_up().await.unwrap();

        processor.rebuild_all().await.unwrap();

        assert_eq!(tally.seen.read().await.len(), 2);
        assert_eq!(tally.position().await.events_processed, 2);
    }

    #[tokio::test]
    async fn single_event_reaches_every_projection() {
        let first = Arc::new(Tally::default());
        let second = Arc::new(Tally::default());
        let processor = ProjectionProcessor::new(Arc::new(InMemoryEventStore::new()))
            .with(first.clone())
            .with(second.clone());
        assert_eq!(processor.projection_count(), 2);

        processor
            .process_event(&event(AggregateId::new(), 1, "Pushed"))
            .await
            .unwrap();

        assert_eq!(first.seen.read().await.len(), 1);
        assert_eq!(second.seen.read().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_catch_ups_deliver_each_event_once() {
        let store = seeded_store(5).await;
        let tally = Arc::new(Tally::default());
        let processor =
            Arc::new(ProjectionProcessor::new(Arc::new(store)).with(tally.clone()));

        let runs = (0..4).map(|_| {
            let processor = processor.clone();
            tokio::spawn(async move { processor.run_catch_up().await })
        });
        for run in futures_util::future::join_all(runs).await {
            run.unwrap().unwrap();
        }

        assert_eq!(*tally.seen.read().await, ["E1", "E2", "E3", "E4", "E5"]);
        assert_eq!(tally.position().await.events_processed, 5);
    }

    #[tokio::test]
    async fn empty_store_is_a_no_op() {
        let tally = Arc::new(Tally::default());
        let processor =
            ProjectionProcessor::new(Arc::new(InMemoryEventStore::new())).with(tally.clone());

        processor.run_catch_up().await.unwrap();

        assert!(tally.seen.read().await.is_empty());
    }
}
