//! Outbound notifications for committed domain changes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::Serialize;
use tokio::sync::RwLock;

/// Small record describing one committed change, for the notification
/// subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainNotification {
    pub event_type: String,
    pub aggregate_id: AggregateId,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
}

impl DomainNotification {
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: AggregateId,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            aggregate_id,
            timestamp: Utc::now(),
            summary: summary.into(),
        }
    }
}

/// Fire-and-forget sink for [`DomainNotification`]s.
///
/// Delivery is best effort: implementations swallow their own failures and
/// must not block the request that produced the notification.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, notification: DomainNotification);
}

/// Writes each notification as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, notification: DomainNotification) {
        tracing::info!(
            target: "domain_notifications",
            event_type = %notification.event_type,
            aggregate_id = %notification.aggregate_id,
            timestamp = %notification.timestamp,
            summary = %notification.summary,
            "domain notification"
        );
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    published: Arc<RwLock<Vec<DomainNotification>>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notifications(&self) -> Vec<DomainNotification> {
        self.published.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.published.read().await.len()
    }

    pub async fn clear(&self) {
        self.published.write().await.clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, notification: DomainNotification) {
        self.published.write().await.push(notification);
    }
}
