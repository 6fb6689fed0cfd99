//! Stock on hand per warehouse, fed from lot movements.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, ArticleId, Quantity, WarehouseId};
use domain::{Aggregate, InventoryEvent, InventoryLot, StockReason};
use event_store::{EventEnvelope, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;
use crate::{ProjectionError, Result};

/// One article in a warehouse's stock list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockRow {
    pub lot_id: AggregateId,
    pub article: ArticleId,
    pub quantity: Quantity,
    pub version: Version,
    pub last_reason: StockReason,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct StockState {
    warehouses: HashMap<WarehouseId, BTreeMap<ArticleId, StockRow>>,
    position: ProjectionPosition,
}

/// Per-warehouse stock list.
///
/// Each row mirrors the resulting quantity of the lot's latest movement, so
/// the view never does arithmetic of its own.
#[derive(Clone, Default)]
pub struct WarehouseStockView {
    state: Arc<RwLock<StockState>>,
}

impl WarehouseStockView {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock list of a warehouse, ordered by article.
    pub async fn stock_for(&self, warehouse: &WarehouseId) -> Vec<StockRow> {
        self.state
            .read()
            .await
            .warehouses
            .get(warehouse)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn get(&self, warehouse: &WarehouseId, article: &ArticleId) -> Option<StockRow> {
        self.state
            .read()
            .await
            .warehouses
            .get(warehouse)
            .and_then(|rows| rows.get(article))
            .cloned()
    }

    /// Units on hand across every article of a warehouse.
    pub async fn total_units(&self, warehouse: &WarehouseId) -> Quantity {
        self.state
            .read()
            .await
            .warehouses
            .get(warehouse)
            .map(|rows| rows.values().map(|row| row.quantity).sum())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Projection for WarehouseStockView {
    fn name(&self) -> &'static str {
        "WarehouseStockView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;

        if event.aggregate_type == InventoryLot::aggregate_type() {
            let movement: InventoryEvent = event
                .decode()
                .map_err(|e| ProjectionError::decode(&event.event_type, e))?;
            let data = movement.data();

            let rows = state.warehouses.entry(data.warehouse.clone()).or_default();
            let stale = rows
                .get(&data.article)
                .is_some_and(|row| row.version >= event.version);
            if !stale {
                rows.insert(
                    data.article.clone(),
                    StockRow {
                        lot_id: event.aggregate_id,
                        article: data.article.clone(),
                        quantity: data.resulting,
                        version: event.version,
                        last_reason: data.reason,
                        updated_at: data.at,
                    },
                );
            }
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.warehouses.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for WarehouseStockView {
    fn name(&self) -> &'static str {
        "WarehouseStockView"
    }

    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.warehouses.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DomainEvent, LotMovementData};

    fn movement(
        warehouse: &str,
        article: &str,
        version: i64,
        credit: bool,
        quantity: u64,
        resulting: u64,
    ) -> EventEnvelope {
        let warehouse = WarehouseId::new(warehouse);
        let article = ArticleId::new(article);
        let data = LotMovementData {
            warehouse: warehouse.clone(),
            article: article.clone(),
            quantity: Quantity::new(quantity),
            resulting: Quantity::new(resulting),
            reason: if credit {
                StockReason::Purchase
            } else {
                StockReason::Sale
            },
            reference: None,
            at: Utc::now(),
        };
        let event = if credit {
            InventoryEvent::LotCredited(data)
        } else {
            InventoryEvent::LotDebited(data)
        };
        EventEnvelope::builder()
            .aggregate_id(InventoryLot::id_for(&warehouse, &article))
            .aggregate_type(InventoryLot::aggregate_type())
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(&event)
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn rows_follow_resulting_quantity() {
        let view = WarehouseStockView::new();
        view.handle(&movement("ALM-1", "B", 1, true, 10, 10))
            .await
            .unwrap();
        view.handle(&movement("ALM-1", "A", 1, true, 4, 4))
            .await
            .unwrap();
        view.handle(&movement("ALM-1", "B", 2, false, 3, 7))
            .await
            .unwrap();

        let rows = view.stock_for(&WarehouseId::new("ALM-1")).await;
        let articles: Vec<_> = rows.iter().map(|r| r.article.as_str()).collect();
        assert_eq!(articles, ["A", "B"]);
        assert_eq!(rows[1].quantity, Quantity::new(7));
        assert_eq!(rows[1].last_reason, StockReason::Sale);
        assert_eq!(
            view.total_units(&WarehouseId::new("ALM-1")).await,
            Quantity::new(11)
        );
        assert_eq!(view.position().await.events_processed, 3);
    }

    #[tokio::test]
    async fn older_versions_do_not_overwrite() {
        let view = WarehouseStockView::new();
        view.handle(&movement("ALM-1", "A", 2, false, 1, 5))
            .await
            .unwrap();
        view.handle(&movement("ALM-1", "A", 1, true, 6, 6))
            .await
            .unwrap();

        let row = view
            .get(&WarehouseId::new("ALM-1"), &ArticleId::new("A"))
            .await
            .unwrap();
        assert_eq!(row.quantity, Quantity::new(5));
    }

    #[tokio::test]
    async fn other_streams_only_advance_position() {
        let view = WarehouseStockView::new();
        let other = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("CajaAccount")
            .event_type("CajaOpened")
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap();

        view.handle(&other).await.unwrap();

        assert!(ReadModel::is_empty(&view));
        assert_eq!(view.position().await.events_processed, 1);
    }

    #[tokio::test]
    async fn reset_clears_rows() {
        let view = WarehouseStockView::new();
        view.handle(&movement("ALM-2", "A", 1, true, 1, 1))
            .await
            .unwrap();

        view.reset().await.unwrap();

        assert!(view.stock_for(&WarehouseId::new("ALM-2")).await.is_empty());
        assert_eq!(view.position().await, ProjectionPosition::zero());
    }
}
