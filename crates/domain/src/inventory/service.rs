//! Inventory service for direct stock movements and lot queries.

use std::sync::Arc;

use common::{ArticleId, WarehouseId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::config::DomainConfig;
use crate::error::DomainError;

use super::{CreditStock, DebitStock, InventoryLot, StockLevel};

/// Service for sales, purchases and adjustments against inventory lots.
///
/// Transfer movements do not go through here; the traspaso workflow stages
/// them in its own batches.
#[derive(Clone)]
pub struct InventoryService {
    lots: CommandHandler<InventoryLot>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn EventStore>, config: &DomainConfig) -> Self {
        Self {
            lots: CommandHandler::new(store, config.max_conflict_retries),
        }
    }

    #[tracing::instrument(skip(self, cmd), fields(warehouse = %cmd.warehouse, article = %cmd.article, quantity = %cmd.movement.quantity))]
    pub async fn debit(&self, cmd: DebitStock) -> Result<CommandResult<InventoryLot>, DomainError> {
        let lot_id = cmd.aggregate_id();
        let result = self
            .lots
            .execute("lot.debit", lot_id, cmd.idempotency_key(), |lot| {
                lot.debit(&cmd.warehouse, &cmd.article, cmd.movement.clone())
            })
            .await
            .inspect_err(|error| tracing::warn!(%error, "stock debit rejected"))?;

        if !result.replayed {
            record_movement("debit", cmd.movement.reason.as_str());
        }
        Ok(result)
    }

    #[tracing::instrument(skip(self, cmd), fields(warehouse = %cmd.warehouse, article = %cmd.article, quantity = %cmd.movement.quantity))]
    pub async fn credit(
        &self,
        cmd: CreditStock,
    ) -> Result<CommandResult<InventoryLot>, DomainError> {
        let lot_id = cmd.aggregate_id();
        let result = self
            .lots
            .execute("lot.credit", lot_id, cmd.idempotency_key(), |lot| {
                lot.credit(&cmd.warehouse, &cmd.article, cmd.movement.clone())
            })
            .await
            .inspect_err(|error| tracing::warn!(%error, "stock credit rejected"))?;

        if !result.replayed {
            record_movement("credit", cmd.movement.reason.as_str());
        }
        Ok(result)
    }

    /// Current quantity of a lot; a lot that never moved holds zero.
    #[tracing::instrument(skip(self))]
    pub async fn get_lot(
        &self,
        warehouse: &WarehouseId,
        article: &ArticleId,
    ) -> Result<StockLevel, DomainError> {
        let lot = self.lots.load(InventoryLot::id_for(warehouse, article)).await?;
        Ok(lot.stock_level(warehouse, article))
    }
}

pub(crate) fn record_movement(direction: &'static str, reason: &'static str) {
    metrics::counter!("stock_movements_total", "direction" => direction, "reason" => reason)
        .increment(1);
}
