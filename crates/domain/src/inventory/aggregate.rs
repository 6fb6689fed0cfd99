//! Inventory lot aggregate.

use chrono::Utc;
use common::{AggregateId, ArticleId, Quantity, WarehouseId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{InventoryError, InventoryEvent, LotMovementData, StockMovement};

/// Quantity on hand of one article at one warehouse.
///
/// The stream id is derived from the pair, so a lot that has never moved is
/// simply an empty stream holding zero units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryLot {
    id: Option<AggregateId>,
    #[serde(default)]
    version: Version,
    warehouse: Option<WarehouseId>,
    article: Option<ArticleId>,
    quantity: Quantity,
}

/// Read view of a lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub lot_id: AggregateId,
    pub warehouse: WarehouseId,
    pub article: ArticleId,
    pub quantity: Quantity,
    pub version: Version,
}

impl InventoryLot {
    /// Stable lot id for a warehouse and article.
    pub fn id_for(warehouse: &WarehouseId, article: &ArticleId) -> AggregateId {
        AggregateId::derive("inventory-lot", &[warehouse.as_str(), article.as_str()])
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn stock_level(&self, warehouse: &WarehouseId, article: &ArticleId) -> StockLevel {
        StockLevel {
            lot_id: Self::id_for(warehouse, article),
            warehouse: warehouse.clone(),
            article: article.clone(),
            quantity: self.quantity,
            version: self.version,
        }
    }

    /// Adds stock. Fails only on a zero quantity or numeric overflow.
    pub fn credit(
        &self,
        warehouse: &WarehouseId,
        article: &ArticleId,
        movement: StockMovement,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        Self::validate(warehouse, article, &movement)?;

        let resulting =
            self.quantity
                .checked_add(movement.quantity)
                .ok_or_else(|| InventoryError::Overflow {
                    warehouse: warehouse.clone(),
                    article: article.clone(),
                    quantity: movement.quantity,
                })?;

        Ok(vec![InventoryEvent::LotCredited(Self::movement_data(
            warehouse, article, movement, resulting,
        ))])
    }

    /// Removes stock, refusing to take the lot below zero.
    pub fn debit(
        &self,
        warehouse: &WarehouseId,
        article: &ArticleId,
        movement: StockMovement,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        Self::validate(warehouse, article, &movement)?;

        let resulting = self
            .quantity
            .checked_sub(movement.quantity)
            .ok_or_else(|| InventoryError::InsufficientStock {
                warehouse: warehouse.clone(),
                article: article.clone(),
                available: self.quantity,
                requested: movement.quantity,
            })?;

        Ok(vec![InventoryEvent::LotDebited(Self::movement_data(
            warehouse, article, movement, resulting,
        ))])
    }

    fn validate(
        warehouse: &WarehouseId,
        article: &ArticleId,
        movement: &StockMovement,
    ) -> Result<(), InventoryError> {
        if warehouse.is_blank() {
            return Err(InventoryError::MissingField("warehouse"));
        }
        if article.is_blank() {
            return Err(InventoryError::MissingField("article"));
        }
        if movement.quantity.is_zero() {
            return Err(InventoryError::ZeroQuantity);
        }
        Ok(())
    }

    fn movement_data(
        warehouse: &WarehouseId,
        article: &ArticleId,
        movement: StockMovement,
        resulting: Quantity,
    ) -> LotMovementData {
        LotMovementData {
            warehouse: warehouse.clone(),
            article: article.clone(),
            quantity: movement.quantity,
            resulting,
            reason: movement.reason,
            reference: movement.reference,
            at: Utc::now(),
        }
    }
}

impl Aggregate for InventoryLot {
    type Event = InventoryEvent;
    type Error = InventoryError;

    fn aggregate_type() -> &'static str {
        "InventoryLot"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        let data = match event {
            InventoryEvent::LotCredited(data) | InventoryEvent::LotDebited(data) => data,
        };
        if self.id.is_none() {
            self.id = Some(Self::id_for(&data.warehouse, &data.article));
            self.warehouse = Some(data.warehouse);
            self.article = Some(data.article);
        }
        self.quantity = data.resulting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::StockReason;

    fn keys() -> (WarehouseId, ArticleId) {
        (WarehouseId::new("ALM-1"), ArticleId::new("A"))
    }

    fn lot_with(units: u64) -> InventoryLot {
        let (warehouse, article) = keys();
        let mut lot = InventoryLot::default();
        let events = lot
            .credit(
                &warehouse,
                &article,
                StockMovement::new(Quantity::new(units), StockReason::Purchase),
            )
            .unwrap();
        lot.apply_events(events);
        lot
    }

    #[test]
    fn credit_then_debit() {
        let (warehouse, article) = keys();
        let mut lot = lot_with(10);
        let events = lot
            .debit(
                &warehouse,
                &article,
                StockMovement::new(Quantity::new(4), StockReason::Sale).with_reference("V-1"),
            )
            .unwrap();
        assert_eq!(events[0].data().resulting, Quantity::new(6));

        lot.apply_events(events);
        assert_eq!(lot.quantity(), Quantity::new(6));
        assert_eq!(lot.id(), Some(InventoryLot::id_for(&warehouse, &article)));
    }

    #[test]
    fn debit_below_zero_is_rejected() {
        let (warehouse, article) = keys();
        let lot = lot_with(2);
        let result = lot.debit(
            &warehouse,
            &article,
            StockMovement::new(Quantity::new(5), StockReason::Sale),
        );
        assert!(matches!(
            result,
            Err(InventoryError::InsufficientStock { available, requested, .. })
                if available == Quantity::new(2) && requested == Quantity::new(5)
        ));
    }

    #[test]
    fn unknown_lot_has_nothing_to_debit() {
        let (warehouse, article) = keys();
        let result = InventoryLot::default().debit(
            &warehouse,
            &article,
            StockMovement::new(Quantity::new(1), StockReason::Adjustment),
        );
        assert!(matches!(result, Err(InventoryError::InsufficientStock { .. })));
    }

    #[test]
    fn zero_and_overflow_are_validation_errors() {
        let (warehouse, article) = keys();
        let lot = lot_with(u64::MAX);
        assert!(matches!(
            lot.credit(
                &warehouse,
                &article,
                StockMovement::new(Quantity::zero(), StockReason::Purchase)
            ),
            Err(InventoryError::ZeroQuantity)
        ));
        assert!(matches!(
            lot.credit(
                &warehouse,
                &article,
                StockMovement::new(Quantity::new(1), StockReason::Purchase)
            ),
            Err(InventoryError::Overflow { .. })
        ));
    }
}
