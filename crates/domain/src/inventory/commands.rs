//! Stock movement commands.

use common::{AggregateId, ArticleId, IdempotencyKey, Quantity, WarehouseId};

use crate::command::Command;

use super::{InventoryLot, StockMovement, StockReason};

macro_rules! stock_command {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            pub warehouse: WarehouseId,
            pub article: ArticleId,
            pub movement: StockMovement,
            pub idempotency_key: Option<IdempotencyKey>,
        }

        impl $name {
            pub fn new(
                warehouse: impl Into<WarehouseId>,
                article: impl Into<ArticleId>,
                quantity: Quantity,
                reason: StockReason,
            ) -> Self {
                Self {
                    warehouse: warehouse.into(),
                    article: article.into(),
                    movement: StockMovement::new(quantity, reason),
                    idempotency_key: None,
                }
            }

            pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
                self.movement = self.movement.with_reference(reference);
                self
            }

            pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
                self.idempotency_key = Some(key.into());
                self
            }
        }

        impl Command for $name {
            type Aggregate = InventoryLot;

            fn aggregate_id(&self) -> AggregateId {
                InventoryLot::id_for(&self.warehouse, &self.article)
            }

            fn idempotency_key(&self) -> Option<&IdempotencyKey> {
                self.idempotency_key.as_ref()
            }
        }
    };
}

stock_command!(
    /// Command to remove stock from a lot.
    DebitStock
);

stock_command!(
    /// Command to add stock to a lot.
    CreditStock
);
