//! Stock ledger events.

use chrono::{DateTime, Utc};
use common::{ArticleId, Quantity, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events recorded on an inventory lot stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InventoryEvent {
    LotCredited(LotMovementData),
    LotDebited(LotMovementData),
}

impl InventoryEvent {
    pub fn data(&self) -> &LotMovementData {
        match self {
            InventoryEvent::LotCredited(data) | InventoryEvent::LotDebited(data) => data,
        }
    }
}

impl DomainEvent for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::LotCredited(_) => "LotCredited",
            InventoryEvent::LotDebited(_) => "LotDebited",
        }
    }
}

/// One movement of a lot, with the quantity left after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotMovementData {
    pub warehouse: WarehouseId,
    pub article: ArticleId,
    pub quantity: Quantity,
    pub resulting: Quantity,
    pub reason: StockReason,
    pub reference: Option<String>,
    pub at: DateTime<Utc>,
}

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    Sale,
    Purchase,
    Adjustment,
    TraspasoOut,
    TraspasoIn,
    TraspasoReturn,
}

impl StockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockReason::Sale => "sale",
            StockReason::Purchase => "purchase",
            StockReason::Adjustment => "adjustment",
            StockReason::TraspasoOut => "traspaso_out",
            StockReason::TraspasoIn => "traspaso_in",
            StockReason::TraspasoReturn => "traspaso_return",
        }
    }
}

impl std::fmt::Display for StockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested change to a lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub quantity: Quantity,
    pub reason: StockReason,
    pub reference: Option<String>,
}

impl StockMovement {
    pub fn new(quantity: Quantity, reason: StockReason) -> Self {
        Self {
            quantity,
            reason,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}
