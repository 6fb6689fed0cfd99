//! Shared value types for the caja and traspaso services.

mod money;
mod quantity;
mod types;

pub use money::{DEFAULT_PRECISION, Money, MoneyDisplay, MoneyParseError};
pub use quantity::Quantity;
pub use types::{AggregateId, ArticleId, BranchId, IdempotencyKey, OperatorId, WarehouseId};
