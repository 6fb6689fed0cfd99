//! Read models fed from the event stream.
//!
//! - [`Projection`] trait for folding events into read models
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - Two views: per-warehouse stock and the traspaso board

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{StockRow, TransferBoardView, TransferCard, WarehouseStockView};
