//! Read model views.

pub mod transfer_board;
pub mod warehouse_stock;

pub use transfer_board::{TransferBoardView, TransferCard};
pub use warehouse_stock::{StockRow, WarehouseStockView};
