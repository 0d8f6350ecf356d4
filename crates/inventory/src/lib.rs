//! Inventory domain module.
//!
//! Categories, the stock-carrying `Supply` aggregate, the stock ledger and the
//! low-stock rule, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage).

pub mod category;
pub mod low_stock;
pub mod supply;
pub mod transaction;

pub use category::Category;
pub use low_stock::{low_stock_alert, LowStockAlert};
pub use supply::{
    AdjustStock, CreateSupply, IssueStock, ReceiveStock, StockStatus, Supply, SupplyCommand,
    SupplyCreated, SupplyDetails, SupplyEvent, StockMovement, UpdateSupply, DEFAULT_LOCATION,
    DEFAULT_MIN_STOCK_LEVEL, DEFAULT_UNIT, MAX_COST_PER_UNIT_CENTS,
};
pub use transaction::{InventoryTransaction, TransactionKind};
