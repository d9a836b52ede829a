//! Inventory domain module: stock transfers between zones and physical counts.
//!
//! This crate contains business rules for inventory documents, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod count;
pub mod transfer;

pub use count::{COUNT_REFERENCE, CountItem, CountLineInput, CountStatus, InventoryCount, NewCount};
pub use transfer::{
    NewTransfer, StockTransfer, TRANSFER_REFERENCE, TransferItem, TransferLineInput, TransferStatus,
};
