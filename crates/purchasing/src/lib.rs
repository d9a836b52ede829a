//! Purchasing domain module (stock supplies).
//!
//! This crate contains business rules for procurement receipts, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod supply;

pub use supply::{NewSupply, SUPPLY_REFERENCE, Supply, SupplyItem, SupplyLineInput, SupplyStatus};
