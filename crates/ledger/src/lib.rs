//! `stockbook-ledger`: balance and ledger records plus their mutation rules.
//!
//! Stock levels and account balances are the current-state tables; stock
//! movements and account movements are the append-only logs that must always
//! sum to them. Everything here is pure; the infrastructure layer locks rows
//! and persists what these functions return.

pub mod account;
pub mod consistency;
pub mod effect;
pub mod party;
pub mod stock;

pub use account::{
    AccountBalance, AccountMovement, AccountTransactionType, AccountType, MoneyLeg, MoneyPosting,
    reversals_for,
};
pub use effect::{LedgerEffect, inflows_first, net_outflows};
pub use party::{Party, PartyKind};
pub use stock::{GoodsChange, GoodsMovement, StockLevel, StockMovement, StockMovementType};
