//! Treasury domain module: cash receipts, payments, expenses and transfers
//! between company accounts.

pub mod cash;

pub use cash::{CashOperation, CashOperationKind, CashStatus, NewCashOperation};
