//! Sales domain module.
//!
//! This crate contains business rules for sales documents, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Stock leaves the
//! zone when the sale is created; later transitions only move money or put
//! goods back.

pub mod sale;

pub use sale::{NewSale, SALE_REFERENCE, Sale, SaleItem, SaleLineInput, SaleStatus};
