//! Infrastructure layer: storage, the balance + ledger mutator, reference
//! generation, document orchestration, reporting and configuration.

pub mod config;
pub mod engine;
pub mod mutator;
pub mod reference;
pub mod reporting;
pub mod store;

#[cfg(test)]
mod integration_tests;
