//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::{ProductId, ZoneId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Every variant
/// aborts the enclosing unit of work; none is recoverable inside the core.
/// Storage failures belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (duplicate reference, stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A goods-out movement would drive a stock level below zero.
    #[error(
        "insufficient stock for product {product_id} in zone {zone_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        zone_id: ZoneId,
        available: Decimal,
        requested: Decimal,
    },

    /// The bucketed reference sequence was exhausted or raced beyond the retry budget.
    #[error("reference generation failed: {0}")]
    ReferenceGeneration(String),

    /// A movement needs an account that does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The document's current status does not permit the requested operation.
    #[error("invalid state transition for {document}: {from} -> {to}")]
    InvalidStateTransition {
        document: &'static str,
        from: String,
        to: String,
    },

    /// A derived aggregate does not match its defining sum.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn reference_generation(msg: impl Into<String>) -> Self {
        Self::ReferenceGeneration(msg.into())
    }

    pub fn account_not_found(msg: impl Into<String>) -> Self {
        Self::AccountNotFound(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::ConsistencyViolation(msg.into())
    }

    pub fn invalid_transition(
        document: &'static str,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InvalidStateTransition {
            document,
            from: from.into(),
            to: to.into(),
        }
    }

    /// Stable machine-readable code, used by the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::ReferenceGeneration(_) => "reference_generation_failed",
            DomainError::AccountNotFound(_) => "account_not_found",
            DomainError::InvalidStateTransition { .. } => "invalid_state_transition",
            DomainError::ConsistencyViolation(_) => "consistency_violation",
        }
    }
}
