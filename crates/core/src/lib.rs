//! `stockbook-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod actor;
pub mod document;
pub mod error;
pub mod id;
pub mod payment;
pub mod reference;
pub mod status;

pub use actor::ActorContext;
pub use document::{Document, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{
    AccountId, DocumentId, EntryId, LineId, MovementId, PartyId, ProductId, UserId, ZoneId,
};
pub use payment::{PaymentStatus, PaymentSummary};
pub use reference::{ReferenceBucket, ReferenceFormat};
pub use status::{StatusMachine, Transition, plan_transition};
