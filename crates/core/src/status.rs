//! Closed status enums with explicit transition tables.
//!
//! Each document type declares its allowed edges through [`StatusMachine`].
//! [`plan_transition`] is the single place that classifies a requested status
//! change: re-entering the current status is [`Transition::Unchanged`] and
//! carries no side effects, so a ledger effect attached to an edge can only
//! ever fire once.

use crate::error::{DomainError, DomainResult};

/// Finite status set of one document type.
pub trait StatusMachine: Copy + Eq + core::fmt::Debug {
    /// Document kind used in error payloads (e.g. `"sale"`).
    const DOCUMENT: &'static str;

    /// Whether `self -> to` is an edge of the transition table.
    ///
    /// Identity transitions are handled by [`plan_transition`] and never reach this.
    fn can_transition(self, to: Self) -> bool;

    /// Wire label of the status.
    fn as_str(self) -> &'static str;

    /// Terminal statuses have no outgoing edges.
    fn is_terminal(self) -> bool;
}

/// Outcome of planning a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<S> {
    /// The document is already in the requested status. No effects apply.
    Unchanged(S),
    /// An allowed edge will be taken.
    Moved { from: S, to: S },
}

impl<S: StatusMachine> Transition<S> {
    /// True when the transition enters `status` from a different one.
    pub fn enters(&self, status: S) -> bool {
        matches!(self, Transition::Moved { to, .. } if *to == status)
    }

    pub fn target(&self) -> S {
        match self {
            Transition::Unchanged(s) => *s,
            Transition::Moved { to, .. } => *to,
        }
    }
}

/// Classify `from -> to` against the transition table of `S`.
pub fn plan_transition<S: StatusMachine>(from: S, to: S) -> DomainResult<Transition<S>> {
    if from == to {
        return Ok(Transition::Unchanged(from));
    }
    if from.is_terminal() || !from.can_transition(to) {
        return Err(DomainError::invalid_transition(
            S::DOCUMENT,
            from.as_str(),
            to.as_str(),
        ));
    }
    Ok(Transition::Moved { from, to })
}
