//! Document trait shared by every business transaction record.

use chrono::{DateTime, Utc};

use crate::error::{DomainError, DomainResult};
use crate::id::DocumentId;

/// Minimal interface of a persisted business document.
///
/// Documents are pure state machines: they decide which ledger effects a
/// transition implies but never perform IO. Persistence is keyed by
/// `(KIND, id)` and the reference is unique across all kinds.
pub trait Document {
    /// Stable kind tag used as storage discriminator (e.g. `"sale"`).
    const KIND: &'static str;

    fn id(&self) -> DocumentId;

    fn reference(&self) -> &str;

    /// Wire label of the current status.
    fn status_label(&self) -> &'static str;

    fn date(&self) -> DateTime<Utc>;

    /// Monotonically increasing version, bumped on every save.
    fn version(&self) -> u64;

    fn bump_version(&mut self);
}

/// Optimistic concurrency expectation for a document update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the document to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

impl From<Option<u64>> for ExpectedVersion {
    fn from(value: Option<u64>) -> Self {
        value.map_or(ExpectedVersion::Any, ExpectedVersion::Exact)
    }
}
