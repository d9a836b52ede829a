//! Document reference generation.
//!
//! References look like `SL-20240315-0007` (daily bucket) or `INV-2024-012`
//! (yearly bucket). The sequence comes from an atomic per-bucket counter in
//! the unit of work; a generated reference that is already taken (e.g. typed
//! in by hand earlier) is skipped, up to a bounded number of attempts.
//! A reference stays taken after its document is deleted as long as account
//! rows still carry it, since reversals look payments up by reference.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use stockbook_core::{DomainError, ReferenceFormat};

use crate::engine::EngineResult;
use crate::store::UnitOfWork;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceGenerator {
    max_attempts: u32,
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

impl ReferenceGenerator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Generate the next free reference for `format` in the bucket of `at`.
    #[instrument(skip(self, uow), fields(prefix = format.prefix), err)]
    pub async fn generate(
        &self,
        uow: &mut dyn UnitOfWork,
        scope: &str,
        format: ReferenceFormat,
        at: DateTime<Utc>,
    ) -> EngineResult<String> {
        let bucket = format.bucket_key(at);
        for attempt in 1..=self.max_attempts {
            let sequence = uow
                .next_reference_sequence(scope, format.prefix, &bucket)
                .await?;
            if sequence > format.max_sequence() {
                return Err(DomainError::reference_generation(format!(
                    "{}-{} is exhausted after {} references",
                    format.prefix,
                    bucket,
                    format.max_sequence()
                ))
                .into());
            }
            let reference = format.format(at, sequence);
            if !is_taken(uow, &reference).await? {
                return Ok(reference);
            }
            debug!(%reference, attempt, "reference already taken, retrying");
        }
        Err(DomainError::reference_generation(format!(
            "no free {}-{} reference after {} attempts",
            format.prefix, bucket, self.max_attempts
        ))
        .into())
    }

    /// Use the caller's reference if given (it must be unused), otherwise
    /// generate one.
    pub async fn resolve(
        &self,
        uow: &mut dyn UnitOfWork,
        scope: &str,
        format: ReferenceFormat,
        requested: Option<String>,
        at: DateTime<Utc>,
    ) -> EngineResult<String> {
        match requested.map(|r| r.trim().to_string()) {
            Some(reference) if !reference.is_empty() => {
                if is_taken(uow, &reference).await? {
                    return Err(DomainError::conflict(format!(
                        "reference {reference} is already used"
                    ))
                    .into());
                }
                Ok(reference)
            }
            _ => self.generate(uow, scope, format, at).await,
        }
    }
}

async fn is_taken(uow: &mut dyn UnitOfWork, reference: &str) -> EngineResult<bool> {
    if uow.reference_exists(reference).await? {
        return Ok(true);
    }
    Ok(!uow.account_movements_by_reference(reference).await?.is_empty())
}
