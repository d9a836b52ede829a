//! Human-readable document reference formats.
//!
//! Two shapes exist: `PREFIX-YYYYMMDD-NNNN` (daily bucket, 4-digit sequence)
//! and `PREFIX-YYYY-NNN` (yearly bucket, 3-digit sequence). Allocation of the
//! sequence number itself is an infrastructure concern.

use chrono::{DateTime, Datelike, Utc};

/// Period a sequence counter restarts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceBucket {
    Daily,
    Yearly,
}

/// Prefix + bucket of one document family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceFormat {
    pub prefix: &'static str,
    pub bucket: ReferenceBucket,
}

impl ReferenceFormat {
    pub const fn daily(prefix: &'static str) -> Self {
        Self {
            prefix,
            bucket: ReferenceBucket::Daily,
        }
    }

    pub const fn yearly(prefix: &'static str) -> Self {
        Self {
            prefix,
            bucket: ReferenceBucket::Yearly,
        }
    }

    /// Bucket key for `at`: `YYYYMMDD` or `YYYY`.
    pub fn bucket_key(&self, at: DateTime<Utc>) -> String {
        match self.bucket {
            ReferenceBucket::Daily => at.format("%Y%m%d").to_string(),
            ReferenceBucket::Yearly => format!("{:04}", at.year()),
        }
    }

    /// Largest sequence number the format can print.
    pub fn max_sequence(&self) -> u32 {
        match self.bucket {
            ReferenceBucket::Daily => 9_999,
            ReferenceBucket::Yearly => 999,
        }
    }

    pub fn format(&self, at: DateTime<Utc>, sequence: u32) -> String {
        let bucket = self.bucket_key(at);
        match self.bucket {
            ReferenceBucket::Daily => format!("{}-{}-{:04}", self.prefix, bucket, sequence),
            ReferenceBucket::Yearly => format!("{}-{}-{:03}", self.prefix, bucket, sequence),
        }
    }
}
