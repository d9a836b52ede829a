//! Explicit request context passed into every document engine operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Who performs an operation and when.
///
/// Ledger rows and documents are stamped from this value; nothing in the core
/// reads the current user or the wall clock on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl ActorContext {
    pub fn new(user_id: UserId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            occurred_at,
        }
    }

    /// Actor context stamped with the current time.
    pub fn now(user_id: UserId) -> Self {
        Self::new(user_id, Utc::now())
    }
}
