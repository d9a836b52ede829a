//! Balance and ledger storage boundary.
//!
//! A [`LedgerStore`] hands out [`UnitOfWork`]s. One unit of work is one
//! database transaction: every balance row it touches stays locked until it
//! commits or rolls back, so a balance mutation and its ledger row are always
//! written together or not at all.
//!
//! The read methods on [`LedgerStore`] take no locks and serve the query and
//! reporting layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockbook_core::{AccountId, Document, DocumentId, PartyId, ProductId, ZoneId};
use stockbook_ledger::{
    AccountBalance, AccountMovement, AccountTransactionType, Party, PartyKind, StockLevel,
    StockMovement, StockMovementType,
};

use crate::config::AppConfig;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

/// Storage failure.
///
/// These are infrastructure errors, as opposed to the business rule
/// violations carried by `DomainError`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("storage conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Pagination parameters for ledger queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of rows to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000),
            offset: offset.unwrap_or(0),
        }
    }

    /// Everything, for reporting scans.
    pub fn all() -> Self {
        Self {
            limit: u32::MAX,
            offset: 0,
        }
    }

    pub(crate) fn slice<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        rows.iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let has_more = total > u64::from(pagination.offset) + u64::from(pagination.limit);
        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pagination: self.pagination,
            has_more: self.has_more,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevelFilter {
    pub product_id: Option<ProductId>,
    pub zone_id: Option<ZoneId>,
}

impl StockLevelFilter {
    pub fn matches(&self, level: &StockLevel) -> bool {
        self.product_id.is_none_or(|p| p == level.product_id)
            && self.zone_id.is_none_or(|z| z == level.zone_id)
    }
}

/// Stock card query. Date bounds are `[from, to)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovementFilter {
    pub product_id: Option<ProductId>,
    pub zone_id: Option<ZoneId>,
    pub transaction_type: Option<StockMovementType>,
    pub reference: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl StockMovementFilter {
    pub fn matches(&self, m: &StockMovement) -> bool {
        self.product_id.is_none_or(|p| p == m.product_id)
            && self.zone_id.is_none_or(|z| z == m.zone_id)
            && self.transaction_type.is_none_or(|t| t == m.transaction_type)
            && self.reference.as_deref().is_none_or(|r| r == m.reference)
            && self.from.is_none_or(|from| m.date >= from)
            && self.to.is_none_or(|to| m.date < to)
    }
}

/// Account statement query. Date bounds are `[from, to)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMovementFilter {
    pub account_id: Option<AccountId>,
    pub transaction_type: Option<AccountTransactionType>,
    pub reference: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AccountMovementFilter {
    pub fn matches(&self, m: &AccountMovement) -> bool {
        self.account_id.is_none_or(|a| a == m.account_id)
            && self.transaction_type.is_none_or(|t| t == m.transaction_type)
            && self.reference.as_deref().is_none_or(|r| r == m.reference)
            && self.from.is_none_or(|from| m.date >= from)
            && self.to.is_none_or(|to| m.date < to)
    }
}

/// A document row: indexed columns plus the serialized document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub kind: String,
    pub id: DocumentId,
    pub reference: String,
    pub status: String,
    pub date: DateTime<Utc>,
    pub version: u64,
    pub body: JsonValue,
}

impl StoredDocument {
    pub fn encode<D: Document + Serialize>(document: &D) -> StoreResult<Self> {
        Ok(Self {
            kind: D::KIND.to_string(),
            id: document.id(),
            reference: document.reference().to_string(),
            status: document.status_label().to_string(),
            date: document.date(),
            version: document.version(),
            body: serde_json::to_value(document)?,
        })
    }

    pub fn decode<D: Document + DeserializeOwned>(&self) -> StoreResult<D> {
        if self.kind != D::KIND {
            return Err(StoreError::Corrupt(format!(
                "document {} is a {}, not a {}",
                self.id,
                self.kind,
                D::KIND
            )));
        }
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Lock-free reads plus the entry point for writes.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work (one transaction).
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;

    async fn stock_levels(&self, filter: &StockLevelFilter) -> StoreResult<Vec<StockLevel>>;

    /// Stock card rows ordered `(product, zone, -date)`.
    async fn stock_movements(
        &self,
        filter: &StockMovementFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<StockMovement>>;

    async fn accounts(&self) -> StoreResult<Vec<AccountBalance>>;

    async fn account(&self, id: AccountId) -> StoreResult<Option<AccountBalance>>;

    /// Account statement rows ordered `(account, -date)`.
    async fn account_movements(
        &self,
        filter: &AccountMovementFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<AccountMovement>>;

    async fn parties(&self, kind: Option<PartyKind>) -> StoreResult<Vec<Party>>;

    async fn document(&self, kind: &str, id: DocumentId) -> StoreResult<Option<StoredDocument>>;

    /// Documents of one kind, newest first.
    async fn documents(&self, kind: &str, pagination: Pagination)
    -> StoreResult<Page<StoredDocument>>;
}

/// Everything one document-level operation reads and writes, inside one
/// transaction. Dropping an uncommitted unit of work rolls it back.
#[async_trait::async_trait]
pub trait UnitOfWork: Send {
    /// Get-or-create the level at zero and lock it until commit.
    async fn lock_stock_level(
        &mut self,
        product_id: ProductId,
        zone_id: ZoneId,
        at: DateTime<Utc>,
    ) -> StoreResult<StockLevel>;

    /// Current quantity without locking; zero when no level exists.
    async fn stock_quantity(&mut self, product_id: ProductId, zone_id: ZoneId)
    -> StoreResult<Decimal>;

    async fn save_stock_level(&mut self, level: &StockLevel) -> StoreResult<()>;

    async fn append_stock_movement(&mut self, movement: &StockMovement) -> StoreResult<()>;

    async fn lock_account(&mut self, id: AccountId) -> StoreResult<Option<AccountBalance>>;

    async fn insert_account(&mut self, account: &AccountBalance) -> StoreResult<()>;

    async fn save_account(&mut self, account: &AccountBalance) -> StoreResult<()>;

    async fn append_account_movement(&mut self, movement: &AccountMovement) -> StoreResult<()>;

    /// Every account row carrying `reference`, oldest first.
    async fn account_movements_by_reference(
        &mut self,
        reference: &str,
    ) -> StoreResult<Vec<AccountMovement>>;

    async fn insert_party(&mut self, party: &Party) -> StoreResult<()>;

    async fn load_party(&mut self, id: PartyId) -> StoreResult<Option<Party>>;

    /// Atomically take the next sequence number for `(scope, prefix, bucket)`.
    async fn next_reference_sequence(
        &mut self,
        scope: &str,
        prefix: &str,
        bucket: &str,
    ) -> StoreResult<u32>;

    async fn reference_exists(&mut self, reference: &str) -> StoreResult<bool>;

    /// Load a document and lock it until commit.
    async fn load_document(
        &mut self,
        kind: &str,
        id: DocumentId,
    ) -> StoreResult<Option<StoredDocument>>;

    /// Insert or replace a document.
    async fn save_document(&mut self, document: &StoredDocument) -> StoreResult<()>;

    async fn delete_document(&mut self, kind: &str, id: DocumentId) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Open the store selected by `config`: Postgres when persistent stores are
/// enabled, in-memory otherwise.
pub async fn open_store(config: &AppConfig) -> StoreResult<Arc<dyn LedgerStore>> {
    match config.database_url.as_deref() {
        Some(url) if config.use_persistent_stores => {
            let store = PostgresLedgerStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            tracing::info!("using postgres ledger store");
            Ok(Arc::new(store))
        }
        _ => {
            if config.use_persistent_stores {
                tracing::warn!(
                    "USE_PERSISTENT_STORES=true but DATABASE_URL is not set, falling back to in-memory"
                );
            }
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_caps_the_limit() {
        let p = Pagination::new(Some(5000), None);
        assert_eq!(p.limit, 1000);
        assert_eq!(p.offset, 0);
        assert_eq!(Pagination::new(None, Some(3)).limit, 50);
    }

    #[test]
    fn page_reports_more_rows() {
        let page = Page::new(vec![1, 2], 5, Pagination::new(Some(2), Some(0)));
        assert!(page.has_more);
        let last = Page::new(vec![5], 5, Pagination::new(Some(2), Some(4)));
        assert!(!last.has_more);
    }

    #[test]
    fn slice_applies_offset_and_limit() {
        let rows = vec![1, 2, 3, 4, 5];
        assert_eq!(Pagination::new(Some(2), Some(1)).slice(&rows), vec![2, 3]);
        assert_eq!(Pagination::all().slice(&rows).len(), 5);
    }
}
