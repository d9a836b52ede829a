use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockbook_core::{AccountId, DocumentId, PartyId, ProductId, ZoneId};
use stockbook_ledger::{AccountBalance, AccountMovement, Party, PartyKind, StockLevel, StockMovement};

use super::{
    AccountMovementFilter, LedgerStore, Page, Pagination, StockLevelFilter, StockMovementFilter,
    StoreError, StoreResult, StoredDocument, UnitOfWork,
};

type CounterKey = (String, String, String);
type DocumentKey = (String, DocumentId);

#[derive(Debug, Default)]
struct Tables {
    stock_levels: HashMap<(ProductId, ZoneId), StockLevel>,
    stock_movements: Vec<StockMovement>,
    accounts: HashMap<AccountId, AccountBalance>,
    account_movements: Vec<AccountMovement>,
    parties: HashMap<PartyId, Party>,
    reference_counters: HashMap<CounterKey, u32>,
    documents: HashMap<DocumentKey, StoredDocument>,
}

/// Prior value of a row touched by a unit of work.
#[derive(Debug)]
enum Undo {
    StockLevel((ProductId, ZoneId), Option<StockLevel>),
    Account(AccountId, Option<AccountBalance>),
    Party(PartyId, Option<Party>),
    Counter(CounterKey, Option<u32>),
    Document(DocumentKey, Option<StoredDocument>),
}

fn restore<K: std::hash::Hash + Eq, V>(map: &mut HashMap<K, V>, key: K, prior: Option<V>) {
    match prior {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

/// In-memory balance and ledger store.
///
/// Intended for tests/dev. A unit of work holds the single table lock for its
/// whole lifetime, which serializes writers the way row locks would.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let guard = self.tables.clone().lock_owned().await;
        let stock_movements_len = guard.stock_movements.len();
        let account_movements_len = guard.account_movements.len();
        Ok(Box::new(InMemoryUnitOfWork {
            tables: guard,
            undo: Vec::new(),
            stock_movements_len,
            account_movements_len,
            finished: false,
        }))
    }

    async fn stock_levels(&self, filter: &StockLevelFilter) -> StoreResult<Vec<StockLevel>> {
        let tables = self.tables.lock().await;
        let mut levels: Vec<StockLevel> = tables
            .stock_levels
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        levels.sort_by_key(|l| (l.product_id, l.zone_id));
        Ok(levels)
    }

    async fn stock_movements(
        &self,
        filter: &StockMovementFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<StockMovement>> {
        let tables = self.tables.lock().await;
        // Reverse insertion order first so equal dates keep newest-first.
        let mut rows: Vec<StockMovement> = tables
            .stock_movements
            .iter()
            .rev()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.product_id, a.zone_id)
                .cmp(&(b.product_id, b.zone_id))
                .then(b.date.cmp(&a.date))
        });
        Ok(Page::new(pagination.slice(&rows), rows.len() as u64, pagination))
    }

    async fn accounts(&self) -> StoreResult<Vec<AccountBalance>> {
        let tables = self.tables.lock().await;
        let mut accounts: Vec<AccountBalance> = tables.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn account(&self, id: AccountId) -> StoreResult<Option<AccountBalance>> {
        Ok(self.tables.lock().await.accounts.get(&id).cloned())
    }

    async fn account_movements(
        &self,
        filter: &AccountMovementFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<AccountMovement>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<AccountMovement> = tables
            .account_movements
            .iter()
            .rev()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.account_id.cmp(&b.account_id).then(b.date.cmp(&a.date)));
        Ok(Page::new(pagination.slice(&rows), rows.len() as u64, pagination))
    }

    async fn parties(&self, kind: Option<PartyKind>) -> StoreResult<Vec<Party>> {
        let tables = self.tables.lock().await;
        let mut parties: Vec<Party> = tables
            .parties
            .values()
            .filter(|p| kind.is_none_or(|k| k == p.kind))
            .cloned()
            .collect();
        parties.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(parties)
    }

    async fn document(&self, kind: &str, id: DocumentId) -> StoreResult<Option<StoredDocument>> {
        let tables = self.tables.lock().await;
        Ok(tables.documents.get(&(kind.to_string(), id)).cloned())
    }

    async fn documents(
        &self,
        kind: &str,
        pagination: Pagination,
    ) -> StoreResult<Page<StoredDocument>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<StoredDocument> = tables
            .documents
            .values()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.reference.cmp(&a.reference)));
        Ok(Page::new(pagination.slice(&rows), rows.len() as u64, pagination))
    }
}

/// Unit of work over the in-memory tables.
///
/// Every row it overwrites is journaled first; rollback replays the journal
/// backwards and truncates the ledgers to their length at `begin`.
pub struct InMemoryUnitOfWork {
    tables: OwnedMutexGuard<Tables>,
    undo: Vec<Undo>,
    stock_movements_len: usize,
    account_movements_len: usize,
    finished: bool,
}

impl InMemoryUnitOfWork {
    fn undo_all(&mut self) {
        let tables = &mut *self.tables;
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::StockLevel(key, prior) => restore(&mut tables.stock_levels, key, prior),
                Undo::Account(key, prior) => restore(&mut tables.accounts, key, prior),
                Undo::Party(key, prior) => restore(&mut tables.parties, key, prior),
                Undo::Counter(key, prior) => restore(&mut tables.reference_counters, key, prior),
                Undo::Document(key, prior) => restore(&mut tables.documents, key, prior),
            }
        }
        tables.stock_movements.truncate(self.stock_movements_len);
        tables.account_movements.truncate(self.account_movements_len);
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            self.undo_all();
        }
    }
}

#[async_trait::async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_stock_level(
        &mut self,
        product_id: ProductId,
        zone_id: ZoneId,
        at: DateTime<Utc>,
    ) -> StoreResult<StockLevel> {
        let key = (product_id, zone_id);
        if let Some(level) = self.tables.stock_levels.get(&key) {
            return Ok(level.clone());
        }
        let level = StockLevel::empty(product_id, zone_id, at);
        self.undo.push(Undo::StockLevel(key, None));
        self.tables.stock_levels.insert(key, level.clone());
        Ok(level)
    }

    async fn stock_quantity(
        &mut self,
        product_id: ProductId,
        zone_id: ZoneId,
    ) -> StoreResult<Decimal> {
        Ok(self
            .tables
            .stock_levels
            .get(&(product_id, zone_id))
            .map(|l| l.quantity)
            .unwrap_or(Decimal::ZERO))
    }

    async fn save_stock_level(&mut self, level: &StockLevel) -> StoreResult<()> {
        let key = (level.product_id, level.zone_id);
        let prior = self.tables.stock_levels.insert(key, level.clone());
        self.undo.push(Undo::StockLevel(key, prior));
        Ok(())
    }

    async fn append_stock_movement(&mut self, movement: &StockMovement) -> StoreResult<()> {
        self.tables.stock_movements.push(movement.clone());
        Ok(())
    }

    async fn lock_account(&mut self, id: AccountId) -> StoreResult<Option<AccountBalance>> {
        Ok(self.tables.accounts.get(&id).cloned())
    }

    async fn insert_account(&mut self, account: &AccountBalance) -> StoreResult<()> {
        if self.tables.accounts.contains_key(&account.id) {
            return Err(StoreError::Conflict(format!("account {} already exists", account.id)));
        }
        self.tables.accounts.insert(account.id, account.clone());
        self.undo.push(Undo::Account(account.id, None));
        Ok(())
    }

    async fn save_account(&mut self, account: &AccountBalance) -> StoreResult<()> {
        let prior = self.tables.accounts.insert(account.id, account.clone());
        if prior.is_none() {
            self.tables.accounts.remove(&account.id);
            return Err(StoreError::Corrupt(format!("account {} does not exist", account.id)));
        }
        self.undo.push(Undo::Account(account.id, prior));
        Ok(())
    }

    async fn append_account_movement(&mut self, movement: &AccountMovement) -> StoreResult<()> {
        self.tables.account_movements.push(movement.clone());
        Ok(())
    }

    async fn account_movements_by_reference(
        &mut self,
        reference: &str,
    ) -> StoreResult<Vec<AccountMovement>> {
        Ok(self
            .tables
            .account_movements
            .iter()
            .filter(|m| m.reference == reference)
            .cloned()
            .collect())
    }

    async fn insert_party(&mut self, party: &Party) -> StoreResult<()> {
        if self.tables.parties.contains_key(&party.id) {
            return Err(StoreError::Conflict(format!("party {} already exists", party.id)));
        }
        self.tables.parties.insert(party.id, party.clone());
        self.undo.push(Undo::Party(party.id, None));
        Ok(())
    }

    async fn load_party(&mut self, id: PartyId) -> StoreResult<Option<Party>> {
        Ok(self.tables.parties.get(&id).cloned())
    }

    async fn next_reference_sequence(
        &mut self,
        scope: &str,
        prefix: &str,
        bucket: &str,
    ) -> StoreResult<u32> {
        let key = (scope.to_string(), prefix.to_string(), bucket.to_string());
        let prior = self.tables.reference_counters.get(&key).copied();
        let next = prior.unwrap_or(0) + 1;
        self.tables.reference_counters.insert(key.clone(), next);
        self.undo.push(Undo::Counter(key, prior));
        Ok(next)
    }

    async fn reference_exists(&mut self, reference: &str) -> StoreResult<bool> {
        Ok(self.tables.documents.values().any(|d| d.reference == reference))
    }

    async fn load_document(
        &mut self,
        kind: &str,
        id: DocumentId,
    ) -> StoreResult<Option<StoredDocument>> {
        Ok(self.tables.documents.get(&(kind.to_string(), id)).cloned())
    }

    async fn save_document(&mut self, document: &StoredDocument) -> StoreResult<()> {
        let key = (document.kind.clone(), document.id);
        if self
            .tables
            .documents
            .iter()
            .any(|(k, d)| *k != key && d.reference == document.reference)
        {
            return Err(StoreError::Conflict(format!(
                "reference {} is already used",
                document.reference
            )));
        }
        let prior = self.tables.documents.insert(key.clone(), document.clone());
        self.undo.push(Undo::Document(key, prior));
        Ok(())
    }

    async fn delete_document(&mut self, kind: &str, id: DocumentId) -> StoreResult<()> {
        let key = (kind.to_string(), id);
        if let Some(prior) = self.tables.documents.remove(&key) {
            self.undo.push(Undo::Document(key, Some(prior)));
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.finished = true;
        self.undo.clear();
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.undo_all();
        self.finished = true;
        Ok(())
    }
}
