//! Postgres-backed balance and ledger store.
//!
//! ## Locking
//!
//! Each unit of work is one transaction. Balance rows are locked with
//! `SELECT ... FOR UPDATE` (stock levels are first created at zero with
//! `INSERT ... ON CONFLICT DO NOTHING`), so concurrent writers touching the
//! same `(product, zone)` or account are serialized until commit. Reference
//! counters are bumped with a single `INSERT ... ON CONFLICT DO UPDATE ...
//! RETURNING`, which takes the counter row lock.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key / check violation) | `23503` / `23514` | `Corrupt` |
//! | Database (other), PoolClosed, Other | N/A | `Backend` |

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use stockbook_core::{
    AccountId, DocumentId, EntryId, MovementId, PartyId, ProductId, UserId, ZoneId,
};
use stockbook_ledger::{
    AccountBalance, AccountMovement, AccountTransactionType, AccountType, Party, PartyKind,
    StockLevel, StockMovement, StockMovementType,
};

use super::{
    AccountMovementFilter, LedgerStore, Page, Pagination, StockLevelFilter, StockMovementFilter,
    StoreError, StoreResult, StoredDocument, UnitOfWork,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stock_levels (
    product_id UUID NOT NULL,
    zone_id UUID NOT NULL,
    quantity NUMERIC NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (product_id, zone_id)
);

CREATE TABLE IF NOT EXISTS stock_movements (
    seq BIGSERIAL PRIMARY KEY,
    id UUID NOT NULL UNIQUE,
    product_id UUID NOT NULL,
    zone_id UUID NOT NULL,
    date TIMESTAMPTZ NOT NULL,
    transaction_type TEXT NOT NULL,
    reference TEXT NOT NULL,
    quantity_in NUMERIC NOT NULL CHECK (quantity_in >= 0),
    quantity_out NUMERIC NOT NULL CHECK (quantity_out >= 0),
    balance_after NUMERIC NOT NULL,
    notes TEXT,
    created_by UUID NOT NULL
);
CREATE INDEX IF NOT EXISTS stock_movements_card_idx
    ON stock_movements (product_id, zone_id, date DESC);
CREATE INDEX IF NOT EXISTS stock_movements_reference_idx ON stock_movements (reference);

CREATE TABLE IF NOT EXISTS accounts (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    account_type TEXT NOT NULL,
    currency TEXT NOT NULL,
    current_balance NUMERIC NOT NULL DEFAULT 0,
    owner UUID,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS account_movements (
    seq BIGSERIAL PRIMARY KEY,
    id UUID NOT NULL UNIQUE,
    entry_id UUID NOT NULL,
    account_id UUID NOT NULL REFERENCES accounts (id),
    date TIMESTAMPTZ NOT NULL,
    transaction_type TEXT NOT NULL,
    reference TEXT NOT NULL,
    debit NUMERIC NOT NULL CHECK (debit >= 0),
    credit NUMERIC NOT NULL CHECK (credit >= 0),
    balance NUMERIC NOT NULL,
    notes TEXT,
    created_by UUID NOT NULL
);
CREATE INDEX IF NOT EXISTS account_movements_statement_idx
    ON account_movements (account_id, date DESC);
CREATE INDEX IF NOT EXISTS account_movements_reference_idx ON account_movements (reference);

CREATE TABLE IF NOT EXISTS parties (
    id UUID PRIMARY KEY,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    account_id UUID NOT NULL UNIQUE REFERENCES accounts (id),
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS reference_counters (
    scope TEXT NOT NULL,
    prefix TEXT NOT NULL,
    bucket TEXT NOT NULL,
    last_value INTEGER NOT NULL,
    PRIMARY KEY (scope, prefix, bucket)
);

CREATE TABLE IF NOT EXISTS documents (
    kind TEXT NOT NULL,
    id UUID NOT NULL,
    reference TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL,
    date TIMESTAMPTZ NOT NULL,
    version BIGINT NOT NULL,
    body JSONB NOT NULL,
    PRIMARY KEY (kind, id)
);
CREATE INDEX IF NOT EXISTS documents_kind_date_idx ON documents (kind, date DESC);
"#;

const STOCK_MOVEMENT_COLUMNS: &str = "id, product_id, zone_id, date, transaction_type, reference, \
     quantity_in, quantity_out, balance_after, notes, created_by";

const ACCOUNT_COLUMNS: &str =
    "id, name, account_type, currency, current_balance, owner, created_at, updated_at";

const ACCOUNT_MOVEMENT_COLUMNS: &str = "id, entry_id, account_id, date, transaction_type, \
     reference, debit, credit, balance, notes, created_by";

const DOCUMENT_COLUMNS: &str = "kind, id, reference, status, date, version, body";

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the schema if it does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }

    #[instrument(skip(self), err)]
    async fn stock_levels(&self, filter: &StockLevelFilter) -> StoreResult<Vec<StockLevel>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, zone_id, quantity, updated_at
            FROM stock_levels
            WHERE ($1::uuid IS NULL OR product_id = $1)
                AND ($2::uuid IS NULL OR zone_id = $2)
            ORDER BY product_id, zone_id
            "#,
        )
        .bind(filter.product_id.map(|id| *id.as_uuid()))
        .bind(filter.zone_id.map(|id| *id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_levels", e))?;

        decode_rows::<StockLevelRow, _>(&rows)
    }

    #[instrument(skip(self), fields(row_count), err)]
    async fn stock_movements(
        &self,
        filter: &StockMovementFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<StockMovement>> {
        let where_clause = r#"
            WHERE ($1::uuid IS NULL OR product_id = $1)
                AND ($2::uuid IS NULL OR zone_id = $2)
                AND ($3::text IS NULL OR transaction_type = $3)
                AND ($4::text IS NULL OR reference = $4)
                AND ($5::timestamptz IS NULL OR date >= $5)
                AND ($6::timestamptz IS NULL OR date < $6)
        "#;

        let count_row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM stock_movements {where_clause}"
        ))
        .bind(filter.product_id.map(|id| *id.as_uuid()))
        .bind(filter.zone_id.map(|id| *id.as_uuid()))
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.reference.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_stock_movements", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Corrupt(format!("failed to read count: {e}")))?;

        let rows = sqlx::query(&format!(
            "SELECT {STOCK_MOVEMENT_COLUMNS} FROM stock_movements {where_clause} \
             ORDER BY product_id, zone_id, date DESC, seq DESC LIMIT $7 OFFSET $8"
        ))
        .bind(filter.product_id.map(|id| *id.as_uuid()))
        .bind(filter.zone_id.map(|id| *id.as_uuid()))
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.reference.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_movements", e))?;

        let items = decode_rows::<StockMovementRow, _>(&rows)?;
        Span::current().record("row_count", items.len());
        Ok(Page::new(items, total as u64, pagination))
    }

    #[instrument(skip(self), err)]
    async fn accounts(&self) -> StoreResult<Vec<AccountBalance>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts", e))?;
        decode_rows::<AccountRow, _>(&rows)
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn account(&self, id: AccountId) -> StoreResult<Option<AccountBalance>> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("account", e))?;
        row.as_ref().map(decode_row::<AccountRow, _>).transpose()
    }

    #[instrument(skip(self), fields(row_count), err)]
    async fn account_movements(
        &self,
        filter: &AccountMovementFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<AccountMovement>> {
        let where_clause = r#"
            WHERE ($1::uuid IS NULL OR account_id = $1)
                AND ($2::text IS NULL OR transaction_type = $2)
                AND ($3::text IS NULL OR reference = $3)
                AND ($4::timestamptz IS NULL OR date >= $4)
                AND ($5::timestamptz IS NULL OR date < $5)
        "#;

        let count_row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM account_movements {where_clause}"
        ))
        .bind(filter.account_id.map(|id| *id.as_uuid()))
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.reference.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_account_movements", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Corrupt(format!("failed to read count: {e}")))?;

        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_MOVEMENT_COLUMNS} FROM account_movements {where_clause} \
             ORDER BY account_id, date DESC, seq DESC LIMIT $6 OFFSET $7"
        ))
        .bind(filter.account_id.map(|id| *id.as_uuid()))
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.reference.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("account_movements", e))?;

        let items = decode_rows::<AccountMovementRow, _>(&rows)?;
        Span::current().record("row_count", items.len());
        Ok(Page::new(items, total as u64, pagination))
    }

    #[instrument(skip(self), err)]
    async fn parties(&self, kind: Option<PartyKind>) -> StoreResult<Vec<Party>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, name, account_id, created_at
            FROM parties
            WHERE ($1::text IS NULL OR kind = $1)
            ORDER BY name, id
            "#,
        )
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("parties", e))?;
        decode_rows::<PartyRow, _>(&rows)
    }

    #[instrument(skip(self), fields(document_id = %id), err)]
    async fn document(&self, kind: &str, id: DocumentId) -> StoreResult<Option<StoredDocument>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE kind = $1 AND id = $2"
        ))
        .bind(kind)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("document", e))?;
        row.as_ref().map(decode_row::<DocumentRow, _>).transpose()
    }

    #[instrument(skip(self), err)]
    async fn documents(
        &self,
        kind: &str,
        pagination: Pagination,
    ) -> StoreResult<Page<StoredDocument>> {
        let count_row = sqlx::query("SELECT COUNT(*) AS total FROM documents WHERE kind = $1")
            .bind(kind)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_documents", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Corrupt(format!("failed to read count: {e}")))?;

        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE kind = $1 \
             ORDER BY date DESC, reference DESC LIMIT $2 OFFSET $3"
        ))
        .bind(kind)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("documents", e))?;

        Ok(Page::new(
            decode_rows::<DocumentRow, _>(&rows)?,
            total as u64,
            pagination,
        ))
    }
}

/// One transaction. Dropping it without `commit` rolls back.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    #[instrument(skip(self), err)]
    async fn lock_stock_level(
        &mut self,
        product_id: ProductId,
        zone_id: ZoneId,
        at: DateTime<Utc>,
    ) -> StoreResult<StockLevel> {
        sqlx::query(
            r#"
            INSERT INTO stock_levels (product_id, zone_id, quantity, updated_at)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (product_id, zone_id) DO NOTHING
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(zone_id.as_uuid())
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("create_stock_level", e))?;

        let row = sqlx::query(
            r#"
            SELECT product_id, zone_id, quantity, updated_at
            FROM stock_levels
            WHERE product_id = $1 AND zone_id = $2
            FOR UPDATE
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(zone_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_stock_level", e))?;
        decode_row::<StockLevelRow, _>(&row)
    }

    async fn stock_quantity(
        &mut self,
        product_id: ProductId,
        zone_id: ZoneId,
    ) -> StoreResult<Decimal> {
        let row = sqlx::query(
            "SELECT quantity FROM stock_levels WHERE product_id = $1 AND zone_id = $2",
        )
        .bind(product_id.as_uuid())
        .bind(zone_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("stock_quantity", e))?;
        match row {
            Some(row) => row
                .try_get("quantity")
                .map_err(|e| StoreError::Corrupt(format!("failed to read quantity: {e}"))),
            None => Ok(Decimal::ZERO),
        }
    }

    async fn save_stock_level(&mut self, level: &StockLevel) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stock_levels
            SET quantity = $3, updated_at = $4
            WHERE product_id = $1 AND zone_id = $2
            "#,
        )
        .bind(level.product_id.as_uuid())
        .bind(level.zone_id.as_uuid())
        .bind(level.quantity)
        .bind(level.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_stock_level", e))?;
        expect_one_row(result.rows_affected(), "stock level")
    }

    async fn append_stock_movement(&mut self, movement: &StockMovement) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO stock_movements ({STOCK_MOVEMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.zone_id.as_uuid())
        .bind(movement.date)
        .bind(movement.transaction_type.as_str())
        .bind(&movement.reference)
        .bind(movement.quantity_in)
        .bind(movement.quantity_out)
        .bind(movement.balance_after)
        .bind(movement.notes.as_deref())
        .bind(movement.created_by.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_stock_movement", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn lock_account(&mut self, id: AccountId) -> StoreResult<Option<AccountBalance>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_account", e))?;
        row.as_ref().map(decode_row::<AccountRow, _>).transpose()
    }

    async fn insert_account(&mut self, account: &AccountBalance) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO accounts ({ACCOUNT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(account.id.as_uuid())
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(&account.currency)
        .bind(account.current_balance)
        .bind(account.owner.map(|o| *o.as_uuid()))
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    async fn save_account(&mut self, account: &AccountBalance) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE accounts SET current_balance = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(account.id.as_uuid())
        .bind(account.current_balance)
        .bind(account.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_account", e))?;
        expect_one_row(result.rows_affected(), "account")
    }

    async fn append_account_movement(&mut self, movement: &AccountMovement) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO account_movements ({ACCOUNT_MOVEMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(movement.id.as_uuid())
        .bind(movement.entry_id.as_uuid())
        .bind(movement.account_id.as_uuid())
        .bind(movement.date)
        .bind(movement.transaction_type.as_str())
        .bind(&movement.reference)
        .bind(movement.debit)
        .bind(movement.credit)
        .bind(movement.balance)
        .bind(movement.notes.as_deref())
        .bind(movement.created_by.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_account_movement", e))?;
        Ok(())
    }

    async fn account_movements_by_reference(
        &mut self,
        reference: &str,
    ) -> StoreResult<Vec<AccountMovement>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_MOVEMENT_COLUMNS} FROM account_movements \
             WHERE reference = $1 ORDER BY seq"
        ))
        .bind(reference)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("account_movements_by_reference", e))?;
        decode_rows::<AccountMovementRow, _>(&rows)
    }

    async fn insert_party(&mut self, party: &Party) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO parties (id, kind, name, account_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(party.id.as_uuid())
        .bind(party.kind.as_str())
        .bind(&party.name)
        .bind(party.account_id.as_uuid())
        .bind(party.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_party", e))?;
        Ok(())
    }

    async fn load_party(&mut self, id: PartyId) -> StoreResult<Option<Party>> {
        let row = sqlx::query(
            "SELECT id, kind, name, account_id, created_at FROM parties WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_party", e))?;
        row.as_ref().map(decode_row::<PartyRow, _>).transpose()
    }

    #[instrument(skip(self), err)]
    async fn next_reference_sequence(
        &mut self,
        scope: &str,
        prefix: &str,
        bucket: &str,
    ) -> StoreResult<u32> {
        let row = sqlx::query(
            r#"
            INSERT INTO reference_counters (scope, prefix, bucket, last_value)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (scope, prefix, bucket)
            DO UPDATE SET last_value = reference_counters.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(scope)
        .bind(prefix)
        .bind(bucket)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("next_reference_sequence", e))?;
        let value: i32 = row
            .try_get("last_value")
            .map_err(|e| StoreError::Corrupt(format!("failed to read counter: {e}")))?;
        u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative counter {value}")))
    }

    async fn reference_exists(&mut self, reference: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM documents WHERE reference = $1) AS found")
            .bind(reference)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("reference_exists", e))?;
        row.try_get("found")
            .map_err(|e| StoreError::Corrupt(format!("failed to read flag: {e}")))
    }

    #[instrument(skip(self), fields(document_id = %id), err)]
    async fn load_document(
        &mut self,
        kind: &str,
        id: DocumentId,
    ) -> StoreResult<Option<StoredDocument>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE kind = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(kind)
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_document", e))?;
        row.as_ref().map(decode_row::<DocumentRow, _>).transpose()
    }

    async fn save_document(&mut self, document: &StoredDocument) -> StoreResult<()> {
        let version = i64::try_from(document.version)
            .map_err(|_| StoreError::Corrupt(format!("version {} overflows", document.version)))?;
        sqlx::query(
            r#"
            INSERT INTO documents (kind, id, reference, status, date, version, body)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (kind, id)
            DO UPDATE SET
                reference = EXCLUDED.reference,
                status = EXCLUDED.status,
                date = EXCLUDED.date,
                version = EXCLUDED.version,
                body = EXCLUDED.body
            "#,
        )
        .bind(&document.kind)
        .bind(document.id.as_uuid())
        .bind(&document.reference)
        .bind(&document.status)
        .bind(document.date)
        .bind(version)
        .bind(&document.body)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_document", e))?;
        Ok(())
    }

    async fn delete_document(&mut self, kind: &str, id: DocumentId) -> StoreResult<()> {
        sqlx::query("DELETE FROM documents WHERE kind = $1 AND id = $2")
            .bind(kind)
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_document", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn expect_one_row(affected: u64, what: &str) -> StoreResult<()> {
    if affected != 1 {
        return Err(StoreError::Corrupt(format!(
            "expected to update one {what} row, updated {affected}"
        )));
    }
    Ok(())
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Corrupt(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Corrupt(format!("unexpected row not found in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

fn decode_row<R, T>(row: &PgRow) -> StoreResult<T>
where
    R: for<'r> FromRow<'r, PgRow> + TryInto<T, Error = StoreError>,
{
    R::from_row(row)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize row: {e}")))?
        .try_into()
}

fn decode_rows<R, T>(rows: &[PgRow]) -> StoreResult<Vec<T>>
where
    R: for<'r> FromRow<'r, PgRow> + TryInto<T, Error = StoreError>,
{
    rows.iter().map(decode_row::<R, T>).collect()
}

fn parse_text<T: core::str::FromStr>(value: &str, column: &str) -> StoreResult<T> {
    value
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("invalid {column}: {value}")))
}

#[derive(Debug)]
struct StockLevelRow {
    product_id: Uuid,
    zone_id: Uuid,
    quantity: Decimal,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for StockLevelRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockLevelRow {
            product_id: row.try_get("product_id")?,
            zone_id: row.try_get("zone_id")?,
            quantity: row.try_get("quantity")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<StockLevelRow> for StockLevel {
    type Error = StoreError;

    fn try_from(row: StockLevelRow) -> Result<Self, Self::Error> {
        Ok(StockLevel {
            product_id: ProductId::from_uuid(row.product_id),
            zone_id: ZoneId::from_uuid(row.zone_id),
            quantity: row.quantity,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct StockMovementRow {
    id: Uuid,
    product_id: Uuid,
    zone_id: Uuid,
    date: DateTime<Utc>,
    transaction_type: String,
    reference: String,
    quantity_in: Decimal,
    quantity_out: Decimal,
    balance_after: Decimal,
    notes: Option<String>,
    created_by: Uuid,
}

impl<'r> FromRow<'r, PgRow> for StockMovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockMovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            zone_id: row.try_get("zone_id")?,
            date: row.try_get("date")?,
            transaction_type: row.try_get("transaction_type")?,
            reference: row.try_get("reference")?,
            quantity_in: row.try_get("quantity_in")?,
            quantity_out: row.try_get("quantity_out")?,
            balance_after: row.try_get("balance_after")?,
            notes: row.try_get("notes")?,
            created_by: row.try_get("created_by")?,
        })
    }
}

impl TryFrom<StockMovementRow> for StockMovement {
    type Error = StoreError;

    fn try_from(row: StockMovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            id: MovementId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            zone_id: ZoneId::from_uuid(row.zone_id),
            date: row.date,
            transaction_type: parse_text::<StockMovementType>(
                &row.transaction_type,
                "transaction_type",
            )?,
            reference: row.reference,
            quantity_in: row.quantity_in,
            quantity_out: row.quantity_out,
            balance_after: row.balance_after,
            notes: row.notes,
            created_by: UserId::from_uuid(row.created_by),
        })
    }
}

#[derive(Debug)]
struct AccountRow {
    id: Uuid,
    name: String,
    account_type: String,
    currency: String,
    current_balance: Decimal,
    owner: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            account_type: row.try_get("account_type")?,
            currency: row.try_get("currency")?,
            current_balance: row.try_get("current_balance")?,
            owner: row.try_get("owner")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<AccountRow> for AccountBalance {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(AccountBalance {
            id: AccountId::from_uuid(row.id),
            name: row.name,
            account_type: parse_text::<AccountType>(&row.account_type, "account_type")?,
            currency: row.currency,
            current_balance: row.current_balance,
            owner: row.owner.map(PartyId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct AccountMovementRow {
    id: Uuid,
    entry_id: Uuid,
    account_id: Uuid,
    date: DateTime<Utc>,
    transaction_type: String,
    reference: String,
    debit: Decimal,
    credit: Decimal,
    balance: Decimal,
    notes: Option<String>,
    created_by: Uuid,
}

impl<'r> FromRow<'r, PgRow> for AccountMovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountMovementRow {
            id: row.try_get("id")?,
            entry_id: row.try_get("entry_id")?,
            account_id: row.try_get("account_id")?,
            date: row.try_get("date")?,
            transaction_type: row.try_get("transaction_type")?,
            reference: row.try_get("reference")?,
            debit: row.try_get("debit")?,
            credit: row.try_get("credit")?,
            balance: row.try_get("balance")?,
            notes: row.try_get("notes")?,
            created_by: row.try_get("created_by")?,
        })
    }
}

impl TryFrom<AccountMovementRow> for AccountMovement {
    type Error = StoreError;

    fn try_from(row: AccountMovementRow) -> Result<Self, Self::Error> {
        Ok(AccountMovement {
            id: MovementId::from_uuid(row.id),
            entry_id: EntryId::from_uuid(row.entry_id),
            account_id: AccountId::from_uuid(row.account_id),
            date: row.date,
            transaction_type: parse_text::<AccountTransactionType>(
                &row.transaction_type,
                "transaction_type",
            )?,
            reference: row.reference,
            debit: row.debit,
            credit: row.credit,
            balance: row.balance,
            notes: row.notes,
            created_by: UserId::from_uuid(row.created_by),
        })
    }
}

#[derive(Debug)]
struct PartyRow {
    id: Uuid,
    kind: String,
    name: String,
    account_id: Uuid,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PartyRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PartyRow {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            name: row.try_get("name")?,
            account_id: row.try_get("account_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<PartyRow> for Party {
    type Error = StoreError;

    fn try_from(row: PartyRow) -> Result<Self, Self::Error> {
        Ok(Party {
            id: PartyId::from_uuid(row.id),
            kind: parse_text::<PartyKind>(&row.kind, "kind")?,
            name: row.name,
            account_id: AccountId::from_uuid(row.account_id),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct DocumentRow {
    kind: String,
    id: Uuid,
    reference: String,
    status: String,
    date: DateTime<Utc>,
    version: i64,
    body: serde_json::Value,
}

impl<'r> FromRow<'r, PgRow> for DocumentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(DocumentRow {
            kind: row.try_get("kind")?,
            id: row.try_get("id")?,
            reference: row.try_get("reference")?,
            status: row.try_get("status")?,
            date: row.try_get("date")?,
            version: row.try_get("version")?,
            body: row.try_get("body")?,
        })
    }
}

impl TryFrom<DocumentRow> for StoredDocument {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(StoredDocument {
            kind: row.kind,
            id: DocumentId::from_uuid(row.id),
            reference: row.reference,
            status: row.status,
            date: row.date,
            version: u64::try_from(row.version)
                .map_err(|_| StoreError::Corrupt(format!("negative version {}", row.version)))?,
            body: row.body,
        })
    }
}
