//! Balance + ledger mutator.
//!
//! Every stock level or account balance change goes through here, inside the
//! caller's unit of work: lock the balance row, apply the change, persist it,
//! append the ledger row carrying the same delta and the post-mutation
//! balance. Nothing here commits; the document engine owns the transaction.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use stockbook_core::{AccountId, ActorContext, DomainError, EntryId, MovementId, ProductId, ZoneId};
use stockbook_ledger::{
    AccountBalance, AccountMovement, GoodsMovement, LedgerEffect, MoneyPosting, StockMovement,
    consistency::verify_entries_balanced, inflows_first, net_outflows,
};

use crate::engine::EngineResult;
use crate::store::UnitOfWork;

/// Ledger rows written by one batch of effects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedEffects {
    pub stock_movements: Vec<StockMovement>,
    pub account_movements: Vec<AccountMovement>,
}

impl AppliedEffects {
    pub fn is_empty(&self) -> bool {
        self.stock_movements.is_empty() && self.account_movements.is_empty()
    }

    pub fn extend(&mut self, other: AppliedEffects) {
        self.stock_movements.extend(other.stock_movements);
        self.account_movements.extend(other.account_movements);
    }
}

/// Every `(product, zone)` a batch touches, inflows included, in lock order.
pub fn stock_keys(effects: &[LedgerEffect]) -> BTreeSet<(ProductId, ZoneId)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            LedgerEffect::Goods(m) => Some((m.product_id, m.zone_id)),
            LedgerEffect::Money(_) => None,
        })
        .collect()
}

/// Every account a batch posts to, in lock order.
pub fn account_keys(effects: &[LedgerEffect]) -> BTreeSet<AccountId> {
    effects
        .iter()
        .flat_map(|effect| match effect {
            LedgerEffect::Money(p) => vec![p.debit_account, p.credit_account],
            LedgerEffect::Goods(_) => Vec::new(),
        })
        .collect()
}

/// Lock every row the batch touches, then check each `(product, zone)` it
/// drains against its locked level.
///
/// Stock levels are locked first and accounts second, each in sorted key
/// order, so concurrent batches always acquire rows in the same order.
pub async fn ensure_available(
    uow: &mut dyn UnitOfWork,
    effects: &[LedgerEffect],
    at: DateTime<Utc>,
) -> EngineResult<()> {
    let mut on_hand = BTreeMap::new();
    for (product_id, zone_id) in stock_keys(effects) {
        let level = uow.lock_stock_level(product_id, zone_id, at).await?;
        on_hand.insert((product_id, zone_id), level.quantity);
    }
    let accounts: Vec<AccountId> = account_keys(effects).into_iter().collect();
    lock_accounts(uow, &accounts).await?;

    for ((product_id, zone_id), requested) in net_outflows(effects) {
        let available = on_hand
            .get(&(product_id, zone_id))
            .copied()
            .unwrap_or_default();
        if available < requested {
            return Err(DomainError::InsufficientStock {
                product_id,
                zone_id,
                available,
                requested,
            }
            .into());
        }
    }
    Ok(())
}

/// Apply one goods movement: lock, mutate, persist, append.
pub async fn apply_movement(
    uow: &mut dyn UnitOfWork,
    movement: &GoodsMovement,
    actor: &ActorContext,
) -> EngineResult<StockMovement> {
    let mut level = uow
        .lock_stock_level(movement.product_id, movement.zone_id, actor.occurred_at)
        .await?;
    let row = level.apply(movement, MovementId::new(), actor)?;
    uow.save_stock_level(&level).await?;
    uow.append_stock_movement(&row).await?;

    info!(
        product_id = %row.product_id,
        zone_id = %row.zone_id,
        transaction_type = row.transaction_type.as_str(),
        reference = %row.reference,
        quantity_in = %row.quantity_in,
        quantity_out = %row.quantity_out,
        balance_after = %row.balance_after,
        "stock movement applied"
    );
    Ok(row)
}

/// Lock accounts in id order. Missing accounts are `AccountNotFound`.
pub async fn lock_accounts(
    uow: &mut dyn UnitOfWork,
    ids: &[AccountId],
) -> EngineResult<BTreeMap<AccountId, AccountBalance>> {
    let mut sorted = ids.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut accounts = BTreeMap::new();
    for id in sorted {
        let account = uow
            .lock_account(id)
            .await?
            .ok_or_else(|| DomainError::account_not_found(format!("account {id}")))?;
        accounts.insert(id, account);
    }
    Ok(accounts)
}

/// Apply both legs of a posting under one entry id.
pub async fn apply_posting(
    uow: &mut dyn UnitOfWork,
    posting: &MoneyPosting,
    actor: &ActorContext,
) -> EngineResult<Vec<AccountMovement>> {
    let mut accounts =
        lock_accounts(uow, &[posting.debit_account, posting.credit_account]).await?;
    let entry_id = EntryId::new();

    let mut rows = Vec::with_capacity(2);
    for leg in posting.legs() {
        let account = accounts
            .get_mut(&leg.account_id)
            .ok_or_else(|| DomainError::account_not_found(format!("account {}", leg.account_id)))?;
        rows.push(account.apply(&leg, MovementId::new(), entry_id, actor)?);
    }
    verify_entries_balanced(&rows)?;

    for account in accounts.values() {
        uow.save_account(account).await?;
    }
    for row in &rows {
        uow.append_account_movement(row).await?;
    }

    info!(
        entry_id = %entry_id,
        debit_account = %posting.debit_account,
        credit_account = %posting.credit_account,
        amount = %posting.amount,
        reference = %posting.reference,
        "money posting applied"
    );
    Ok(rows)
}

/// Apply a document's effects atomically within `uow`.
///
/// Stock is pre-validated for the whole batch first, then inflows are applied
/// before outflows, so a batch either passes entirely or fails before any
/// row is touched.
pub async fn apply_effects(
    uow: &mut dyn UnitOfWork,
    effects: Vec<LedgerEffect>,
    actor: &ActorContext,
) -> EngineResult<AppliedEffects> {
    let mut applied = AppliedEffects::default();
    if effects.is_empty() {
        return Ok(applied);
    }

    ensure_available(uow, &effects, actor.occurred_at).await?;

    for effect in inflows_first(effects) {
        match effect {
            LedgerEffect::Goods(movement) => {
                applied
                    .stock_movements
                    .push(apply_movement(uow, &movement, actor).await?);
            }
            LedgerEffect::Money(posting) => {
                applied
                    .account_movements
                    .extend(apply_posting(uow, &posting, actor).await?);
            }
        }
    }
    Ok(applied)
}
