//! Ledger/balance consistency checks.
//!
//! These are the invariants the mutator maintains; they are re-checked by the
//! reconciliation report and in tests.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use stockbook_core::{DomainError, DomainResult, EntryId};

use crate::account::{AccountBalance, AccountMovement};
use crate::stock::{StockLevel, StockMovement};

/// `level.quantity == Σ in − Σ out` over the level's stock card.
pub fn verify_stock_card(level: &StockLevel, movements: &[StockMovement]) -> DomainResult<()> {
    let sum: Decimal = movements
        .iter()
        .filter(|m| m.product_id == level.product_id && m.zone_id == level.zone_id)
        .map(StockMovement::net)
        .sum();
    if sum != level.quantity {
        return Err(DomainError::consistency(format!(
            "stock level {}/{} is {} but its stock card sums to {}",
            level.product_id, level.zone_id, level.quantity, sum
        )));
    }
    Ok(())
}

/// `account.current_balance == Σ credit − Σ debit` over its statement.
pub fn verify_account_statement(
    account: &AccountBalance,
    movements: &[AccountMovement],
) -> DomainResult<()> {
    let sum: Decimal = movements
        .iter()
        .filter(|m| m.account_id == account.id)
        .map(AccountMovement::signed)
        .sum();
    if sum != account.current_balance {
        return Err(DomainError::consistency(format!(
            "account {} balance is {} but its statement sums to {}",
            account.id, account.current_balance, sum
        )));
    }
    Ok(())
}

/// Every posting entry nets to zero across its legs.
pub fn verify_entries_balanced(movements: &[AccountMovement]) -> DomainResult<()> {
    let mut sums: BTreeMap<EntryId, Decimal> = BTreeMap::new();
    for m in movements {
        *sums.entry(m.entry_id).or_insert(Decimal::ZERO) += m.signed();
    }
    if let Some((entry, sum)) = sums.into_iter().find(|(_, sum)| !sum.is_zero()) {
        return Err(DomainError::consistency(format!(
            "posting entry {entry} does not balance (net {sum})"
        )));
    }
    Ok(())
}
