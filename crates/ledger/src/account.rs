//! Money side of the ledger: account balances, account statements and
//! double-entry postings.
//!
//! Sign convention: a positive delta is a **credit** and raises the account's
//! balance, a negative delta is a **debit** and lowers it. A client paying the
//! company therefore debits the client account (its balance drops) and credits
//! the company cash/bank account (its balance rises).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{
    AccountId, ActorContext, DomainError, DomainResult, EntryId, MovementId, PartyId, UserId,
};

/// Account owner category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Internal,
    Bank,
    Cash,
    Client,
    Supplier,
}

impl AccountType {
    /// Shared company-level resource (as opposed to a party's running balance).
    pub fn is_company(self) -> bool {
        matches!(self, AccountType::Internal | AccountType::Bank | AccountType::Cash)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Internal => "internal",
            AccountType::Bank => "bank",
            AccountType::Cash => "cash",
            AccountType::Client => "client",
            AccountType::Supplier => "supplier",
        }
    }
}

impl core::str::FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(AccountType::Internal),
            "bank" => Ok(AccountType::Bank),
            "cash" => Ok(AccountType::Cash),
            "client" => Ok(AccountType::Client),
            "supplier" => Ok(AccountType::Supplier),
            other => Err(DomainError::validation(format!("unknown account type: {other}"))),
        }
    }
}

/// Current balance of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub id: AccountId,
    pub name: String,
    pub account_type: AccountType,
    pub currency: String,
    pub current_balance: Decimal,
    /// Owning client/supplier; `None` for company accounts.
    pub owner: Option<PartyId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Open a company account at balance zero.
    pub fn open_company(
        name: impl Into<String>,
        account_type: AccountType,
        currency: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !account_type.is_company() {
            return Err(DomainError::validation(format!(
                "{} accounts are opened through party registration",
                account_type.as_str()
            )));
        }
        Self::open(AccountId::new(), name, account_type, currency, None, at)
    }

    pub(crate) fn open(
        id: AccountId,
        name: impl Into<String>,
        account_type: AccountType,
        currency: impl Into<String>,
        owner: Option<PartyId>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("account name must not be empty"));
        }
        let currency = currency.into();
        if currency.trim().is_empty() {
            return Err(DomainError::validation("currency must not be empty"));
        }
        Ok(Self {
            id,
            name,
            account_type,
            currency,
            current_balance: Decimal::ZERO,
            owner,
            created_at: at,
            updated_at: at,
        })
    }

    /// Apply one leg and produce the matching account statement row.
    pub fn apply(
        &mut self,
        leg: &MoneyLeg,
        id: MovementId,
        entry_id: EntryId,
        actor: &ActorContext,
    ) -> DomainResult<AccountMovement> {
        if leg.account_id != self.id {
            return Err(DomainError::consistency(format!(
                "leg for account {} applied to account {}",
                leg.account_id, self.id
            )));
        }
        if leg.delta.is_zero() {
            return Err(DomainError::validation("posting amount must be non-zero"));
        }

        self.current_balance = self
            .current_balance
            .checked_add(leg.delta)
            .ok_or_else(|| DomainError::validation("amount out of range"))?;
        self.updated_at = actor.occurred_at;

        Ok(AccountMovement {
            id,
            entry_id,
            account_id: self.id,
            date: actor.occurred_at,
            transaction_type: leg.transaction_type,
            reference: leg.reference.clone(),
            debit: (-leg.delta).max(Decimal::ZERO),
            credit: leg.delta.max(Decimal::ZERO),
            balance: self.current_balance,
            notes: leg.notes.clone(),
            created_by: actor.user_id,
        })
    }
}

/// Kind of money movement recorded on the account statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountTransactionType {
    ClientPayment,
    SupplierPayment,
    TransferIn,
    TransferOut,
    CashReceipt,
    CashPayment,
    Expense,
    Sale,
    Purchase,
    Deposit,
}

impl AccountTransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountTransactionType::ClientPayment => "client_payment",
            AccountTransactionType::SupplierPayment => "supplier_payment",
            AccountTransactionType::TransferIn => "transfer_in",
            AccountTransactionType::TransferOut => "transfer_out",
            AccountTransactionType::CashReceipt => "cash_receipt",
            AccountTransactionType::CashPayment => "cash_payment",
            AccountTransactionType::Expense => "expense",
            AccountTransactionType::Sale => "sale",
            AccountTransactionType::Purchase => "purchase",
            AccountTransactionType::Deposit => "deposit",
        }
    }
}

impl core::str::FromStr for AccountTransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client_payment" => Ok(AccountTransactionType::ClientPayment),
            "supplier_payment" => Ok(AccountTransactionType::SupplierPayment),
            "transfer_in" => Ok(AccountTransactionType::TransferIn),
            "transfer_out" => Ok(AccountTransactionType::TransferOut),
            "cash_receipt" => Ok(AccountTransactionType::CashReceipt),
            "cash_payment" => Ok(AccountTransactionType::CashPayment),
            "expense" => Ok(AccountTransactionType::Expense),
            "sale" => Ok(AccountTransactionType::Sale),
            "purchase" => Ok(AccountTransactionType::Purchase),
            "deposit" => Ok(AccountTransactionType::Deposit),
            other => Err(DomainError::validation(format!(
                "unknown account transaction type: {other}"
            ))),
        }
    }
}

/// One signed side of a posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyLeg {
    pub account_id: AccountId,
    pub delta: Decimal,
    pub transaction_type: AccountTransactionType,
    pub reference: String,
    pub notes: Option<String>,
}

/// Immutable account statement row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMovement {
    pub id: MovementId,
    /// Shared by both legs of the posting this row belongs to.
    pub entry_id: EntryId,
    pub account_id: AccountId,
    pub date: DateTime<Utc>,
    pub transaction_type: AccountTransactionType,
    pub reference: String,
    pub debit: Decimal,
    pub credit: Decimal,
    /// Balance right after this row.
    pub balance: Decimal,
    pub notes: Option<String>,
    pub created_by: UserId,
}

impl AccountMovement {
    /// Signed delta of this row (credit positive).
    pub fn signed(&self) -> Decimal {
        self.credit - self.debit
    }
}

/// Double-entry posting: `amount` leaves `debit_account` and enters `credit_account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyPosting {
    pub debit_account: AccountId,
    pub credit_account: AccountId,
    pub amount: Decimal,
    pub debit_type: AccountTransactionType,
    pub credit_type: AccountTransactionType,
    pub reference: String,
    pub notes: Option<String>,
}

impl MoneyPosting {
    /// Posting where both legs carry the same transaction type.
    pub fn new(
        debit_account: AccountId,
        credit_account: AccountId,
        amount: Decimal,
        transaction_type: AccountTransactionType,
        reference: impl Into<String>,
    ) -> DomainResult<Self> {
        Self::with_types(
            debit_account,
            credit_account,
            amount,
            transaction_type,
            transaction_type,
            reference,
        )
    }

    pub fn with_types(
        debit_account: AccountId,
        credit_account: AccountId,
        amount: Decimal,
        debit_type: AccountTransactionType,
        credit_type: AccountTransactionType,
        reference: impl Into<String>,
    ) -> DomainResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "posting amount must be positive: {amount}"
            )));
        }
        if debit_account == credit_account {
            return Err(DomainError::validation(
                "source and target accounts must differ",
            ));
        }
        Ok(Self {
            debit_account,
            credit_account,
            amount,
            debit_type,
            credit_type,
            reference: reference.into(),
            notes: None,
        })
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// The two legs; their deltas always sum to zero.
    pub fn legs(&self) -> [MoneyLeg; 2] {
        [
            MoneyLeg {
                account_id: self.debit_account,
                delta: -self.amount,
                transaction_type: self.debit_type,
                reference: self.reference.clone(),
                notes: self.notes.clone(),
            },
            MoneyLeg {
                account_id: self.credit_account,
                delta: self.amount,
                transaction_type: self.credit_type,
                reference: self.reference.clone(),
                notes: self.notes.clone(),
            },
        ]
    }

    /// Mirror posting that offsets this one.
    ///
    /// Each account keeps the transaction type it had, so per-type sums on an
    /// account net to zero after the reversal.
    pub fn reversed(&self) -> Self {
        Self {
            debit_account: self.credit_account,
            credit_account: self.debit_account,
            amount: self.amount,
            debit_type: self.credit_type,
            credit_type: self.debit_type,
            reference: self.reference.clone(),
            notes: Some(format!("reversal of {}", self.reference)),
        }
    }

    /// Rebuild the posting that produced the two rows of one entry.
    pub fn from_entry(rows: &[&AccountMovement]) -> DomainResult<Self> {
        let [a, b] = rows else {
            return Err(DomainError::consistency(format!(
                "posting entry has {} legs, expected 2",
                rows.len()
            )));
        };
        let (debit, credit) = if a.debit > Decimal::ZERO { (a, b) } else { (b, a) };
        if debit.debit != credit.credit || debit.entry_id != credit.entry_id {
            return Err(DomainError::consistency(format!(
                "posting entry {} is unbalanced",
                debit.entry_id
            )));
        }
        Ok(Self {
            debit_account: debit.account_id,
            credit_account: credit.account_id,
            amount: debit.debit,
            debit_type: debit.transaction_type,
            credit_type: credit.transaction_type,
            reference: debit.reference.clone(),
            notes: debit.notes.clone(),
        })
    }
}

/// Offsetting postings for every entry in `rows`, in entry order.
///
/// The ledger is append-only: cancelling a document never deletes its rows,
/// it writes these reversals instead.
pub fn reversals_for(rows: &[AccountMovement]) -> DomainResult<Vec<MoneyPosting>> {
    let mut entries: Vec<EntryId> = Vec::new();
    for row in rows {
        if !entries.contains(&row.entry_id) {
            entries.push(row.entry_id);
        }
    }
    entries
        .into_iter()
        .map(|entry| {
            let legs: Vec<&AccountMovement> =
                rows.iter().filter(|r| r.entry_id == entry).collect();
            MoneyPosting::from_entry(&legs).map(|p| p.reversed())
        })
        .collect()
}
