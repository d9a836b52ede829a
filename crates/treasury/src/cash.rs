use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{
    AccountId, ActorContext, Document, DocumentId, DomainError, DomainResult, ReferenceFormat,
    StatusMachine, Transition, UserId, plan_transition,
};
use stockbook_ledger::{AccountTransactionType, AccountType, LedgerEffect, MoneyPosting};

/// What a cash operation does. Determines the reference prefix, the ledger
/// transaction types and which account types may take part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashOperationKind {
    /// Money received from a client or supplier into a company account.
    Receipt,
    /// Money paid from a company account to a client or supplier.
    Payment,
    /// Money spent from a company account into an internal expense account.
    Expense,
    /// Money moved between two company accounts.
    Transfer,
}

impl CashOperationKind {
    pub fn reference_format(self) -> ReferenceFormat {
        match self {
            CashOperationKind::Receipt => ReferenceFormat::daily("REC"),
            CashOperationKind::Payment => ReferenceFormat::daily("PAY"),
            CashOperationKind::Expense => ReferenceFormat::daily("EXP"),
            CashOperationKind::Transfer => ReferenceFormat::daily("ATR"),
        }
    }

    /// `(debit side, credit side)` transaction types.
    fn transaction_types(self) -> (AccountTransactionType, AccountTransactionType) {
        match self {
            CashOperationKind::Receipt => (
                AccountTransactionType::CashReceipt,
                AccountTransactionType::CashReceipt,
            ),
            CashOperationKind::Payment => (
                AccountTransactionType::CashPayment,
                AccountTransactionType::CashPayment,
            ),
            CashOperationKind::Expense => {
                (AccountTransactionType::Expense, AccountTransactionType::Expense)
            }
            CashOperationKind::Transfer => (
                AccountTransactionType::TransferOut,
                AccountTransactionType::TransferIn,
            ),
        }
    }

    /// Check the source/target account types against this kind.
    pub fn validate_accounts(self, source: AccountType, target: AccountType) -> DomainResult<()> {
        let party = |t: AccountType| matches!(t, AccountType::Client | AccountType::Supplier);
        let ok = match self {
            CashOperationKind::Receipt => party(source) && target.is_company(),
            CashOperationKind::Payment => source.is_company() && party(target),
            CashOperationKind::Expense => {
                source.is_company() && target == AccountType::Internal
            }
            CashOperationKind::Transfer => source.is_company() && target.is_company(),
        };
        if ok {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "a {} cannot move money from a {} account to a {} account",
                self.as_str(),
                source.as_str(),
                target.as_str()
            )))
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CashOperationKind::Receipt => "receipt",
            CashOperationKind::Payment => "payment",
            CashOperationKind::Expense => "expense",
            CashOperationKind::Transfer => "transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl StatusMachine for CashStatus {
    const DOCUMENT: &'static str = "cash_operation";

    fn can_transition(self, to: Self) -> bool {
        use CashStatus::*;
        matches!((self, to), (Pending, Confirmed | Cancelled) | (Confirmed, Cancelled))
    }

    fn as_str(self) -> &'static str {
        match self {
            CashStatus::Pending => "pending",
            CashStatus::Confirmed => "confirmed",
            CashStatus::Cancelled => "cancelled",
        }
    }

    fn is_terminal(self) -> bool {
        self == CashStatus::Cancelled
    }
}

impl core::str::FromStr for CashStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CashStatus::Pending),
            "confirmed" => Ok(CashStatus::Confirmed),
            "cancelled" => Ok(CashStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown cash status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCashOperation {
    pub reference: String,
    pub kind: CashOperationKind,
    pub amount: Decimal,
    pub source_account: AccountId,
    pub target_account: AccountId,
    pub notes: Option<String>,
}

/// A cash receipt, payment, expense or account transfer.
///
/// Confirmation posts `amount` from the source to the target account;
/// cancelling a confirmed operation posts the mirror entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashOperation {
    id: DocumentId,
    reference: String,
    kind: CashOperationKind,
    amount: Decimal,
    source_account: AccountId,
    target_account: AccountId,
    date: DateTime<Utc>,
    status: CashStatus,
    notes: Option<String>,
    created_by: UserId,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl CashOperation {
    pub fn create(new: NewCashOperation, actor: &ActorContext) -> DomainResult<CashOperation> {
        let operation = CashOperation {
            id: DocumentId::new(),
            reference: new.reference,
            kind: new.kind,
            amount: new.amount,
            source_account: new.source_account,
            target_account: new.target_account,
            date: actor.occurred_at,
            status: CashStatus::Pending,
            notes: new.notes,
            created_by: actor.user_id,
            updated_at: actor.occurred_at,
            version: 0,
        };
        operation.posting()?;
        Ok(operation)
    }

    pub fn kind(&self) -> CashOperationKind {
        self.kind
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn source_account(&self) -> AccountId {
        self.source_account
    }

    pub fn target_account(&self) -> AccountId {
        self.target_account
    }

    pub fn status(&self) -> CashStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn plan_status(&self, to: CashStatus) -> DomainResult<Transition<CashStatus>> {
        plan_transition(self.status, to)
    }

    pub fn change_status(
        &mut self,
        to: CashStatus,
        actor: &ActorContext,
    ) -> DomainResult<Vec<LedgerEffect>> {
        let effects: Vec<LedgerEffect> = match self.plan_status(to)? {
            Transition::Unchanged(_) => return Ok(Vec::new()),
            Transition::Moved { to: CashStatus::Confirmed, .. } => vec![self.posting()?.into()],
            Transition::Moved { from: CashStatus::Confirmed, to: CashStatus::Cancelled } => {
                vec![self.posting()?.reversed().into()]
            }
            Transition::Moved { .. } => Vec::new(),
        };
        self.status = to;
        self.updated_at = actor.occurred_at;
        Ok(effects)
    }

    fn posting(&self) -> DomainResult<MoneyPosting> {
        let (debit_type, credit_type) = self.kind.transaction_types();
        let posting = MoneyPosting::with_types(
            self.source_account,
            self.target_account,
            self.amount,
            debit_type,
            credit_type,
            self.reference.clone(),
        )?;
        Ok(match &self.notes {
            Some(notes) => posting.with_notes(notes.clone()),
            None => posting,
        })
    }
}

impl Document for CashOperation {
    const KIND: &'static str = "cash_operation";

    fn id(&self) -> DocumentId {
        self.id
    }

    fn reference(&self) -> &str {
        &self.reference
    }

    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }

    fn date(&self) -> DateTime<Utc> {
        self.date
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn bump_version(&mut self) {
        self.version += 1;
    }
}
