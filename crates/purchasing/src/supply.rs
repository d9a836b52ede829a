use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{
    AccountId, ActorContext, Document, DocumentId, DomainError, DomainResult, LineId, PartyId,
    PaymentSummary, ProductId, ReferenceFormat, StatusMachine, Transition, UserId, ZoneId,
    plan_transition,
};
use stockbook_ledger::{
    AccountMovement, AccountTransactionType, GoodsMovement, LedgerEffect, MoneyPosting,
    StockMovementType,
};

/// `SUP-YYYYMMDD-NNNN`
pub const SUPPLY_REFERENCE: ReferenceFormat = ReferenceFormat::daily("SUP");

/// Stock supply status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyStatus {
    Pending,
    Partial,
    Received,
    Cancelled,
}

impl SupplyStatus {
    pub fn items_editable(self) -> bool {
        matches!(self, SupplyStatus::Pending | SupplyStatus::Partial)
    }
}

impl StatusMachine for SupplyStatus {
    const DOCUMENT: &'static str = "stock_supply";

    fn can_transition(self, to: Self) -> bool {
        use SupplyStatus::*;
        matches!(
            (self, to),
            (Pending, Partial | Received | Cancelled) | (Partial, Received | Cancelled)
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            SupplyStatus::Pending => "pending",
            SupplyStatus::Partial => "partial",
            SupplyStatus::Received => "received",
            SupplyStatus::Cancelled => "cancelled",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, SupplyStatus::Received | SupplyStatus::Cancelled)
    }
}

impl core::str::FromStr for SupplyStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SupplyStatus::Pending),
            "partial" => Ok(SupplyStatus::Partial),
            "received" => Ok(SupplyStatus::Received),
            "cancelled" => Ok(SupplyStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown supply status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyItem {
    pub id: LineId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    /// Quantity actually delivered; `quantity` is used when unset.
    pub received_quantity: Option<Decimal>,
    pub unit_price: Decimal,
    /// Always `quantity * unit_price`.
    pub total_price: Decimal,
}

impl SupplyItem {
    pub fn quantity_to_receive(&self) -> Decimal {
        self.received_quantity.unwrap_or(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyLineInput {
    #[serde(default)]
    pub id: Option<LineId>,
    pub product_id: ProductId,
    pub quantity: Decimal,
    #[serde(default)]
    pub received_quantity: Option<Decimal>,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSupply {
    pub reference: String,
    pub supplier_id: PartyId,
    pub supplier_account_id: AccountId,
    pub zone_id: ZoneId,
    pub items: Vec<SupplyLineInput>,
    /// Amount settled with the supplier when the supply is received.
    pub planned_payment: Option<Decimal>,
    /// Company account the planned payment is drawn from.
    pub payment_account: Option<AccountId>,
    pub notes: Option<String>,
}

/// A procurement receipt.
///
/// Creating or editing a supply has no stock or money effect. The single
/// trigger is the transition into `received`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supply {
    id: DocumentId,
    reference: String,
    supplier_id: PartyId,
    supplier_account_id: AccountId,
    zone_id: ZoneId,
    date: DateTime<Utc>,
    status: SupplyStatus,
    items: Vec<SupplyItem>,
    #[serde(flatten)]
    payment: PaymentSummary,
    planned_payment: Option<Decimal>,
    payment_account: Option<AccountId>,
    notes: Option<String>,
    created_by: UserId,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Supply {
    pub fn create(new: NewSupply, actor: &ActorContext) -> DomainResult<Supply> {
        let items = build_items(new.items)?;
        let total = items_total(&items)?;
        validate_planned_payment(new.planned_payment, new.payment_account)?;
        Ok(Supply {
            id: DocumentId::new(),
            reference: new.reference,
            supplier_id: new.supplier_id,
            supplier_account_id: new.supplier_account_id,
            zone_id: new.zone_id,
            date: actor.occurred_at,
            status: SupplyStatus::Pending,
            payment: PaymentSummary::unpaid(total)?,
            items,
            planned_payment: new.planned_payment,
            payment_account: new.payment_account,
            notes: new.notes,
            created_by: actor.user_id,
            updated_at: actor.occurred_at,
            version: 0,
        })
    }

    pub fn supplier_id(&self) -> PartyId {
        self.supplier_id
    }

    pub fn supplier_account_id(&self) -> AccountId {
        self.supplier_account_id
    }

    pub fn zone_id(&self) -> ZoneId {
        self.zone_id
    }

    pub fn status(&self) -> SupplyStatus {
        self.status
    }

    pub fn items(&self) -> &[SupplyItem] {
        &self.items
    }

    pub fn payment(&self) -> &PaymentSummary {
        &self.payment
    }

    pub fn planned_payment(&self) -> Option<Decimal> {
        self.planned_payment
    }

    pub fn payment_account(&self) -> Option<AccountId> {
        self.payment_account
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    fn ensure_editable(&self, operation: &str) -> DomainResult<()> {
        if !self.status.items_editable() {
            return Err(DomainError::invalid_transition(
                SupplyStatus::DOCUMENT,
                self.status.as_str(),
                operation,
            ));
        }
        Ok(())
    }

    /// Replace the line items. Totals are recomputed; nothing touches stock.
    pub fn update_items(
        &mut self,
        inputs: Vec<SupplyLineInput>,
        actor: &ActorContext,
    ) -> DomainResult<()> {
        self.ensure_editable("items_updated")?;
        for input in &inputs {
            if let Some(id) = input.id {
                if !self.items.iter().any(|i| i.id == id) {
                    return Err(DomainError::validation(format!("unknown supply line {id}")));
                }
            }
        }
        let items = build_items(inputs)?;
        self.payment =
            PaymentSummary::compute(items_total(&items)?, self.payment.paid_amount(), true)?;
        self.items = items;
        self.updated_at = actor.occurred_at;
        Ok(())
    }

    pub fn set_planned_payment(
        &mut self,
        amount: Option<Decimal>,
        account: Option<AccountId>,
        actor: &ActorContext,
    ) -> DomainResult<()> {
        self.ensure_editable("payment_planned")?;
        validate_planned_payment(amount, account)?;
        self.planned_payment = amount;
        self.payment_account = account;
        self.updated_at = actor.occurred_at;
        Ok(())
    }

    pub fn plan_status(&self, to: SupplyStatus) -> DomainResult<Transition<SupplyStatus>> {
        plan_transition(self.status, to)
    }

    /// Apply a status change and return its ledger effects.
    ///
    /// Entering `received` adds every line to stock (received quantity if
    /// set, ordered quantity otherwise) and settles the planned payment.
    /// Re-saving a received supply is `Unchanged` and yields nothing.
    pub fn change_status(
        &mut self,
        to: SupplyStatus,
        actor: &ActorContext,
    ) -> DomainResult<Vec<LedgerEffect>> {
        let effects = match self.plan_status(to)? {
            Transition::Unchanged(_) => return Ok(Vec::new()),
            Transition::Moved { to: SupplyStatus::Received, .. } => self.receipt_effects()?,
            Transition::Moved { .. } => Vec::new(),
        };
        self.status = to;
        self.updated_at = actor.occurred_at;
        Ok(effects)
    }

    /// Posting for an additional payment to the supplier after receipt.
    ///
    /// Supplies may end up overpaid.
    pub fn plan_payment(&self, amount: Decimal, source: AccountId) -> DomainResult<MoneyPosting> {
        if self.status != SupplyStatus::Received {
            return Err(DomainError::invalid_transition(
                SupplyStatus::DOCUMENT,
                self.status.as_str(),
                "payment_recorded",
            ));
        }
        self.supplier_payment(amount, source)
    }

    /// Recompute the paid amount from the supplier account's ledger rows.
    ///
    /// Paid = Σ(credit − debit) of supplier-payment rows with this reference
    /// on the supplier account.
    pub fn refresh_payments(
        &mut self,
        rows: &[AccountMovement],
        actor: &ActorContext,
    ) -> DomainResult<()> {
        let paid: Decimal = rows
            .iter()
            .filter(|r| {
                r.account_id == self.supplier_account_id
                    && r.transaction_type == AccountTransactionType::SupplierPayment
                    && r.reference == self.reference
            })
            .map(AccountMovement::signed)
            .sum();
        self.payment = PaymentSummary::compute(items_total(&self.items)?, paid, true)?;
        self.updated_at = actor.occurred_at;
        Ok(())
    }

    pub fn verify(&self) -> DomainResult<()> {
        let total = items_total(&self.items)?;
        if self.payment.total_amount() != total {
            return Err(DomainError::consistency(format!(
                "supply {} total {} != sum of items {}",
                self.reference,
                self.payment.total_amount(),
                total
            )));
        }
        self.payment.verify(true)
    }

    fn receipt_effects(&self) -> DomainResult<Vec<LedgerEffect>> {
        let mut effects: Vec<LedgerEffect> = self
            .items
            .iter()
            .filter(|item| item.quantity_to_receive() > Decimal::ZERO)
            .map(|item| {
                GoodsMovement::inbound(
                    item.product_id,
                    self.zone_id,
                    item.quantity_to_receive(),
                    StockMovementType::Supply,
                    self.reference.clone(),
                )
                .into()
            })
            .collect();

        if let Some(amount) = self.planned_payment.filter(|a| *a > Decimal::ZERO) {
            let account = self.payment_account.ok_or_else(|| {
                DomainError::validation("planned payment requires a payment account")
            })?;
            effects.push(self.supplier_payment(amount, account)?.into());
        }
        Ok(effects)
    }

    fn supplier_payment(&self, amount: Decimal, source: AccountId) -> DomainResult<MoneyPosting> {
        MoneyPosting::new(
            source,
            self.supplier_account_id,
            amount,
            AccountTransactionType::SupplierPayment,
            self.reference.clone(),
        )
    }
}

impl Document for Supply {
    const KIND: &'static str = "stock_supply";

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

fn validate_planned_payment(amount: Option<Decimal>, account: Option<AccountId>) -> DomainResult<()> {
    match amount {
        Some(a) if a < Decimal::ZERO => Err(DomainError::validation(
            "planned payment must not be negative",
        )),
        Some(a) if a > Decimal::ZERO && account.is_none() => Err(DomainError::validation(
            "planned payment requires a payment account",
        )),
        _ => Ok(()),
    }
}

fn build_items(inputs: Vec<SupplyLineInput>) -> DomainResult<Vec<SupplyItem>> {
    if inputs.is_empty() {
        return Err(DomainError::validation("a supply needs at least one item"));
    }
    inputs
        .into_iter()
        .map(|input| {
            if input.quantity <= Decimal::ZERO {
                return Err(DomainError::validation("quantity must be positive"));
            }
            if input.unit_price < Decimal::ZERO {
                return Err(DomainError::validation("unit_price must not be negative"));
            }
            if input.received_quantity.is_some_and(|q| q < Decimal::ZERO) {
                return Err(DomainError::validation("received_quantity must not be negative"));
            }
            let total_price = input
                .quantity
                .checked_mul(input.unit_price)
                .ok_or_else(|| DomainError::validation("amount out of range"))?;
            Ok(SupplyItem {
                id: input.id.unwrap_or_default(),
                product_id: input.product_id,
                quantity: input.quantity,
                received_quantity: input.received_quantity,
                unit_price: input.unit_price,
                total_price,
            })
        })
        .collect()
}

fn items_total(items: &[SupplyItem]) -> DomainResult<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| {
        acc.checked_add(item.total_price)
            .ok_or_else(|| DomainError::validation("amount out of range"))
    })
}
