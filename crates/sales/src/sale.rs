use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{
    AccountId, ActorContext, Document, DocumentId, DomainError, DomainResult, LineId, PartyId,
    PaymentStatus, PaymentSummary, ProductId, ReferenceFormat, StatusMachine, Transition, UserId,
    ZoneId, plan_transition,
};
use stockbook_ledger::{
    AccountMovement, AccountTransactionType, GoodsMovement, LedgerEffect, MoneyPosting,
    StockMovementType, reversals_for,
};

/// `SL-YYYYMMDD-NNNN`
pub const SALE_REFERENCE: ReferenceFormat = ReferenceFormat::daily("SL");

/// Sale status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Draft,
    Pending,
    Confirmed,
    PaymentPending,
    PartiallyPaid,
    Paid,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

impl SaleStatus {
    /// Statuses in which a payment may be recorded.
    pub fn is_payable(self) -> bool {
        matches!(
            self,
            SaleStatus::Pending
                | SaleStatus::Confirmed
                | SaleStatus::PaymentPending
                | SaleStatus::PartiallyPaid
        )
    }

    pub fn items_editable(self) -> bool {
        matches!(self, SaleStatus::Draft | SaleStatus::Pending)
    }
}

impl StatusMachine for SaleStatus {
    const DOCUMENT: &'static str = "sale";

    fn can_transition(self, to: Self) -> bool {
        use SaleStatus::*;
        match (self, to) {
            (Draft | Pending | Confirmed | PaymentPending | PartiallyPaid | Paid, Cancelled) => {
                true
            }
            (Draft, Pending | Confirmed) => true,
            (Pending, Confirmed | PaymentPending | PartiallyPaid | Paid) => true,
            (Confirmed, PaymentPending | PartiallyPaid | Paid | Shipped) => true,
            (PaymentPending, PartiallyPaid | Paid) => true,
            (PartiallyPaid, Paid) => true,
            (Paid, Shipped | Completed) => true,
            (Shipped, Delivered) => true,
            (Delivered, Completed) => true,
            _ => false,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            SaleStatus::Draft => "draft",
            SaleStatus::Pending => "pending",
            SaleStatus::Confirmed => "confirmed",
            SaleStatus::PaymentPending => "payment_pending",
            SaleStatus::PartiallyPaid => "partially_paid",
            SaleStatus::Paid => "paid",
            SaleStatus::Shipped => "shipped",
            SaleStatus::Delivered => "delivered",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, SaleStatus::Completed | SaleStatus::Cancelled)
    }
}

/// Sale line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: LineId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Incoming line; `id` is set when editing an existing line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineInput {
    #[serde(default)]
    pub id: Option<LineId>,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl SaleLineInput {
    fn validate(&self) -> DomainResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(DomainError::validation("unit_price must not be negative"));
        }
        Ok(())
    }

    fn into_item(self) -> DomainResult<SaleItem> {
        let total_price = self
            .quantity
            .checked_mul(self.unit_price)
            .ok_or_else(|| DomainError::validation("amount out of range"))?;
        Ok(SaleItem {
            id: self.id.unwrap_or_default(),
            product_id: self.product_id,
            total_price,
            quantity: self.quantity,
            unit_price: self.unit_price,
        })
    }
}

/// Inputs of sale creation, after reference allocation and client lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    pub reference: String,
    pub client_id: PartyId,
    pub client_account_id: AccountId,
    pub zone_id: ZoneId,
    /// `Pending` unless the caller asks for a `Draft`.
    pub status: SaleStatus,
    pub items: Vec<SaleLineInput>,
    pub notes: Option<String>,
}

/// A sale document.
///
/// Stock is deducted when the sale is created, not at a later confirmation.
/// The payment fields are a projection of the client-payment rows on the
/// account ledger and are recomputed after every money movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    id: DocumentId,
    reference: String,
    client_id: PartyId,
    client_account_id: AccountId,
    zone_id: ZoneId,
    date: DateTime<Utc>,
    status: SaleStatus,
    items: Vec<SaleItem>,
    #[serde(flatten)]
    payment: PaymentSummary,
    /// Accounts that paid into this sale; the paid amount is summed over them.
    payer_accounts: Vec<AccountId>,
    notes: Option<String>,
    created_by: UserId,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Sale {
    /// Create a sale and the goods-out movements it implies.
    pub fn create(new: NewSale, actor: &ActorContext) -> DomainResult<(Sale, Vec<LedgerEffect>)> {
        if !matches!(new.status, SaleStatus::Draft | SaleStatus::Pending) {
            return Err(DomainError::validation(format!(
                "a sale cannot be created as {}",
                new.status.as_str()
            )));
        }
        let items = build_items(new.items)?;
        let total = items_total(&items)?;

        let sale = Sale {
            id: DocumentId::new(),
            reference: new.reference,
            client_id: new.client_id,
            client_account_id: new.client_account_id,
            zone_id: new.zone_id,
            date: actor.occurred_at,
            status: new.status,
            items,
            payment: PaymentSummary::unpaid(total)?,
            payer_accounts: Vec::new(),
            notes: new.notes,
            created_by: actor.user_id,
            updated_at: actor.occurred_at,
            version: 0,
        };

        let effects: Vec<LedgerEffect> = sale
            .items
            .iter()
            .map(|item| {
                GoodsMovement::outbound(
                    item.product_id,
                    sale.zone_id,
                    item.quantity,
                    StockMovementType::Sale,
                    sale.reference.clone(),
                )
                .into()
            })
            .collect();

        Ok((sale, effects))
    }

    pub fn client_id(&self) -> PartyId {
        self.client_id
    }

    pub fn client_account_id(&self) -> AccountId {
        self.client_account_id
    }

    pub fn zone_id(&self) -> ZoneId {
        self.zone_id
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn items(&self) -> &[SaleItem] {
        &self.items
    }

    pub fn payment(&self) -> &PaymentSummary {
        &self.payment
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Replace the line items, returning the compensating stock movements.
    ///
    /// Lines are matched by id: a changed quantity moves only the difference,
    /// a changed product returns the old goods and sells the new ones, a
    /// removed line returns its goods. Stock therefore always reflects the
    /// current lines, so a later cancellation restores exactly what is held.
    pub fn update_items(
        &mut self,
        inputs: Vec<SaleLineInput>,
        actor: &ActorContext,
    ) -> DomainResult<Vec<LedgerEffect>> {
        if !self.status.items_editable() {
            return Err(DomainError::invalid_transition(
                SaleStatus::DOCUMENT,
                self.status.as_str(),
                "items_updated",
            ));
        }

        let mut seen = BTreeSet::new();
        for input in &inputs {
            if let Some(id) = input.id {
                if !self.items.iter().any(|i| i.id == id) {
                    return Err(DomainError::validation(format!("unknown sale line {id}")));
                }
                if !seen.insert(id) {
                    return Err(DomainError::validation(format!("duplicate sale line {id}")));
                }
            }
        }
        let new_items = build_items(inputs)?;

        let new_total = items_total(&new_items)?;
        if new_total < self.payment.paid_amount() {
            return Err(DomainError::validation(format!(
                "sale total {new_total} would drop below the amount already paid ({})",
                self.payment.paid_amount()
            )));
        }

        let mut effects = Vec::new();
        for old in &self.items {
            match new_items.iter().find(|n| n.id == old.id) {
                None => effects.push(self.goods_back(old.product_id, old.quantity)),
                Some(new) if new.product_id != old.product_id => {
                    effects.push(self.goods_back(old.product_id, old.quantity));
                    effects.push(self.goods_out(new.product_id, new.quantity));
                }
                Some(new) => {
                    let delta = new
                        .quantity
                        .checked_sub(old.quantity)
                        .ok_or_else(|| DomainError::validation("amount out of range"))?;
                    if delta > Decimal::ZERO {
                        effects.push(self.goods_out(new.product_id, delta));
                    } else if delta < Decimal::ZERO {
                        effects.push(self.goods_back(new.product_id, -delta));
                    }
                }
            }
        }
        for new in &new_items {
            if !self.items.iter().any(|old| old.id == new.id) {
                effects.push(self.goods_out(new.product_id, new.quantity));
            }
        }

        self.items = new_items;
        self.payment = PaymentSummary::compute(new_total, self.payment.paid_amount(), false)?;
        self.updated_at = actor.occurred_at;
        Ok(effects)
    }

    /// Plan a status change.
    pub fn plan_status(&self, to: SaleStatus) -> DomainResult<Transition<SaleStatus>> {
        let transition = plan_transition(self.status, to)?;
        if let Transition::Moved { to, .. } = transition {
            let required = match to {
                SaleStatus::Paid => Some(PaymentStatus::Paid),
                SaleStatus::PartiallyPaid => Some(PaymentStatus::PartiallyPaid),
                _ => None,
            };
            if let Some(required) = required {
                if self.payment.payment_status() != required {
                    return Err(DomainError::validation(format!(
                        "sale is {}; cannot mark it {}",
                        self.payment.payment_status().as_str(),
                        to.as_str()
                    )));
                }
            }
        }
        Ok(transition)
    }

    /// Apply a status change and return its ledger effects.
    ///
    /// `payments` are the account rows carrying this sale's reference; they
    /// are only read when entering `cancelled`, which puts the goods back and
    /// writes an offsetting posting for every payment.
    pub fn change_status(
        &mut self,
        to: SaleStatus,
        payments: &[AccountMovement],
        actor: &ActorContext,
    ) -> DomainResult<Vec<LedgerEffect>> {
        let transition = self.plan_status(to)?;
        let effects = match transition {
            Transition::Unchanged(_) => return Ok(Vec::new()),
            Transition::Moved { to: SaleStatus::Cancelled, .. } => self.reversal_effects(payments)?,
            Transition::Moved { .. } => Vec::new(),
        };
        self.status = to;
        self.updated_at = actor.occurred_at;
        Ok(effects)
    }

    /// Effects to reverse before the sale row may be deleted.
    ///
    /// A pending sale still holds stock (and possibly payments), so they are
    /// reversed first. A cancelled sale was already reversed on cancellation.
    pub fn plan_delete(&self, payments: &[AccountMovement]) -> DomainResult<Vec<LedgerEffect>> {
        match self.status {
            SaleStatus::Pending => self.reversal_effects(payments),
            SaleStatus::Cancelled => Ok(Vec::new()),
            other => Err(DomainError::invalid_transition(
                SaleStatus::DOCUMENT,
                other.as_str(),
                "deleted",
            )),
        }
    }

    /// Build the double-entry posting for a client payment.
    ///
    /// `source` is debited (the payer, normally the client's own account) and
    /// `target` is credited (a company cash/bank/internal account). Sales
    /// never become overpaid.
    pub fn plan_payment(
        &self,
        amount: Decimal,
        source: AccountId,
        target: AccountId,
    ) -> DomainResult<MoneyPosting> {
        if !self.status.is_payable() {
            return Err(DomainError::invalid_transition(
                SaleStatus::DOCUMENT,
                self.status.as_str(),
                "payment_recorded",
            ));
        }
        if amount > self.payment.remaining_amount() {
            return Err(DomainError::validation(format!(
                "payment {amount} exceeds remaining amount {}",
                self.payment.remaining_amount()
            )));
        }
        MoneyPosting::new(
            source,
            target,
            amount,
            AccountTransactionType::ClientPayment,
            self.reference.clone(),
        )
    }

    /// Remember `account` as a payer of this sale.
    pub fn register_payer(&mut self, account: AccountId) {
        if !self.payer_accounts.contains(&account) {
            self.payer_accounts.push(account);
        }
    }

    /// Recompute the paid amount from the ledger and advance the status.
    ///
    /// Paid = Σ(debit − credit) of client-payment rows with this reference on
    /// the payer accounts. Reversal rows carry the same type and reference, so
    /// they net out.
    pub fn refresh_payments(
        &mut self,
        rows: &[AccountMovement],
        actor: &ActorContext,
    ) -> DomainResult<()> {
        let paid: Decimal = rows
            .iter()
            .filter(|r| {
                r.transaction_type == AccountTransactionType::ClientPayment
                    && r.reference == self.reference
                    && self.payer_accounts.contains(&r.account_id)
            })
            .map(|r| r.debit - r.credit)
            .sum();

        let total = items_total(&self.items)?;
        if paid > total {
            return Err(DomainError::consistency(format!(
                "sale {} is paid {paid} over its total {total}",
                self.reference
            )));
        }
        self.payment = PaymentSummary::compute(total, paid, false)?;

        let next = match self.payment.payment_status() {
            PaymentStatus::Paid if self.status.is_payable() => Some(SaleStatus::Paid),
            PaymentStatus::PartiallyPaid
                if matches!(
                    self.status,
                    SaleStatus::Pending | SaleStatus::Confirmed | SaleStatus::PaymentPending
                ) =>
            {
                Some(SaleStatus::PartiallyPaid)
            }
            _ => None,
        };
        if let Some(next) = next {
            self.status = next;
        }
        self.updated_at = actor.occurred_at;
        Ok(())
    }

    /// Check the cached aggregates against the items.
    pub fn verify(&self) -> DomainResult<()> {
        let total = items_total(&self.items)?;
        if self.payment.total_amount() != total {
            return Err(DomainError::consistency(format!(
                "sale {} total {} != sum of items {}",
                self.reference,
                self.payment.total_amount(),
                total
            )));
        }
        self.payment.verify(false)
    }

    fn reversal_effects(&self, payments: &[AccountMovement]) -> DomainResult<Vec<LedgerEffect>> {
        let mut effects: Vec<LedgerEffect> = self
            .items
            .iter()
            .map(|item| {
                self.goods_back(item.product_id, item.quantity)
            })
            .collect();
        let own: Vec<AccountMovement> = payments
            .iter()
            .filter(|r| {
                r.reference == self.reference
                    && r.transaction_type == AccountTransactionType::ClientPayment
            })
            .cloned()
            .collect();
        effects.extend(reversals_for(&own)?.into_iter().map(LedgerEffect::from));
        Ok(effects)
    }

    fn goods_out(&self, product_id: ProductId, quantity: Decimal) -> LedgerEffect {
        GoodsMovement::outbound(
            product_id,
            self.zone_id,
            quantity,
            StockMovementType::Sale,
            self.reference.clone(),
        )
        .into()
    }

    fn goods_back(&self, product_id: ProductId, quantity: Decimal) -> LedgerEffect {
        GoodsMovement::inbound(
            product_id,
            self.zone_id,
            quantity,
            StockMovementType::Return,
            self.reference.clone(),
        )
        .into()
    }
}

impl Document for Sale {
    const KIND: &'static str = "sale";

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

fn build_items(inputs: Vec<SaleLineInput>) -> DomainResult<Vec<SaleItem>> {
    if inputs.is_empty() {
        return Err(DomainError::validation("a sale needs at least one item"));
    }
    inputs
        .into_iter()
        .map(|input| {
            input.validate()?;
            input.into_item()
        })
        .collect()
}

fn items_total(items: &[SaleItem]) -> DomainResult<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| {
        acc.checked_add(item.total_price)
            .ok_or_else(|| DomainError::validation("amount out of range"))
    })
}

impl core::str::FromStr for SaleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use SaleStatus::*;
        [
            Draft,
            Pending,
            Confirmed,
            PaymentPending,
            PartiallyPaid,
            Paid,
            Shipped,
            Delivered,
            Completed,
            Cancelled,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
        .ok_or_else(|| DomainError::validation(format!("unknown sale status: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbook_core::EntryId;
    use stockbook_core::MovementId;
    use rust_decimal_macros::dec;

    fn actor() -> ActorContext {
        ActorContext::now(UserId::new())
    }

    fn line(product_id: ProductId, quantity: Decimal, unit_price: Decimal) -> SaleLineInput {
        SaleLineInput {
            id: None,
            product_id,
            quantity,
            unit_price,
        }
    }

    fn new_sale(items: Vec<SaleLineInput>) -> NewSale {
        NewSale {
            reference: "SL-20240101-0001".into(),
            client_id: PartyId::new(),
            client_account_id: AccountId::new(),
            zone_id: ZoneId::new(),
            status: SaleStatus::Pending,
            items,
            notes: None,
        }
    }

    fn goods(effects: &[LedgerEffect]) -> Vec<&GoodsMovement> {
        effects
            .iter()
            .filter_map(|e| match e {
                LedgerEffect::Goods(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Rows the ledger would hold after `posting` was applied.
    fn rows_for(posting: &MoneyPosting) -> Vec<AccountMovement> {
        let entry = EntryId::new();
        let actor = actor();
        posting
            .legs()
            .into_iter()
            .map(|leg| AccountMovement {
                id: MovementId::new(),
                entry_id: entry,
                account_id: leg.account_id,
                date: actor.occurred_at,
                transaction_type: leg.transaction_type,
                reference: leg.reference.clone(),
                debit: (-leg.delta).max(Decimal::ZERO),
                credit: leg.delta.max(Decimal::ZERO),
                balance: Decimal::ZERO,
                notes: None,
                created_by: actor.user_id,
            })
            .collect()
    }

    #[test]
    fn creating_a_sale_deducts_stock_immediately() {
        // Sales move goods at creation; supplies, transfers and counts only
        // move goods on a later status transition.
        let product = ProductId::new();
        let (sale, effects) =
            Sale::create(new_sale(vec![line(product, dec!(10), dec!(10))]), &actor()).unwrap();

        assert_eq!(sale.status(), SaleStatus::Pending);
        assert_eq!(sale.payment().total_amount(), dec!(100));
        assert_eq!(sale.payment().payment_status(), PaymentStatus::Unpaid);
        let goods = goods(&effects);
        assert_eq!(goods.len(), 1);
        assert_eq!(goods[0].outflow(), Some(dec!(10)));
        assert_eq!(goods[0].transaction_type, StockMovementType::Sale);
    }

    #[test]
    fn create_rejects_empty_and_non_positive_lines() {
        assert!(Sale::create(new_sale(vec![]), &actor()).is_err());
        let err = Sale::create(new_sale(vec![line(ProductId::new(), dec!(0), dec!(1))]), &actor())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn oversized_line_amounts_are_rejected() {
        let huge = dec!(100000000000000000000);
        let err = Sale::create(new_sale(vec![line(ProductId::new(), huge, huge)]), &actor())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let lines = vec![
            line(ProductId::new(), dec!(1), Decimal::MAX),
            line(ProductId::new(), dec!(1), Decimal::MAX),
        ];
        let err = Sale::create(new_sale(lines), &actor()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn full_payment_marks_sale_paid() {
        let (mut sale, _) =
            Sale::create(new_sale(vec![line(ProductId::new(), dec!(10), dec!(10))]), &actor())
                .unwrap();
        let company = AccountId::new();
        let posting = sale
            .plan_payment(dec!(100), sale.client_account_id(), company)
            .unwrap();
        sale.register_payer(sale.client_account_id());
        sale.refresh_payments(&rows_for(&posting), &actor()).unwrap();

        assert_eq!(sale.payment().paid_amount(), dec!(100));
        assert_eq!(sale.payment().remaining_amount(), dec!(0));
        assert_eq!(sale.payment().payment_status(), PaymentStatus::Paid);
        assert_eq!(sale.status(), SaleStatus::Paid);
    }

    #[test]
    fn partial_payment_advances_to_partially_paid() {
        let (mut sale, _) =
            Sale::create(new_sale(vec![line(ProductId::new(), dec!(2), dec!(50))]), &actor())
                .unwrap();
        let posting = sale
            .plan_payment(dec!(30), sale.client_account_id(), AccountId::new())
            .unwrap();
        sale.register_payer(sale.client_account_id());
        sale.refresh_payments(&rows_for(&posting), &actor()).unwrap();
        assert_eq!(sale.status(), SaleStatus::PartiallyPaid);
        assert_eq!(sale.payment().remaining_amount(), dec!(70));
    }

    #[test]
    fn overpayment_is_rejected() {
        let (sale, _) =
            Sale::create(new_sale(vec![line(ProductId::new(), dec!(1), dec!(5))]), &actor())
                .unwrap();
        let err = sale
            .plan_payment(dec!(6), sale.client_account_id(), AccountId::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cancel_returns_goods_and_reverses_payments() {
        let product = ProductId::new();
        let (mut sale, _) =
            Sale::create(new_sale(vec![line(product, dec!(10), dec!(10))]), &actor()).unwrap();
        let company = AccountId::new();
        let posting = sale
            .plan_payment(dec!(100), sale.client_account_id(), company)
            .unwrap();
        let rows = rows_for(&posting);
        sale.register_payer(sale.client_account_id());
        sale.refresh_payments(&rows, &actor()).unwrap();

        let effects: Vec<LedgerEffect> = sale
            .change_status(SaleStatus::Cancelled, &rows, &actor())
            .unwrap();

        assert_eq!(sale.status(), SaleStatus::Cancelled);
        let goods = goods(&effects);
        assert_eq!(goods.len(), 1);
        assert_eq!(goods[0].transaction_type, StockMovementType::Return);
        let reversal = effects
            .iter()
            .find_map(|e| match e {
                LedgerEffect::Money(p) => Some(p),
                _ => None,
            })
            .unwrap();
        assert_eq!(reversal.debit_account, company);
        assert_eq!(reversal.credit_account, sale.client_account_id());
        assert_eq!(reversal.amount, dec!(100));

        let mut all_rows = rows.clone();
        all_rows.extend(rows_for(reversal));
        sale.refresh_payments(&all_rows, &actor()).unwrap();
        assert_eq!(sale.payment().paid_amount(), dec!(0));
        assert_eq!(sale.payment().remaining_amount(), dec!(100));
        assert_eq!(sale.status(), SaleStatus::Cancelled);
    }

    #[test]
    fn re_entering_cancelled_has_no_effect() {
        let (mut sale, _) =
            Sale::create(new_sale(vec![line(ProductId::new(), dec!(1), dec!(1))]), &actor())
                .unwrap();
        sale.change_status(SaleStatus::Cancelled, &[], &actor()).unwrap();
        let again = sale.change_status(SaleStatus::Cancelled, &[], &actor()).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn shipped_sale_cannot_be_cancelled_or_deleted() {
        let (mut sale, _) =
            Sale::create(new_sale(vec![line(ProductId::new(), dec!(1), dec!(1))]), &actor())
                .unwrap();
        sale.change_status(SaleStatus::Confirmed, &[], &actor()).unwrap();
        sale.change_status(SaleStatus::Shipped, &[], &actor()).unwrap();

        let err = sale.change_status(SaleStatus::Cancelled, &[], &actor()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        let err = sale.plan_delete(&[]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn cannot_mark_paid_without_payment() {
        let (mut sale, _) =
            Sale::create(new_sale(vec![line(ProductId::new(), dec!(1), dec!(1))]), &actor())
                .unwrap();
        let err = sale.change_status(SaleStatus::Paid, &[], &actor()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(sale.status(), SaleStatus::Pending);
    }

    #[test]
    fn pending_delete_restocks_and_cancelled_delete_is_free() {
        let (mut sale, _) =
            Sale::create(new_sale(vec![line(ProductId::new(), dec!(3), dec!(1))]), &actor())
                .unwrap();
        assert_eq!(goods(&sale.plan_delete(&[]).unwrap()).len(), 1);

        sale.change_status(SaleStatus::Cancelled, &[], &actor()).unwrap();
        assert!(sale.plan_delete(&[]).unwrap().is_empty());
    }

    #[test]
    fn editing_items_moves_only_the_difference() {
        let kept = ProductId::new();
        let dropped = ProductId::new();
        let (mut sale, _) = Sale::create(
            new_sale(vec![line(kept, dec!(5), dec!(2)), line(dropped, dec!(2), dec!(1))]),
            &actor(),
        )
        .unwrap();
        let kept_id = sale.items()[0].id;
        let added = ProductId::new();

        let effects: Vec<LedgerEffect> = sale
            .update_items(
                vec![
                    SaleLineInput {
                        id: Some(kept_id),
                        product_id: kept,
                        quantity: dec!(8),
                        unit_price: dec!(2),
                    },
                    line(added, dec!(1), dec!(4)),
                ],
                &actor(),
            )
            .unwrap();

        let goods = goods(&effects);
        assert_eq!(goods.len(), 3);
        let kept_move = goods.iter().find(|g| g.product_id == kept).unwrap();
        assert_eq!(kept_move.outflow(), Some(dec!(3)));
        let dropped_move = goods.iter().find(|g| g.product_id == dropped).unwrap();
        assert_eq!(dropped_move.transaction_type, StockMovementType::Return);
        let added_move = goods.iter().find(|g| g.product_id == added).unwrap();
        assert_eq!(added_move.outflow(), Some(dec!(1)));
        assert_eq!(sale.payment().total_amount(), dec!(20));
    }

    #[test]
    fn items_cannot_be_edited_after_confirmation() {
        let (mut sale, _) =
            Sale::create(new_sale(vec![line(ProductId::new(), dec!(1), dec!(1))]), &actor())
                .unwrap();
        sale.change_status(SaleStatus::Confirmed, &[], &actor()).unwrap();
        let err = sale
            .update_items(vec![line(ProductId::new(), dec!(1), dec!(1))], &actor())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }
}
