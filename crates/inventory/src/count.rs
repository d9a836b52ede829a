use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{
    ActorContext, Document, DocumentId, DomainError, DomainResult, LineId, ProductId,
    ReferenceFormat, StatusMachine, Transition, UserId, ZoneId, plan_transition,
};
use stockbook_ledger::{GoodsMovement, LedgerEffect, StockMovementType};

/// `INV-YYYY-NNN`
pub const COUNT_REFERENCE: ReferenceFormat = ReferenceFormat::yearly("INV");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    Draft,
    InProgress,
    Completed,
    Cancelled,
}

impl CountStatus {
    pub fn items_editable(self) -> bool {
        matches!(self, CountStatus::Draft | CountStatus::InProgress)
    }
}

impl StatusMachine for CountStatus {
    const DOCUMENT: &'static str = "inventory";

    fn can_transition(self, to: Self) -> bool {
        use CountStatus::*;
        matches!(
            (self, to),
            (Draft, InProgress | Cancelled) | (InProgress, Completed | Cancelled)
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            CountStatus::Draft => "draft",
            CountStatus::InProgress => "in_progress",
            CountStatus::Completed => "completed",
            CountStatus::Cancelled => "cancelled",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, CountStatus::Completed | CountStatus::Cancelled)
    }
}

impl core::str::FromStr for CountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CountStatus::Draft),
            "in_progress" => Ok(CountStatus::InProgress),
            "completed" => Ok(CountStatus::Completed),
            "cancelled" => Ok(CountStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown inventory status: {other}"))),
        }
    }
}

/// One counted product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountItem {
    pub id: LineId,
    pub product_id: ProductId,
    pub expected_quantity: Decimal,
    pub actual_quantity: Decimal,
    /// Always `actual_quantity - expected_quantity`.
    pub difference: Decimal,
}

impl CountItem {
    fn new(
        id: LineId,
        product_id: ProductId,
        expected_quantity: Decimal,
        actual_quantity: Decimal,
    ) -> Self {
        Self {
            id,
            product_id,
            expected_quantity,
            actual_quantity,
            difference: actual_quantity - expected_quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountLineInput {
    #[serde(default)]
    pub id: Option<LineId>,
    pub product_id: ProductId,
    /// Filled from the current stock level when absent.
    #[serde(default)]
    pub expected_quantity: Option<Decimal>,
    pub actual_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCount {
    pub reference: String,
    pub zone_id: ZoneId,
    pub items: Vec<CountLineInput>,
    pub notes: Option<String>,
}

/// Physical count of one zone.
///
/// Completion overwrites the stock level of every counted product with the
/// actual quantity. The count is authoritative, so the level is set rather
/// than adjusted; the stock card still receives the exact difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCount {
    id: DocumentId,
    reference: String,
    zone_id: ZoneId,
    date: DateTime<Utc>,
    status: CountStatus,
    items: Vec<CountItem>,
    notes: Option<String>,
    created_by: UserId,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl InventoryCount {
    /// `on_hand` holds the current level of each product in the zone; products
    /// without a level count as zero.
    pub fn create(
        new: NewCount,
        on_hand: &BTreeMap<ProductId, Decimal>,
        actor: &ActorContext,
    ) -> DomainResult<InventoryCount> {
        Ok(InventoryCount {
            id: DocumentId::new(),
            reference: new.reference,
            zone_id: new.zone_id,
            date: actor.occurred_at,
            status: CountStatus::Draft,
            items: build_items(new.items, on_hand)?,
            notes: new.notes,
            created_by: actor.user_id,
            updated_at: actor.occurred_at,
            version: 0,
        })
    }

    pub fn zone_id(&self) -> ZoneId {
        self.zone_id
    }

    pub fn status(&self) -> CountStatus {
        self.status
    }

    pub fn items(&self) -> &[CountItem] {
        &self.items
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn products(&self) -> Vec<ProductId> {
        self.items.iter().map(|i| i.product_id).collect()
    }

    pub fn update_items(
        &mut self,
        inputs: Vec<CountLineInput>,
        on_hand: &BTreeMap<ProductId, Decimal>,
        actor: &ActorContext,
    ) -> DomainResult<()> {
        if !self.status.items_editable() {
            return Err(DomainError::invalid_transition(
                CountStatus::DOCUMENT,
                self.status.as_str(),
                "items_updated",
            ));
        }
        self.items = build_items(inputs, on_hand)?;
        self.updated_at = actor.occurred_at;
        Ok(())
    }

    pub fn plan_status(&self, to: CountStatus) -> DomainResult<Transition<CountStatus>> {
        plan_transition(self.status, to)
    }

    /// Apply a status change and return its ledger effects.
    ///
    /// On the edge into `completed`, `on_hand` must hold the locked level of
    /// every counted product. Expected quantities are refreshed from it, so
    /// `difference` equals exactly what the overwrite changes even if stock
    /// moved since the line was entered.
    pub fn change_status(
        &mut self,
        to: CountStatus,
        on_hand: &BTreeMap<ProductId, Decimal>,
        actor: &ActorContext,
    ) -> DomainResult<Vec<LedgerEffect>> {
        let effects = match self.plan_status(to)? {
            Transition::Unchanged(_) => return Ok(Vec::new()),
            Transition::Moved { to: CountStatus::Completed, .. } => self.complete(on_hand)?,
            Transition::Moved { .. } => Vec::new(),
        };
        self.status = to;
        self.updated_at = actor.occurred_at;
        Ok(effects)
    }

    fn complete(&mut self, on_hand: &BTreeMap<ProductId, Decimal>) -> DomainResult<Vec<LedgerEffect>> {
        if self.items.is_empty() {
            return Err(DomainError::validation("an inventory needs at least one counted item"));
        }
        let mut refreshed = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let current = on_hand.get(&item.product_id).copied().ok_or_else(|| {
                DomainError::consistency(format!(
                    "no locked stock level for product {} in zone {}",
                    item.product_id, self.zone_id
                ))
            })?;
            refreshed.push(CountItem::new(
                item.id,
                item.product_id,
                current,
                item.actual_quantity,
            ));
        }
        self.items = refreshed;

        Ok(self
            .items
            .iter()
            .map(|item| {
                LedgerEffect::Goods(
                    GoodsMovement::set(
                        item.product_id,
                        self.zone_id,
                        item.actual_quantity,
                        StockMovementType::InventoryAdjustment,
                        self.reference.clone(),
                    )
                    .with_notes(format!(
                        "count: expected {}, actual {}",
                        item.expected_quantity, item.actual_quantity
                    )),
                )
            })
            .collect())
    }
}

impl Document for InventoryCount {
    const KIND: &'static str = "inventory";

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

fn build_items(
    inputs: Vec<CountLineInput>,
    on_hand: &BTreeMap<ProductId, Decimal>,
) -> DomainResult<Vec<CountItem>> {
    let mut seen = BTreeSet::new();
    inputs
        .into_iter()
        .map(|input| {
            if !seen.insert(input.product_id) {
                return Err(DomainError::validation(format!(
                    "product {} is counted twice",
                    input.product_id
                )));
            }
            if input.actual_quantity < Decimal::ZERO {
                return Err(DomainError::validation("actual_quantity must not be negative"));
            }
            let expected = match input.expected_quantity {
                Some(q) if q < Decimal::ZERO => {
                    return Err(DomainError::validation("expected_quantity must not be negative"));
                }
                Some(q) => q,
                None => on_hand
                    .get(&input.product_id)
                    .copied()
                    .unwrap_or(Decimal::ZERO),
            };
            Ok(CountItem::new(
                input.id.unwrap_or_default(),
                input.product_id,
                expected,
                input.actual_quantity,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockbook_core::MovementId;
    use stockbook_ledger::{GoodsChange, StockLevel};

    fn actor() -> ActorContext {
        ActorContext::now(UserId::new())
    }

    fn count(items: Vec<CountLineInput>, on_hand: &BTreeMap<ProductId, Decimal>) -> InventoryCount {
        InventoryCount::create(
            NewCount {
                reference: "INV-2024-001".into(),
                zone_id: ZoneId::new(),
                items,
                notes: None,
            },
            on_hand,
            &actor(),
        )
        .unwrap()
    }

    fn counted(product_id: ProductId, actual: Decimal) -> CountLineInput {
        CountLineInput {
            id: None,
            product_id,
            expected_quantity: None,
            actual_quantity: actual,
        }
    }

    #[test]
    fn expected_is_filled_from_stock_and_difference_recomputed() {
        let product = ProductId::new();
        let on_hand = BTreeMap::from([(product, dec!(20))]);
        let c = count(vec![counted(product, dec!(15))], &on_hand);
        assert_eq!(c.items()[0].expected_quantity, dec!(20));
        assert_eq!(c.items()[0].difference, dec!(-5));
    }

    #[test]
    fn completion_sets_level_to_actual_not_to_difference() {
        let product = ProductId::new();
        let on_hand = BTreeMap::from([(product, dec!(20))]);
        let mut c = count(vec![counted(product, dec!(15))], &on_hand);
        c.change_status(CountStatus::InProgress, &on_hand, &actor()).unwrap();
        let effects = c.change_status(CountStatus::Completed, &on_hand, &actor()).unwrap();

        let LedgerEffect::Goods(movement) = &effects[0] else {
            panic!("expected a goods effect");
        };
        assert_eq!(movement.change, GoodsChange::Set(dec!(15)));

        let mut level = StockLevel::empty(product, c.zone_id(), Utc::now());
        level.quantity = dec!(20);
        let row = level.apply(movement, MovementId::new(), &actor()).unwrap();
        assert_eq!(level.quantity, dec!(15));
        assert_eq!(row.quantity_out, dec!(5));
        assert_eq!(row.net(), c.items()[0].difference);
    }

    #[test]
    fn completion_refreshes_expected_from_locked_level() {
        let product = ProductId::new();
        let mut c = count(vec![counted(product, dec!(15))], &BTreeMap::from([(product, dec!(20))]));
        c.change_status(CountStatus::InProgress, &BTreeMap::new(), &actor()).unwrap();

        let moved_since = BTreeMap::from([(product, dec!(12))]);
        c.change_status(CountStatus::Completed, &moved_since, &actor()).unwrap();
        assert_eq!(c.items()[0].expected_quantity, dec!(12));
        assert_eq!(c.items()[0].difference, dec!(3));
    }

    #[test]
    fn completion_is_applied_once() {
        let product = ProductId::new();
        let on_hand = BTreeMap::from([(product, dec!(1))]);
        let mut c = count(vec![counted(product, dec!(1))], &on_hand);
        c.change_status(CountStatus::InProgress, &on_hand, &actor()).unwrap();
        assert_eq!(c.change_status(CountStatus::Completed, &on_hand, &actor()).unwrap().len(), 1);
        assert!(c.change_status(CountStatus::Completed, &on_hand, &actor()).unwrap().is_empty());
    }

    #[test]
    fn duplicate_products_are_rejected() {
        let product = ProductId::new();
        let err = InventoryCount::create(
            NewCount {
                reference: "INV-2024-002".into(),
                zone_id: ZoneId::new(),
                items: vec![counted(product, dec!(1)), counted(product, dec!(2))],
                notes: None,
            },
            &BTreeMap::new(),
            &actor(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn draft_cannot_jump_to_completed() {
        let product = ProductId::new();
        let mut c = count(vec![counted(product, dec!(1))], &BTreeMap::new());
        assert!(matches!(
            c.change_status(CountStatus::Completed, &BTreeMap::new(), &actor()),
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }
}
