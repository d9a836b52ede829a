use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{
    ActorContext, Document, DocumentId, DomainError, DomainResult, LineId, ProductId,
    ReferenceFormat, StatusMachine, Transition, UserId, ZoneId, plan_transition,
};
use stockbook_ledger::{GoodsMovement, LedgerEffect, StockMovementType};

/// `TRF-YYYYMMDD-NNNN`
pub const TRANSFER_REFERENCE: ReferenceFormat = ReferenceFormat::daily("TRF");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Partial,
    Completed,
    Cancelled,
}

impl StatusMachine for TransferStatus {
    const DOCUMENT: &'static str = "stock_transfer";

    fn can_transition(self, to: Self) -> bool {
        use TransferStatus::*;
        matches!(
            (self, to),
            (Pending, Partial | Completed | Cancelled) | (Partial, Completed | Cancelled)
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Partial => "partial",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }
}

impl core::str::FromStr for TransferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "partial" => Ok(TransferStatus::Partial),
            "completed" => Ok(TransferStatus::Completed),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown transfer status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub id: LineId,
    pub product_id: ProductId,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLineInput {
    #[serde(default)]
    pub id: Option<LineId>,
    pub product_id: ProductId,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub reference: String,
    pub from_zone: ZoneId,
    pub to_zone: ZoneId,
    pub items: Vec<TransferLineInput>,
    pub notes: Option<String>,
}

/// Movement of goods between two zones.
///
/// Completing the transfer writes a `transfer_out` row at the source zone and
/// a `transfer_in` row at the destination for every line, all under the
/// transfer's reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransfer {
    id: DocumentId,
    reference: String,
    from_zone: ZoneId,
    to_zone: ZoneId,
    date: DateTime<Utc>,
    status: TransferStatus,
    items: Vec<TransferItem>,
    notes: Option<String>,
    created_by: UserId,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl StockTransfer {
    pub fn create(new: NewTransfer, actor: &ActorContext) -> DomainResult<StockTransfer> {
        if new.from_zone == new.to_zone {
            return Err(DomainError::validation(
                "source and destination zones must differ",
            ));
        }
        Ok(StockTransfer {
            id: DocumentId::new(),
            reference: new.reference,
            from_zone: new.from_zone,
            to_zone: new.to_zone,
            date: actor.occurred_at,
            status: TransferStatus::Pending,
            items: build_items(new.items)?,
            notes: new.notes,
            created_by: actor.user_id,
            updated_at: actor.occurred_at,
            version: 0,
        })
    }

    pub fn from_zone(&self) -> ZoneId {
        self.from_zone
    }

    pub fn to_zone(&self) -> ZoneId {
        self.to_zone
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn items(&self) -> &[TransferItem] {
        &self.items
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn update_items(
        &mut self,
        inputs: Vec<TransferLineInput>,
        actor: &ActorContext,
    ) -> DomainResult<()> {
        if !matches!(self.status, TransferStatus::Pending | TransferStatus::Partial) {
            return Err(DomainError::invalid_transition(
                TransferStatus::DOCUMENT,
                self.status.as_str(),
                "items_updated",
            ));
        }
        self.items = build_items(inputs)?;
        self.updated_at = actor.occurred_at;
        Ok(())
    }

    pub fn plan_status(&self, to: TransferStatus) -> DomainResult<Transition<TransferStatus>> {
        plan_transition(self.status, to)
    }

    /// Apply a status change and return its ledger effects.
    ///
    /// Effects exist only on the edge into `completed`. Outflows and inflows
    /// are interleaved per line; the caller pre-validates the summed outflow
    /// per product before applying any of them.
    pub fn change_status(
        &mut self,
        to: TransferStatus,
        actor: &ActorContext,
    ) -> DomainResult<Vec<LedgerEffect>> {
        let effects = match self.plan_status(to)? {
            Transition::Unchanged(_) => return Ok(Vec::new()),
            Transition::Moved { to: TransferStatus::Completed, .. } => self.completion_effects(),
            Transition::Moved { .. } => Vec::new(),
        };
        self.status = to;
        self.updated_at = actor.occurred_at;
        Ok(effects)
    }

    fn completion_effects(&self) -> Vec<LedgerEffect> {
        self.items
            .iter()
            .flat_map(|item| {
                [
                    LedgerEffect::Goods(GoodsMovement::outbound(
                        item.product_id,
                        self.from_zone,
                        item.quantity,
                        StockMovementType::TransferOut,
                        self.reference.clone(),
                    )),
                    LedgerEffect::Goods(GoodsMovement::inbound(
                        item.product_id,
                        self.to_zone,
                        item.quantity,
                        StockMovementType::TransferIn,
                        self.reference.clone(),
                    )),
                ]
            })
            .collect()
    }
}

impl Document for StockTransfer {
    const KIND: &'static str = "stock_transfer";

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

fn build_items(inputs: Vec<TransferLineInput>) -> DomainResult<Vec<TransferItem>> {
    if inputs.is_empty() {
        return Err(DomainError::validation("a transfer needs at least one item"));
    }
    inputs
        .into_iter()
        .map(|input| {
            if input.quantity <= Decimal::ZERO {
                return Err(DomainError::validation("quantity must be positive"));
            }
            Ok(TransferItem {
                id: input.id.unwrap_or_default(),
                product_id: input.product_id,
                quantity: input.quantity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockbook_ledger::net_outflows;

    fn actor() -> ActorContext {
        ActorContext::now(UserId::new())
    }

    fn transfer(items: Vec<(ProductId, Decimal)>) -> StockTransfer {
        StockTransfer::create(
            NewTransfer {
                reference: "TRF-20240101-0001".into(),
                from_zone: ZoneId::new(),
                to_zone: ZoneId::new(),
                items: items
                    .into_iter()
                    .map(|(product_id, quantity)| TransferLineInput {
                        id: None,
                        product_id,
                        quantity,
                    })
                    .collect(),
                notes: None,
            },
            &actor(),
        )
        .unwrap()
    }

    #[test]
    fn same_zone_transfer_is_rejected() {
        let zone = ZoneId::new();
        let err = StockTransfer::create(
            NewTransfer {
                reference: "TRF-1".into(),
                from_zone: zone,
                to_zone: zone,
                items: vec![],
                notes: None,
            },
            &actor(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn completion_pairs_out_and_in_per_line() {
        let product = ProductId::new();
        let mut t = transfer(vec![(product, dec!(3)), (product, dec!(2))]);
        let effects = t.change_status(TransferStatus::Completed, &actor()).unwrap();
        assert_eq!(effects.len(), 4);

        let required = net_outflows(&effects);
        assert_eq!(required[&(product, t.from_zone())], dec!(5));
        assert!(!required.contains_key(&(product, t.to_zone())));
    }

    #[test]
    fn pending_and_partial_have_no_effect_and_completion_is_once() {
        let mut t = transfer(vec![(ProductId::new(), dec!(1))]);
        assert!(t.change_status(TransferStatus::Partial, &actor()).unwrap().is_empty());
        assert_eq!(t.change_status(TransferStatus::Completed, &actor()).unwrap().len(), 2);
        assert!(t.change_status(TransferStatus::Completed, &actor()).unwrap().is_empty());
        assert!(t.change_status(TransferStatus::Cancelled, &actor()).is_err());
    }
}
