//! Ledger effects emitted by documents and applied by the mutator.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{ProductId, ZoneId};

use crate::account::MoneyPosting;
use crate::stock::{GoodsChange, GoodsMovement};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum LedgerEffect {
    Goods(GoodsMovement),
    Money(MoneyPosting),
}

impl From<GoodsMovement> for LedgerEffect {
    fn from(value: GoodsMovement) -> Self {
        LedgerEffect::Goods(value)
    }
}

impl From<MoneyPosting> for LedgerEffect {
    fn from(value: MoneyPosting) -> Self {
        LedgerEffect::Money(value)
    }
}

/// Net outflow per `(product, zone)` across the delta movements in `effects`.
///
/// Used to pre-validate stock for a whole document before any row is mutated,
/// so that two lines of the same product are checked against their sum.
/// Inflows to the same key offset outflows; keys that net to zero or gain
/// stock are omitted. Callers apply inflows before outflows (see
/// [`inflows_first`]) so that a passing pre-check cannot fail midway.
pub fn net_outflows(effects: &[LedgerEffect]) -> BTreeMap<(ProductId, ZoneId), Decimal> {
    let mut net: BTreeMap<(ProductId, ZoneId), Decimal> = BTreeMap::new();
    for effect in effects {
        if let LedgerEffect::Goods(movement) = effect {
            if let GoodsChange::Delta(delta) = movement.change {
                *net.entry((movement.product_id, movement.zone_id))
                    .or_insert(Decimal::ZERO) -= delta;
            }
        }
    }
    net.retain(|_, out| *out > Decimal::ZERO);
    net
}

/// Stable reorder putting goods inflows ahead of everything else.
pub fn inflows_first(mut effects: Vec<LedgerEffect>) -> Vec<LedgerEffect> {
    effects.sort_by_key(|effect| match effect {
        LedgerEffect::Goods(m) if m.outflow().is_none() => 0,
        _ => 1,
    });
    effects
}
