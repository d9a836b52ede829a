//! Goods side of the ledger: stock levels (balance) and stock movements (log).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{ActorContext, DomainError, DomainResult, MovementId, ProductId, UserId, ZoneId};

/// Current on-hand quantity of one product in one zone.
///
/// Created lazily at zero on the first movement; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub zone_id: ZoneId,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Kind of goods movement recorded on the stock card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockMovementType {
    Supply,
    Sale,
    TransferIn,
    TransferOut,
    InventoryAdjustment,
    Production,
    Return,
}

impl StockMovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            StockMovementType::Supply => "supply",
            StockMovementType::Sale => "sale",
            StockMovementType::TransferIn => "transfer_in",
            StockMovementType::TransferOut => "transfer_out",
            StockMovementType::InventoryAdjustment => "inventory_adjustment",
            StockMovementType::Production => "production",
            StockMovementType::Return => "return",
        }
    }
}

impl core::str::FromStr for StockMovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supply" => Ok(StockMovementType::Supply),
            "sale" => Ok(StockMovementType::Sale),
            "transfer_in" => Ok(StockMovementType::TransferIn),
            "transfer_out" => Ok(StockMovementType::TransferOut),
            "inventory_adjustment" => Ok(StockMovementType::InventoryAdjustment),
            "production" => Ok(StockMovementType::Production),
            "return" => Ok(StockMovementType::Return),
            other => Err(DomainError::validation(format!(
                "unknown stock movement type: {other}"
            ))),
        }
    }
}

/// How a goods movement changes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "quantity", rename_all = "snake_case")]
pub enum GoodsChange {
    /// Signed delta: positive enters the zone, negative leaves it.
    Delta(Decimal),
    /// Authoritative overwrite (physical count). The ledger row carries the
    /// difference against the locked level.
    Set(Decimal),
}

/// A goods movement a document asks the mutator to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsMovement {
    pub product_id: ProductId,
    pub zone_id: ZoneId,
    pub change: GoodsChange,
    pub transaction_type: StockMovementType,
    pub reference: String,
    pub notes: Option<String>,
}

impl GoodsMovement {
    pub fn inbound(
        product_id: ProductId,
        zone_id: ZoneId,
        quantity: Decimal,
        transaction_type: StockMovementType,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            product_id,
            zone_id,
            change: GoodsChange::Delta(quantity),
            transaction_type,
            reference: reference.into(),
            notes: None,
        }
    }

    pub fn outbound(
        product_id: ProductId,
        zone_id: ZoneId,
        quantity: Decimal,
        transaction_type: StockMovementType,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            product_id,
            zone_id,
            change: GoodsChange::Delta(-quantity),
            transaction_type,
            reference: reference.into(),
            notes: None,
        }
    }

    pub fn set(
        product_id: ProductId,
        zone_id: ZoneId,
        quantity: Decimal,
        transaction_type: StockMovementType,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            product_id,
            zone_id,
            change: GoodsChange::Set(quantity),
            transaction_type,
            reference: reference.into(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Quantity this movement removes from the zone, if it is a delta outflow.
    pub fn outflow(&self) -> Option<Decimal> {
        match self.change {
            GoodsChange::Delta(d) if d < Decimal::ZERO => Some(-d),
            _ => None,
        }
    }
}

/// Immutable stock card row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub zone_id: ZoneId,
    pub date: DateTime<Utc>,
    pub transaction_type: StockMovementType,
    pub reference: String,
    pub quantity_in: Decimal,
    pub quantity_out: Decimal,
    /// Level right after this movement, for audit.
    pub balance_after: Decimal,
    pub notes: Option<String>,
    pub created_by: UserId,
}

impl StockMovement {
    pub fn net(&self) -> Decimal {
        self.quantity_in - self.quantity_out
    }
}

impl StockLevel {
    pub fn empty(product_id: ProductId, zone_id: ZoneId, at: DateTime<Utc>) -> Self {
        Self {
            product_id,
            zone_id,
            quantity: Decimal::ZERO,
            updated_at: at,
        }
    }

    /// Apply a movement to this level and produce the matching stock card row.
    ///
    /// Negative stock is forbidden: an outflow larger than the level fails with
    /// `InsufficientStock` and leaves the level untouched.
    pub fn apply(
        &mut self,
        movement: &GoodsMovement,
        id: MovementId,
        actor: &ActorContext,
    ) -> DomainResult<StockMovement> {
        if movement.product_id != self.product_id || movement.zone_id != self.zone_id {
            return Err(DomainError::consistency(format!(
                "movement for {}/{} applied to level {}/{}",
                movement.product_id, movement.zone_id, self.product_id, self.zone_id
            )));
        }

        let delta = match movement.change {
            GoodsChange::Delta(d) => {
                if d.is_zero() {
                    return Err(DomainError::validation("movement quantity must be non-zero"));
                }
                d
            }
            GoodsChange::Set(target) => {
                if target < Decimal::ZERO {
                    return Err(DomainError::validation(format!(
                        "counted quantity must not be negative: {target}"
                    )));
                }
                target
                    .checked_sub(self.quantity)
                    .ok_or_else(|| DomainError::validation("amount out of range"))?
            }
        };

        let new_quantity = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("amount out of range"))?;
        if new_quantity < Decimal::ZERO {
            return Err(DomainError::InsufficientStock {
                product_id: self.product_id,
                zone_id: self.zone_id,
                available: self.quantity,
                requested: -delta,
            });
        }

        self.quantity = new_quantity;
        self.updated_at = actor.occurred_at;

        Ok(StockMovement {
            id,
            product_id: self.product_id,
            zone_id: self.zone_id,
            date: actor.occurred_at,
            transaction_type: movement.transaction_type,
            reference: movement.reference.clone(),
            quantity_in: delta.max(Decimal::ZERO),
            quantity_out: (-delta).max(Decimal::ZERO),
            balance_after: new_quantity,
            notes: movement.notes.clone(),
            created_by: actor.user_id,
        })
    }
}
