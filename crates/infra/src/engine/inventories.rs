//! Physical inventory count operations.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use stockbook_core::{ActorContext, Document, DocumentId, ExpectedVersion, ProductId, ZoneId};
use stockbook_inventory::{COUNT_REFERENCE, CountLineInput, CountStatus, InventoryCount, NewCount};

use super::{Applied, DocumentEngine, EngineResult, load_locked, save};
use crate::mutator::apply_effects;
use crate::store::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateInventory {
    #[serde(default)]
    pub reference: Option<String>,
    pub zone_id: ZoneId,
    pub items: Vec<CountLineInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateInventory {
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub status: Option<CountStatus>,
    #[serde(default)]
    pub items: Option<Vec<CountLineInput>>,
}

impl DocumentEngine {
    /// Open a count. Missing expected quantities are filled from the current
    /// stock levels of the zone.
    #[instrument(skip(self, command, actor), fields(zone_id = %command.zone_id, user_id = %actor.user_id))]
    pub async fn create_inventory(
        &self,
        command: CreateInventory,
        actor: &ActorContext,
    ) -> EngineResult<Applied<InventoryCount>> {
        let mut uow = self.store.begin().await?;
        let result = self.create_inventory_in(uow.as_mut(), command, actor).await;
        self.finish(uow, result).await
    }

    async fn create_inventory_in(
        &self,
        uow: &mut dyn UnitOfWork,
        command: CreateInventory,
        actor: &ActorContext,
    ) -> EngineResult<Applied<InventoryCount>> {
        let products: Vec<ProductId> = command.items.iter().map(|i| i.product_id).collect();
        let on_hand = current_levels(uow, command.zone_id, &products).await?;

        let reference = self
            .references
            .resolve(
                uow,
                InventoryCount::KIND,
                COUNT_REFERENCE,
                command.reference,
                actor.occurred_at,
            )
            .await?;
        let mut count = InventoryCount::create(
            NewCount {
                reference,
                zone_id: command.zone_id,
                items: command.items,
                notes: command.notes,
            },
            &on_hand,
            actor,
        )?;
        save(uow, &mut count).await?;

        info!(inventory_id = %count.id(), reference = count.reference(), "inventory count opened");
        Ok(Applied { document: count, effects: Default::default() })
    }

    /// Edit and/or move a count. Completing it overwrites every counted
    /// stock level with the actual quantity.
    #[instrument(skip(self, command, actor), fields(user_id = %actor.user_id))]
    pub async fn update_inventory(
        &self,
        id: DocumentId,
        command: UpdateInventory,
        actor: &ActorContext,
    ) -> EngineResult<Applied<InventoryCount>> {
        let mut uow = self.store.begin().await?;
        let result = update_inventory_in(uow.as_mut(), id, command, actor).await;
        self.finish(uow, result).await
    }
}

async fn update_inventory_in(
    uow: &mut dyn UnitOfWork,
    id: DocumentId,
    command: UpdateInventory,
    actor: &ActorContext,
) -> EngineResult<Applied<InventoryCount>> {
    let mut count: InventoryCount = load_locked(uow, id).await?;
    ExpectedVersion::from(command.expected_version).check(count.version())?;

    if let Some(items) = command.items {
        let products: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
        let on_hand = current_levels(uow, count.zone_id(), &products).await?;
        count.update_items(items, &on_hand, actor)?;
    }

    let effects = match command.status {
        Some(status) => {
            let on_hand = if count.plan_status(status)?.enters(CountStatus::Completed) {
                locked_levels(uow, count.zone_id(), &count.products(), actor).await?
            } else {
                BTreeMap::new()
            };
            count.change_status(status, &on_hand, actor)?
        }
        None => Vec::new(),
    };

    let applied = apply_effects(uow, effects, actor).await?;
    save(uow, &mut count).await?;
    Ok(Applied { document: count, effects: applied })
}

async fn current_levels(
    uow: &mut dyn UnitOfWork,
    zone_id: ZoneId,
    products: &[ProductId],
) -> EngineResult<BTreeMap<ProductId, Decimal>> {
    let mut levels = BTreeMap::new();
    for &product_id in products {
        levels.insert(product_id, uow.stock_quantity(product_id, zone_id).await?);
    }
    Ok(levels)
}

/// Lock the counted levels in product order and read their quantities.
async fn locked_levels(
    uow: &mut dyn UnitOfWork,
    zone_id: ZoneId,
    products: &[ProductId],
    actor: &ActorContext,
) -> EngineResult<BTreeMap<ProductId, Decimal>> {
    let mut sorted = products.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut levels = BTreeMap::new();
    for product_id in sorted {
        let level = uow
            .lock_stock_level(product_id, zone_id, actor.occurred_at)
            .await?;
        levels.insert(product_id, level.quantity);
    }
    Ok(levels)
}
