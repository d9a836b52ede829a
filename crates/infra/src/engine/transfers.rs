//! Stock transfer operations.

use serde::Deserialize;
use tracing::{info, instrument};

use stockbook_core::{ActorContext, Document, DocumentId, ExpectedVersion, ZoneId};
use stockbook_inventory::{
    NewTransfer, StockTransfer, TRANSFER_REFERENCE, TransferLineInput, TransferStatus,
};

use super::{Applied, DocumentEngine, EngineResult, load_locked, save};
use crate::mutator::apply_effects;
use crate::store::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateTransfer {
    #[serde(default)]
    pub reference: Option<String>,
    pub from_zone: ZoneId,
    pub to_zone: ZoneId,
    pub items: Vec<TransferLineInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateTransfer {
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub status: Option<TransferStatus>,
    #[serde(default)]
    pub items: Option<Vec<TransferLineInput>>,
}

impl DocumentEngine {
    #[instrument(skip(self, command, actor), fields(from_zone = %command.from_zone, to_zone = %command.to_zone, user_id = %actor.user_id))]
    pub async fn create_transfer(
        &self,
        command: CreateTransfer,
        actor: &ActorContext,
    ) -> EngineResult<Applied<StockTransfer>> {
        let mut uow = self.store.begin().await?;
        let result = self.create_transfer_in(uow.as_mut(), command, actor).await;
        self.finish(uow, result).await
    }

    async fn create_transfer_in(
        &self,
        uow: &mut dyn UnitOfWork,
        command: CreateTransfer,
        actor: &ActorContext,
    ) -> EngineResult<Applied<StockTransfer>> {
        let reference = self
            .references
            .resolve(
                uow,
                StockTransfer::KIND,
                TRANSFER_REFERENCE,
                command.reference,
                actor.occurred_at,
            )
            .await?;
        let mut transfer = StockTransfer::create(
            NewTransfer {
                reference,
                from_zone: command.from_zone,
                to_zone: command.to_zone,
                items: command.items,
                notes: command.notes,
            },
            actor,
        )?;
        save(uow, &mut transfer).await?;

        info!(transfer_id = %transfer.id(), reference = transfer.reference(), "transfer created");
        Ok(Applied { document: transfer, effects: Default::default() })
    }

    /// Edit and/or move a transfer. Completing it moves the goods between
    /// zones; the source zone must hold every summed quantity first.
    #[instrument(skip(self, command, actor), fields(user_id = %actor.user_id))]
    pub async fn update_transfer(
        &self,
        id: DocumentId,
        command: UpdateTransfer,
        actor: &ActorContext,
    ) -> EngineResult<Applied<StockTransfer>> {
        let mut uow = self.store.begin().await?;
        let result = update_transfer_in(uow.as_mut(), id, command, actor).await;
        self.finish(uow, result).await
    }
}

async fn update_transfer_in(
    uow: &mut dyn UnitOfWork,
    id: DocumentId,
    command: UpdateTransfer,
    actor: &ActorContext,
) -> EngineResult<Applied<StockTransfer>> {
    let mut transfer: StockTransfer = load_locked(uow, id).await?;
    ExpectedVersion::from(command.expected_version).check(transfer.version())?;

    if let Some(items) = command.items {
        transfer.update_items(items, actor)?;
    }
    let effects = match command.status {
        Some(status) => transfer.change_status(status, actor)?,
        None => Vec::new(),
    };

    let applied = apply_effects(uow, effects, actor).await?;
    save(uow, &mut transfer).await?;
    Ok(Applied { document: transfer, effects: applied })
}
