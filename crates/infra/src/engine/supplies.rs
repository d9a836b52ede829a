//! Stock supply (procurement receipt) operations.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use stockbook_core::{
    AccountId, ActorContext, Document, DocumentId, DomainError, ExpectedVersion, PartyId, ZoneId,
};
use stockbook_ledger::PartyKind;
use stockbook_purchasing::{NewSupply, SUPPLY_REFERENCE, Supply, SupplyLineInput, SupplyStatus};

use super::{Applied, DocumentEngine, EngineResult, load_locked, save};
use crate::mutator::{apply_effects, lock_accounts};
use crate::store::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateSupply {
    #[serde(default)]
    pub reference: Option<String>,
    pub supplier_id: PartyId,
    pub zone_id: ZoneId,
    pub items: Vec<SupplyLineInput>,
    /// Settled from `payment_account` when the supply is received.
    #[serde(default)]
    pub planned_payment: Option<Decimal>,
    #[serde(default)]
    pub payment_account: Option<AccountId>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateSupply {
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub status: Option<SupplyStatus>,
    #[serde(default)]
    pub items: Option<Vec<SupplyLineInput>>,
    #[serde(default)]
    pub planned_payment: Option<Decimal>,
    #[serde(default)]
    pub payment_account: Option<AccountId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordSupplyPayment {
    pub amount: Decimal,
    /// Debited company account.
    pub source_account: AccountId,
}

impl DocumentEngine {
    #[instrument(skip(self, command, actor), fields(supplier_id = %command.supplier_id, user_id = %actor.user_id))]
    pub async fn create_supply(
        &self,
        command: CreateSupply,
        actor: &ActorContext,
    ) -> EngineResult<Applied<Supply>> {
        let mut uow = self.store.begin().await?;
        let result = self.create_supply_in(uow.as_mut(), command, actor).await;
        self.finish(uow, result).await
    }

    async fn create_supply_in(
        &self,
        uow: &mut dyn UnitOfWork,
        command: CreateSupply,
        actor: &ActorContext,
    ) -> EngineResult<Applied<Supply>> {
        let supplier = uow
            .load_party(command.supplier_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("supplier {}", command.supplier_id)))?;
        supplier.ensure_kind(PartyKind::Supplier)?;
        lock_accounts(uow, &[supplier.account_id]).await?;
        ensure_company_account(uow, command.payment_account).await?;

        let reference = self
            .references
            .resolve(uow, Supply::KIND, SUPPLY_REFERENCE, command.reference, actor.occurred_at)
            .await?;
        let mut supply = Supply::create(
            NewSupply {
                reference,
                supplier_id: supplier.id,
                supplier_account_id: supplier.account_id,
                zone_id: command.zone_id,
                items: command.items,
                planned_payment: command.planned_payment,
                payment_account: command.payment_account,
                notes: command.notes,
            },
            actor,
        )?;
        supply.verify()?;
        save(uow, &mut supply).await?;

        info!(supply_id = %supply.id(), reference = supply.reference(), "supply created");
        Ok(Applied { document: supply, effects: Default::default() })
    }

    /// Edit a supply and/or move its status. Entering `received` puts the
    /// goods into stock and settles the planned payment, exactly once.
    #[instrument(skip(self, command, actor), fields(user_id = %actor.user_id))]
    pub async fn update_supply(
        &self,
        id: DocumentId,
        command: UpdateSupply,
        actor: &ActorContext,
    ) -> EngineResult<Applied<Supply>> {
        let mut uow = self.store.begin().await?;
        let result = update_supply_in(uow.as_mut(), id, command, actor).await;
        self.finish(uow, result).await
    }

    /// Record an additional payment to the supplier of a received supply.
    #[instrument(skip(self, command, actor), fields(amount = %command.amount, user_id = %actor.user_id))]
    pub async fn record_supply_payment(
        &self,
        id: DocumentId,
        command: RecordSupplyPayment,
        actor: &ActorContext,
    ) -> EngineResult<Applied<Supply>> {
        let mut uow = self.store.begin().await?;
        let result = record_supply_payment_in(uow.as_mut(), id, command, actor).await;
        self.finish(uow, result).await
    }
}

async fn update_supply_in(
    uow: &mut dyn UnitOfWork,
    id: DocumentId,
    command: UpdateSupply,
    actor: &ActorContext,
) -> EngineResult<Applied<Supply>> {
    let mut supply: Supply = load_locked(uow, id).await?;
    ExpectedVersion::from(command.expected_version).check(supply.version())?;

    if let Some(items) = command.items {
        supply.update_items(items, actor)?;
    }
    if command.planned_payment.is_some() || command.payment_account.is_some() {
        let amount = command.planned_payment.or(supply.planned_payment());
        let account = command.payment_account.or(supply.payment_account());
        ensure_company_account(uow, account).await?;
        supply.set_planned_payment(amount, account, actor)?;
    }
    let effects = match command.status {
        Some(status) => supply.change_status(status, actor)?,
        None => Vec::new(),
    };

    let applied = apply_effects(uow, effects, actor).await?;
    refresh(uow, &mut supply, actor).await?;
    save(uow, &mut supply).await?;
    Ok(Applied { document: supply, effects: applied })
}

async fn record_supply_payment_in(
    uow: &mut dyn UnitOfWork,
    id: DocumentId,
    command: RecordSupplyPayment,
    actor: &ActorContext,
) -> EngineResult<Applied<Supply>> {
    let mut supply: Supply = load_locked(uow, id).await?;
    ensure_company_account(uow, Some(command.source_account)).await?;

    let posting = supply.plan_payment(command.amount, command.source_account)?;
    let applied = apply_effects(uow, vec![posting.into()], actor).await?;
    refresh(uow, &mut supply, actor).await?;
    save(uow, &mut supply).await?;

    info!(
        reference = supply.reference(),
        paid = %supply.payment().paid_amount(),
        payment_status = supply.payment().payment_status().as_str(),
        "supplier payment recorded"
    );
    Ok(Applied { document: supply, effects: applied })
}

/// The account paying a supplier must exist and be a company account.
async fn ensure_company_account(
    uow: &mut dyn UnitOfWork,
    account: Option<AccountId>,
) -> EngineResult<()> {
    let Some(id) = account else {
        return Ok(());
    };
    let accounts = lock_accounts(uow, &[id]).await?;
    if let Some(account) = accounts.get(&id).filter(|a| !a.account_type.is_company()) {
        return Err(DomainError::validation(format!(
            "suppliers are paid from a company account, not the {} account {}",
            account.account_type.as_str(),
            account.id
        ))
        .into());
    }
    Ok(())
}

async fn refresh(
    uow: &mut dyn UnitOfWork,
    supply: &mut Supply,
    actor: &ActorContext,
) -> EngineResult<()> {
    let rows = uow.account_movements_by_reference(supply.reference()).await?;
    supply.refresh_payments(&rows, actor)?;
    supply.verify()?;
    Ok(())
}
