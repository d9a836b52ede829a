//! Sale operations.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use stockbook_core::{
    AccountId, ActorContext, Document, DocumentId, DomainError, ExpectedVersion, PartyId, ZoneId,
};
use stockbook_ledger::PartyKind;
use stockbook_sales::{NewSale, SALE_REFERENCE, Sale, SaleLineInput, SaleStatus};

use super::{Applied, DocumentEngine, EngineResult, load_locked, save};
use crate::mutator::{AppliedEffects, apply_effects, lock_accounts};
use crate::store::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateSale {
    #[serde(default)]
    pub reference: Option<String>,
    pub client_id: PartyId,
    pub zone_id: ZoneId,
    /// `pending` when omitted.
    #[serde(default)]
    pub status: Option<SaleStatus>,
    pub items: Vec<SaleLineInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateSale {
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub status: Option<SaleStatus>,
    #[serde(default)]
    pub items: Option<Vec<SaleLineInput>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordSalePayment {
    pub amount: Decimal,
    /// Debited account; the client's own account when omitted.
    #[serde(default)]
    pub source_account: Option<AccountId>,
    /// Credited company account.
    pub target_account: AccountId,
}

impl DocumentEngine {
    /// Create a sale. Stock leaves the zone immediately.
    #[instrument(skip(self, command, actor), fields(client_id = %command.client_id, user_id = %actor.user_id))]
    pub async fn create_sale(
        &self,
        command: CreateSale,
        actor: &ActorContext,
    ) -> EngineResult<Applied<Sale>> {
        let mut uow = self.store.begin().await?;
        let result = self.create_sale_in(uow.as_mut(), command, actor).await;
        self.finish(uow, result).await
    }

    async fn create_sale_in(
        &self,
        uow: &mut dyn UnitOfWork,
        command: CreateSale,
        actor: &ActorContext,
    ) -> EngineResult<Applied<Sale>> {
        let client = uow
            .load_party(command.client_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("client {}", command.client_id)))?;
        client.ensure_kind(PartyKind::Client)?;
        lock_accounts(uow, &[client.account_id]).await?;

        let reference = self
            .references
            .resolve(uow, Sale::KIND, SALE_REFERENCE, command.reference, actor.occurred_at)
            .await?;
        let (mut sale, effects) = Sale::create(
            NewSale {
                reference,
                client_id: client.id,
                client_account_id: client.account_id,
                zone_id: command.zone_id,
                status: command.status.unwrap_or(SaleStatus::Pending),
                items: command.items,
                notes: command.notes,
            },
            actor,
        )?;

        let applied = apply_effects(uow, effects, actor).await?;
        sale.verify()?;
        save(uow, &mut sale).await?;

        info!(sale_id = %sale.id(), reference = sale.reference(), "sale created");
        Ok(Applied { document: sale, effects: applied })
    }

    /// Edit items and/or move the status. Cancelling puts the goods back and
    /// reverses every payment.
    #[instrument(skip(self, command, actor), fields(user_id = %actor.user_id))]
    pub async fn update_sale(
        &self,
        id: DocumentId,
        command: UpdateSale,
        actor: &ActorContext,
    ) -> EngineResult<Applied<Sale>> {
        let mut uow = self.store.begin().await?;
        let result = update_sale_in(uow.as_mut(), id, command, actor).await;
        self.finish(uow, result).await
    }

    /// Record a client payment against a sale.
    #[instrument(skip(self, command, actor), fields(amount = %command.amount, user_id = %actor.user_id))]
    pub async fn record_sale_payment(
        &self,
        id: DocumentId,
        command: RecordSalePayment,
        actor: &ActorContext,
    ) -> EngineResult<Applied<Sale>> {
        let mut uow = self.store.begin().await?;
        let result = record_sale_payment_in(uow.as_mut(), id, command, actor).await;
        self.finish(uow, result).await
    }

    /// Delete a pending or cancelled sale.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn delete_sale(
        &self,
        id: DocumentId,
        actor: &ActorContext,
    ) -> EngineResult<AppliedEffects> {
        let mut uow = self.store.begin().await?;
        let result = delete_sale_in(uow.as_mut(), id, actor).await;
        self.finish(uow, result).await
    }
}

async fn update_sale_in(
    uow: &mut dyn UnitOfWork,
    id: DocumentId,
    command: UpdateSale,
    actor: &ActorContext,
) -> EngineResult<Applied<Sale>> {
    let mut sale: Sale = load_locked(uow, id).await?;
    ExpectedVersion::from(command.expected_version).check(sale.version())?;

    let mut effects = Vec::new();
    if let Some(items) = command.items {
        effects.extend(sale.update_items(items, actor)?);
    }
    if let Some(status) = command.status {
        let payments = if sale.plan_status(status)?.enters(SaleStatus::Cancelled) {
            uow.account_movements_by_reference(sale.reference()).await?
        } else {
            Vec::new()
        };
        effects.extend(sale.change_status(status, &payments, actor)?);
    }

    let applied = apply_effects(uow, effects, actor).await?;
    refresh(uow, &mut sale, actor).await?;
    save(uow, &mut sale).await?;
    Ok(Applied { document: sale, effects: applied })
}

async fn record_sale_payment_in(
    uow: &mut dyn UnitOfWork,
    id: DocumentId,
    command: RecordSalePayment,
    actor: &ActorContext,
) -> EngineResult<Applied<Sale>> {
    let mut sale: Sale = load_locked(uow, id).await?;
    let source = command.source_account.unwrap_or(sale.client_account_id());
    let target = command.target_account;

    let accounts = lock_accounts(uow, &[source, target]).await?;
    if let Some(account) = accounts.get(&source).filter(|a| a.account_type.is_company()) {
        return Err(DomainError::validation(format!(
            "a sale is paid from a client or supplier account, not the {} account {}",
            account.account_type.as_str(),
            account.id
        ))
        .into());
    }
    if let Some(account) = accounts.get(&target).filter(|a| !a.account_type.is_company()) {
        return Err(DomainError::validation(format!(
            "sale payments are collected into a company account, not the {} account {}",
            account.account_type.as_str(),
            account.id
        ))
        .into());
    }

    let posting = sale.plan_payment(command.amount, source, target)?;
    let applied = apply_effects(uow, vec![posting.into()], actor).await?;
    sale.register_payer(source);
    refresh(uow, &mut sale, actor).await?;
    save(uow, &mut sale).await?;

    info!(
        reference = sale.reference(),
        paid = %sale.payment().paid_amount(),
        payment_status = sale.payment().payment_status().as_str(),
        "sale payment recorded"
    );
    Ok(Applied { document: sale, effects: applied })
}

async fn delete_sale_in(
    uow: &mut dyn UnitOfWork,
    id: DocumentId,
    actor: &ActorContext,
) -> EngineResult<AppliedEffects> {
    let sale: Sale = load_locked(uow, id).await?;
    let payments = uow.account_movements_by_reference(sale.reference()).await?;
    let effects = sale.plan_delete(&payments)?;
    let applied = apply_effects(uow, effects, actor).await?;
    uow.delete_document(Sale::KIND, id).await?;

    info!(reference = sale.reference(), "sale deleted");
    Ok(applied)
}

/// Recompute the payment projection from the account ledger and verify it.
async fn refresh(uow: &mut dyn UnitOfWork, sale: &mut Sale, actor: &ActorContext) -> EngineResult<()> {
    let rows = uow.account_movements_by_reference(sale.reference()).await?;
    sale.refresh_payments(&rows, actor)?;
    sale.verify()?;
    Ok(())
}
