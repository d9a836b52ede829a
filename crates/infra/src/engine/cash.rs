//! Cash receipts, payments, expenses and account transfers.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use stockbook_core::{AccountId, ActorContext, Document, DocumentId, DomainError, ExpectedVersion};
use stockbook_treasury::{CashOperation, CashOperationKind, CashStatus, NewCashOperation};

use super::{Applied, DocumentEngine, EngineResult, load_locked, save};
use crate::mutator::{apply_effects, lock_accounts};
use crate::store::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateCashOperation {
    #[serde(default)]
    pub reference: Option<String>,
    pub kind: CashOperationKind,
    pub amount: Decimal,
    pub source_account: AccountId,
    pub target_account: AccountId,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateCashOperation {
    #[serde(default)]
    pub expected_version: Option<u64>,
    pub status: CashStatus,
}

impl DocumentEngine {
    #[instrument(skip(self, command, actor), fields(kind = command.kind.as_str(), amount = %command.amount, user_id = %actor.user_id))]
    pub async fn create_cash_operation(
        &self,
        command: CreateCashOperation,
        actor: &ActorContext,
    ) -> EngineResult<Applied<CashOperation>> {
        let mut uow = self.store.begin().await?;
        let result = self.create_cash_operation_in(uow.as_mut(), command, actor).await;
        self.finish(uow, result).await
    }

    async fn create_cash_operation_in(
        &self,
        uow: &mut dyn UnitOfWork,
        command: CreateCashOperation,
        actor: &ActorContext,
    ) -> EngineResult<Applied<CashOperation>> {
        let accounts =
            lock_accounts(uow, &[command.source_account, command.target_account]).await?;
        let account_type = |id: AccountId| {
            accounts
                .get(&id)
                .map(|a| a.account_type)
                .ok_or_else(|| DomainError::account_not_found(format!("account {id}")))
        };
        command.kind.validate_accounts(
            account_type(command.source_account)?,
            account_type(command.target_account)?,
        )?;

        let reference = self
            .references
            .resolve(
                uow,
                CashOperation::KIND,
                command.kind.reference_format(),
                command.reference,
                actor.occurred_at,
            )
            .await?;
        let mut operation = CashOperation::create(
            NewCashOperation {
                reference,
                kind: command.kind,
                amount: command.amount,
                source_account: command.source_account,
                target_account: command.target_account,
                notes: command.notes,
            },
            actor,
        )?;
        save(uow, &mut operation).await?;

        info!(
            operation_id = %operation.id(),
            reference = operation.reference(),
            "cash operation created"
        );
        Ok(Applied { document: operation, effects: Default::default() })
    }

    /// Confirm posts the money; cancelling a confirmed operation posts the
    /// mirror entry.
    #[instrument(skip(self, command, actor), fields(status = ?command.status, user_id = %actor.user_id))]
    pub async fn update_cash_operation(
        &self,
        id: DocumentId,
        command: UpdateCashOperation,
        actor: &ActorContext,
    ) -> EngineResult<Applied<CashOperation>> {
        let mut uow = self.store.begin().await?;
        let result = update_cash_operation_in(uow.as_mut(), id, command, actor).await;
        self.finish(uow, result).await
    }
}

async fn update_cash_operation_in(
    uow: &mut dyn UnitOfWork,
    id: DocumentId,
    command: UpdateCashOperation,
    actor: &ActorContext,
) -> EngineResult<Applied<CashOperation>> {
    let mut operation: CashOperation = load_locked(uow, id).await?;
    ExpectedVersion::from(command.expected_version).check(operation.version())?;

    let effects = operation.change_status(command.status, actor)?;
    let applied = apply_effects(uow, effects, actor).await?;
    save(uow, &mut operation).await?;
    Ok(Applied { document: operation, effects: applied })
}
