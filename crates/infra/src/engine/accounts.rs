//! Company accounts and client/supplier registration.

use serde::Deserialize;
use tracing::{info, instrument};

use stockbook_core::ActorContext;
use stockbook_ledger::{AccountBalance, AccountType, Party, PartyKind};

use super::{DocumentEngine, EngineResult};
use crate::store::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenAccount {
    pub name: String,
    pub account_type: AccountType,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterParty {
    pub kind: PartyKind,
    pub name: String,
    pub currency: String,
}

impl DocumentEngine {
    /// Open a company (internal, bank or cash) account at balance zero.
    #[instrument(skip(self, command, actor), fields(account_type = command.account_type.as_str(), user_id = %actor.user_id))]
    pub async fn open_account(
        &self,
        command: OpenAccount,
        actor: &ActorContext,
    ) -> EngineResult<AccountBalance> {
        let mut uow = self.store.begin().await?;
        let result = open_account_in(uow.as_mut(), command, actor).await;
        self.finish(uow, result).await
    }

    /// Register a client or supplier together with its account.
    #[instrument(skip(self, command, actor), fields(kind = command.kind.as_str(), user_id = %actor.user_id))]
    pub async fn register_party(
        &self,
        command: RegisterParty,
        actor: &ActorContext,
    ) -> EngineResult<(Party, AccountBalance)> {
        let mut uow = self.store.begin().await?;
        let result = register_party_in(uow.as_mut(), command, actor).await;
        self.finish(uow, result).await
    }
}

async fn open_account_in(
    uow: &mut dyn UnitOfWork,
    command: OpenAccount,
    actor: &ActorContext,
) -> EngineResult<AccountBalance> {
    let account = AccountBalance::open_company(
        command.name,
        command.account_type,
        command.currency,
        actor.occurred_at,
    )?;
    uow.insert_account(&account).await?;
    info!(account_id = %account.id, name = %account.name, "account opened");
    Ok(account)
}

async fn register_party_in(
    uow: &mut dyn UnitOfWork,
    command: RegisterParty,
    actor: &ActorContext,
) -> EngineResult<(Party, AccountBalance)> {
    let (party, account) = Party::register(command.kind, command.name, command.currency, actor)?;
    uow.insert_account(&account).await?;
    uow.insert_party(&party).await?;
    info!(party_id = %party.id, account_id = %account.id, "party registered");
    Ok((party, account))
}
