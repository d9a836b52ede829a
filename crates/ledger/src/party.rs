//! Clients and suppliers. Each party owns exactly one account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{AccountId, ActorContext, DomainError, DomainResult, PartyId};

use crate::account::{AccountBalance, AccountType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Client,
    Supplier,
}

impl PartyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PartyKind::Client => "client",
            PartyKind::Supplier => "supplier",
        }
    }

    pub fn account_type(self) -> AccountType {
        match self {
            PartyKind::Client => AccountType::Client,
            PartyKind::Supplier => AccountType::Supplier,
        }
    }
}

impl core::str::FromStr for PartyKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(PartyKind::Client),
            "supplier" => Ok(PartyKind::Supplier),
            other => Err(DomainError::validation(format!("unknown party kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}

impl Party {
    /// Register a party together with its 1:1 account (balance zero).
    pub fn register(
        kind: PartyKind,
        name: impl Into<String>,
        currency: impl Into<String>,
        actor: &ActorContext,
    ) -> DomainResult<(Party, AccountBalance)> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("party name must not be empty"));
        }
        let party_id = PartyId::new();
        let account = AccountBalance::open(
            AccountId::new(),
            name.clone(),
            kind.account_type(),
            currency,
            Some(party_id),
            actor.occurred_at,
        )?;
        let party = Party {
            id: party_id,
            kind,
            name,
            account_id: account.id,
            created_at: actor.occurred_at,
        };
        Ok((party, account))
    }

    /// Ensure this party is of the expected kind (e.g. a sale's client).
    pub fn ensure_kind(&self, kind: PartyKind) -> DomainResult<()> {
        if self.kind != kind {
            return Err(DomainError::validation(format!(
                "party {} is a {}, expected a {}",
                self.id,
                self.kind.as_str(),
                kind.as_str()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbook_core::UserId;

    #[test]
    fn registered_supplier_owns_a_supplier_account() {
        let actor = ActorContext::now(UserId::new());
        let (party, account) = Party::register(PartyKind::Supplier, "Acme", "USD", &actor).unwrap();
        assert_eq!(party.account_id, account.id);
        assert_eq!(account.owner, Some(party.id));
        assert_eq!(account.account_type, AccountType::Supplier);
        assert!(party.ensure_kind(PartyKind::Client).is_err());
    }
}
