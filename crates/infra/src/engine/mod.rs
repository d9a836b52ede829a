//! Document engine: orchestrates one document-level operation per unit of
//! work.
//!
//! Every operation follows the same shape:
//!
//! 1. open a unit of work, load and lock what it needs
//! 2. ask the document for its decision (a pure method returning effects)
//! 3. apply the effects through the mutator
//! 4. recompute derived aggregates from the ledger and verify them
//! 5. save the document and commit
//!
//! Any error rolls the whole unit of work back, so the balance and ledger
//! stores are left exactly as they were before the call.

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{error, warn};

use stockbook_core::{Document, DocumentId, DomainError};

use crate::mutator::AppliedEffects;
use crate::reference::ReferenceGenerator;
use crate::store::{LedgerStore, Page, Pagination, StoreError, StoredDocument, UnitOfWork};

pub mod accounts;
pub mod cash;
pub mod inventories;
pub mod sales;
pub mod supplies;
pub mod transfers;

pub use accounts::{OpenAccount, RegisterParty};
pub use cash::{CreateCashOperation, UpdateCashOperation};
pub use inventories::{CreateInventory, UpdateInventory};
pub use sales::{CreateSale, RecordSalePayment, UpdateSale};
pub use supplies::{CreateSupply, RecordSupplyPayment, UpdateSupply};
pub use transfers::{CreateTransfer, UpdateTransfer};

/// Engine operation error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// A document after a successful operation, with the ledger rows written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applied<D> {
    pub document: D,
    pub effects: AppliedEffects,
}

#[derive(Clone)]
pub struct DocumentEngine {
    store: Arc<dyn LedgerStore>,
    references: ReferenceGenerator,
}

impl DocumentEngine {
    pub fn new(store: Arc<dyn LedgerStore>, references: ReferenceGenerator) -> Self {
        Self { store, references }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Read one document without locking.
    pub async fn get<D>(&self, id: DocumentId) -> EngineResult<D>
    where
        D: Document + DeserializeOwned,
    {
        let stored = self
            .store
            .document(D::KIND, id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("{} {id}", D::KIND)))?;
        Ok(stored.decode()?)
    }

    /// Page through documents of one kind, newest first.
    pub async fn list<D>(&self, pagination: Pagination) -> EngineResult<Page<D>>
    where
        D: Document + DeserializeOwned,
    {
        let page = self.store.documents(D::KIND, pagination).await?;
        let items = page
            .items
            .iter()
            .map(StoredDocument::decode::<D>)
            .collect::<Result<Vec<D>, StoreError>>()?;
        Ok(Page {
            items,
            total: page.total,
            pagination: page.pagination,
            has_more: page.has_more,
        })
    }

    /// Commit on success, roll back on failure.
    async fn finish<T>(&self, uow: Box<dyn UnitOfWork>, result: EngineResult<T>) -> EngineResult<T> {
        match result {
            Ok(value) => {
                uow.commit().await.inspect_err(|err| {
                    error!(error = %err, "commit failed");
                })?;
                Ok(value)
            }
            Err(err) => {
                match &err {
                    EngineError::Domain(domain) => {
                        warn!(error = %domain, code = domain.code(), "operation rejected")
                    }
                    EngineError::Store(store) => error!(error = %store, "store failure"),
                }
                if let Err(rollback_err) = uow.rollback().await {
                    error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// Load a document and lock it for the rest of the unit of work.
pub(crate) async fn load_locked<D>(uow: &mut dyn UnitOfWork, id: DocumentId) -> EngineResult<D>
where
    D: Document + DeserializeOwned,
{
    let stored = uow
        .load_document(D::KIND, id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("{} {id}", D::KIND)))?;
    Ok(stored.decode()?)
}

/// Bump the version and persist.
pub(crate) async fn save<D>(uow: &mut dyn UnitOfWork, document: &mut D) -> EngineResult<()>
where
    D: Document + Serialize,
{
    document.bump_version();
    let stored = StoredDocument::encode(document)?;
    uow.save_document(&stored).await?;
    Ok(())
}
