use std::sync::Arc;

use stockbook_infra::{
    config::AppConfig,
    engine::DocumentEngine,
    reference::ReferenceGenerator,
    reporting::Reports,
    store::{InMemoryLedgerStore, LedgerStore, StoreResult, open_store},
};

/// Everything a handler needs, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub engine: DocumentEngine,
    pub reports: Reports,
    pub config: AppConfig,
}

impl AppServices {
    /// Open the store selected by `config` and wire the engine and reports
    /// over it.
    pub async fn build(config: AppConfig) -> StoreResult<Self> {
        let store = open_store(&config).await?;
        Ok(Self::with_store(store, config))
    }

    /// Services over a fresh in-memory store.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::with_store(Arc::new(InMemoryLedgerStore::new()), config)
    }

    pub fn with_store(store: Arc<dyn LedgerStore>, config: AppConfig) -> Self {
        let engine = DocumentEngine::new(
            store.clone(),
            ReferenceGenerator::new(config.reference_max_attempts),
        );
        let reports = Reports::new(store, config.low_stock_threshold);
        Self {
            engine,
            reports,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        self.engine.store()
    }
}
