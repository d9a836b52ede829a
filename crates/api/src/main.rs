use std::sync::Arc;

use anyhow::Context;

use stockbook_api::app::{build_app, services::AppServices};
use stockbook_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockbook_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = AppServices::build(config.clone())
        .await
        .context("failed to open the ledger store")?;

    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
