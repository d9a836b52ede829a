use axum::Router;

pub mod accounts;
pub mod cash;
pub mod common;
pub mod inventories;
pub mod ledger;
pub mod reports;
pub mod sales;
pub mod supplies;
pub mod system;
pub mod transfers;

/// Router for all actor-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/sales", sales::router())
        .nest("/stock-supplies", supplies::router())
        .nest("/stock-transfers", transfers::router())
        .nest("/inventories", inventories::router())
        .nest("/cash-operations", cash::router())
        .nest("/reports", reports::router())
        .merge(ledger::router())
        .merge(accounts::router())
        .route("/whoami", axum::routing::get(system::whoami))
}
