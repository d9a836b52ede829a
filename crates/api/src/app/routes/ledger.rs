use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/stock-cards", get(list_stock_cards))
        .route("/account-statements", get(list_account_statements))
        .route("/stock-levels", get(list_stock_levels))
}

/// Stock card rows ordered by product, zone and newest first.
pub async fn list_stock_cards(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::StockCardQuery>,
) -> axum::response::Response {
    match services
        .store()
        .stock_movements(&query.filter(), query.pagination())
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Account statement rows ordered by account and newest first.
pub async fn list_account_statements(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::AccountStatementQuery>,
) -> axum::response::Response {
    match services
        .store()
        .account_movements(&query.filter(), query.pagination())
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_stock_levels(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::StockLevelQuery>,
) -> axum::response::Response {
    match services.store().stock_levels(&query.filter()).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
