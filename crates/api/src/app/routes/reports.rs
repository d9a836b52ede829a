use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/low-stock", get(low_stock))
        .route("/top-products", get(top_products))
        .route("/revenue-trend", get(revenue_trend))
        .route("/outstanding-balances", get(outstanding_balances))
        .route("/reconcile", get(reconcile))
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PeriodQuery>,
) -> axum::response::Response {
    let period = match query.period() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.reports.dashboard(period, Utc::now()).await {
        Ok(dashboard) => (StatusCode::OK, Json(dashboard)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::LowStockQuery>,
) -> axum::response::Response {
    match services.reports.low_stock(query.threshold, query.zone_id).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn top_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::TopProductsQuery>,
) -> axum::response::Response {
    let period = match query.period() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services
        .reports
        .top_products(period, query.limit(), Utc::now())
        .await
    {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn revenue_trend(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PeriodQuery>,
) -> axum::response::Response {
    let period = match query.period() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.reports.revenue_trend(period, Utc::now()).await {
        Ok(points) => (StatusCode::OK, Json(serde_json::json!({ "items": points }))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn outstanding_balances(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.reports.outstanding_balances().await {
        Ok(balances) => (StatusCode::OK, Json(balances)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// Re-check every ledger invariant; violations are reported, never repaired.
pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.reports.reconcile().await {
        Ok(report) => {
            let body = serde_json::json!({
                "consistent": report.is_consistent(),
                "report": report,
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}
