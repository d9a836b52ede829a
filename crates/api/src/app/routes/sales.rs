use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockbook_infra::engine::{CreateSale, RecordSalePayment, UpdateSale};
use stockbook_sales::Sale;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestActor;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/:id", get(get_sale).patch(update_sale).delete(delete_sale))
        .route("/:id/pay", post(pay_sale))
}

pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Json(body): Json<CreateSale>,
) -> axum::response::Response {
    let result = services.engine.create_sale(body, &actor.context()).await;
    common::applied_response(StatusCode::CREATED, result)
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    common::list_documents::<Sale>(&services, &query).await
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    common::get_document::<Sale>(&services, &id).await
}

pub async fn update_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<String>,
    Json(body): Json<UpdateSale>,
) -> axum::response::Response {
    let id = match errors::parse_document_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.engine.update_sale(id, body, &actor.context()).await;
    common::applied_response(StatusCode::OK, result)
}

pub async fn pay_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<String>,
    Json(body): Json<RecordSalePayment>,
) -> axum::response::Response {
    let id = match errors::parse_document_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .engine
        .record_sale_payment(id, body, &actor.context())
        .await;
    common::applied_response(StatusCode::OK, result)
}

pub async fn delete_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_document_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.delete_sale(id, &actor.context()).await {
        Ok(effects) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": id.to_string(),
                "deleted": true,
                "stock_movements": effects.stock_movements.len(),
                "account_movements": effects.account_movements.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
