use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use stockbook_infra::engine::{CreateCashOperation, UpdateCashOperation};
use stockbook_treasury::CashOperation;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestActor;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_cash_operation).get(list_cash_operations))
        .route("/:id", get(get_cash_operation).patch(update_cash_operation))
}

pub async fn create_cash_operation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Json(body): Json<CreateCashOperation>,
) -> axum::response::Response {
    let result = services.engine.create_cash_operation(body, &actor.context()).await;
    common::applied_response(StatusCode::CREATED, result)
}

pub async fn list_cash_operations(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    common::list_documents::<CashOperation>(&services, &query).await
}

pub async fn get_cash_operation(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    common::get_document::<CashOperation>(&services, &id).await
}

pub async fn update_cash_operation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCashOperation>,
) -> axum::response::Response {
    let id = match errors::parse_document_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.engine.update_cash_operation(id, body, &actor.context()).await;
    common::applied_response(StatusCode::OK, result)
}
