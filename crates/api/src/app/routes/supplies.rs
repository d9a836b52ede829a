use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use stockbook_infra::engine::{CreateSupply, RecordSupplyPayment, UpdateSupply};
use stockbook_purchasing::Supply;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestActor;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_supply).get(list_supplies))
        .route("/:id", get(get_supply).patch(update_supply))
        .route("/:id/pay", post(pay_supply))
}

pub async fn create_supply(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Json(body): Json<CreateSupply>,
) -> axum::response::Response {
    let result = services.engine.create_supply(body, &actor.context()).await;
    common::applied_response(StatusCode::CREATED, result)
}

pub async fn list_supplies(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    common::list_documents::<Supply>(&services, &query).await
}

pub async fn get_supply(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    common::get_document::<Supply>(&services, &id).await
}

pub async fn update_supply(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<String>,
    Json(body): Json<UpdateSupply>,
) -> axum::response::Response {
    let id = match errors::parse_document_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.engine.update_supply(id, body, &actor.context()).await;
    common::applied_response(StatusCode::OK, result)
}

/// Additional payment to the supplier once the goods are received.
pub async fn pay_supply(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<String>,
    Json(body): Json<RecordSupplyPayment>,
) -> axum::response::Response {
    let id = match errors::parse_document_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .engine
        .record_supply_payment(id, body, &actor.context())
        .await;
    common::applied_response(StatusCode::OK, result)
}
