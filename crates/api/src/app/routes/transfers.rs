use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use stockbook_infra::engine::{CreateTransfer, UpdateTransfer};
use stockbook_inventory::StockTransfer;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestActor;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_transfer).get(list_transfers))
        .route("/:id", get(get_transfer).patch(update_transfer))
}

pub async fn create_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Json(body): Json<CreateTransfer>,
) -> axum::response::Response {
    let result = services.engine.create_transfer(body, &actor.context()).await;
    common::applied_response(StatusCode::CREATED, result)
}

pub async fn list_transfers(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    common::list_documents::<StockTransfer>(&services, &query).await
}

pub async fn get_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    common::get_document::<StockTransfer>(&services, &id).await
}

pub async fn update_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTransfer>,
) -> axum::response::Response {
    let id = match errors::parse_document_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.engine.update_transfer(id, body, &actor.context()).await;
    common::applied_response(StatusCode::OK, result)
}
