use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use stockbook_infra::engine::{CreateInventory, UpdateInventory};
use stockbook_inventory::InventoryCount;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestActor;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_inventory).get(list_inventories))
        .route("/:id", get(get_inventory).patch(update_inventory))
}

pub async fn create_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Json(body): Json<CreateInventory>,
) -> axum::response::Response {
    let result = services.engine.create_inventory(body, &actor.context()).await;
    common::applied_response(StatusCode::CREATED, result)
}

pub async fn list_inventories(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    common::list_documents::<InventoryCount>(&services, &query).await
}

pub async fn get_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    common::get_document::<InventoryCount>(&services, &id).await
}

/// Completing a count overwrites the zone's stock levels with the counted quantities.
pub async fn update_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Path(id): Path<String>,
    Json(body): Json<UpdateInventory>,
) -> axum::response::Response {
    let id = match errors::parse_document_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.engine.update_inventory(id, body, &actor.context()).await;
    common::applied_response(StatusCode::OK, result)
}
