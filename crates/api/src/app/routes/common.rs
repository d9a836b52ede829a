use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Serialize, de::DeserializeOwned};

use stockbook_core::Document;
use stockbook_infra::engine::{Applied, EngineResult};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// `GET /<documents>/:id` for any document kind.
pub async fn get_document<D>(services: &AppServices, id: &str) -> axum::response::Response
where
    D: Document + Serialize + DeserializeOwned,
{
    let id = match errors::parse_document_id(id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.get::<D>(id).await {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// `GET /<documents>` for any document kind, newest first.
pub async fn list_documents<D>(
    services: &AppServices,
    query: &dto::PageQuery,
) -> axum::response::Response
where
    D: Document + Serialize + DeserializeOwned,
{
    match services.engine.list::<D>(query.pagination()).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// Render the outcome of a document operation.
pub fn applied_response<D>(status: StatusCode, result: EngineResult<Applied<D>>) -> axum::response::Response
where
    D: Document + Serialize,
{
    match result {
        Ok(applied) => (status, Json(dto::applied_to_json(applied))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
