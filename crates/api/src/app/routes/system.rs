use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::RequestActor;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(actor): Extension<RequestActor>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": actor.user_id().to_string(),
    }))
}
