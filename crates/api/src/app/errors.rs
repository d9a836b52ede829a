use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockbook_core::{DocumentId, DomainError};
use stockbook_infra::engine::EngineError;
use stockbook_infra::store::StoreError;

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::Domain(e) => domain_error_to_response(e),
        EngineError::Store(e) => store_error_to_response(e),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Conflict(_)
        | DomainError::InsufficientStock { .. }
        | DomainError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        DomainError::AccountNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::ReferenceGeneration(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::ConsistencyViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "store error while serving request");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_document_id(s: &str) -> Result<DocumentId, axum::response::Response> {
    s.parse().map_err(domain_error_to_response)
}
