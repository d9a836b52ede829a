use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockbook_core::{AccountId, DomainError};
use stockbook_infra::engine::{OpenAccount, RegisterParty};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestActor;

pub fn router() -> Router {
    Router::new()
        .route("/accounts", get(list_accounts).post(open_account))
        .route("/accounts/:id", get(get_account))
        .route("/parties", get(list_parties).post(register_party))
}

pub async fn open_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Json(body): Json<OpenAccount>,
) -> axum::response::Response {
    match services.engine.open_account(body, &actor.context()).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store().accounts().await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AccountId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.store().account(id).await {
        Ok(Some(account)) => (StatusCode::OK, Json(account)).into_response(),
        Ok(None) => errors::domain_error_to_response(DomainError::not_found(format!("account {id}"))),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Register a client or supplier; its account is created in the same unit of work.
pub async fn register_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RequestActor>,
    Json(body): Json<RegisterParty>,
) -> axum::response::Response {
    match services.engine.register_party(body, &actor.context()).await {
        Ok((party, account)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "party": party, "account": account })),
        )
            .into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_parties(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PartiesQuery>,
) -> axum::response::Response {
    match services.store().parties(query.kind).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
