use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockbook_core::UserId;

use crate::app::errors;
use crate::context::RequestActor;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Resolve the `X-Actor-Id` header into a [`RequestActor`] extension.
pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let user_id = extract_actor(req.headers()).ok_or_else(|| {
        errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "missing or invalid X-Actor-Id header",
        )
    })?;

    req.extensions_mut().insert(RequestActor::new(user_id));

    Ok(next.run(req).await)
}

fn extract_actor(headers: &HeaderMap) -> Option<UserId> {
    let header = headers.get(ACTOR_HEADER)?.to_str().ok()?.trim();
    if header.is_empty() {
        return None;
    }
    header.parse().ok()
}
