//! Bearer-key middleware.

use crate::errors::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

/// Checks `Authorization: Bearer wp_<key>` against the configured key list.
/// Health stays open; everything else under /v1 requires a key once keys
/// are configured.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    if state.auth.allows(bearer) {
        Ok(next.run(request).await)
    } else {
        let request_id = crate::request_id(&request);
        Err(ApiError::unauthorized(request_id))
    }
}
