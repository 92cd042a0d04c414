use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use cisync_core::AppError;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::ApiResult;
use crate::state::AppState;

/// Largest accepted event body, single or batch.
pub const MAX_EVENT_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Verifies the body signature before any handler parses the body.
pub async fn require_event_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let (parts, body) = request.into_parts();

    let signature = parts
        .headers
        .get(&state.signature_header)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            AppError::Unauthorized(format!("missing {} header", state.signature_header))
        })?;

    let body = axum::body::to_bytes(body, MAX_EVENT_BODY_BYTES)
        .await
        .map_err(|error| AppError::Validation(format!("failed to read event body: {error}")))?;

    if !state.signature_verifier.verify(&body, signature.as_str()) {
        warn!(path = %parts.uri.path(), "event signature verification failed");
        return Err(AppError::Unauthorized("event signature verification failed".to_owned()).into());
    }

    Ok(next.run(Request::from_parts(parts, Body::from(body))).await)
}

/// Guards internal routes with the shared bearer secret.
pub async fn require_internal_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("internal bearer token required".to_owned()))?;

    let matches: bool = provided
        .trim()
        .as_bytes()
        .ct_eq(state.internal_shared_secret.as_bytes())
        .into();
    if !matches {
        warn!(path = %request.uri().path(), "internal route rejected invalid bearer token");
        return Err(AppError::Unauthorized("invalid internal bearer token".to_owned()).into());
    }

    Ok(next.run(request).await)
}
