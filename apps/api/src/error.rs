use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cisync_application::ReconciliationFailure;
use cisync_core::AppError;
use serde::Serialize;

use crate::dto::EventFailureResponse;

/// API error payload.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    message: String,
    kind: &'static str,
}

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            message: self.0.to_string(),
            kind: self.0.kind().as_str(),
        });

        (status_for(&self.0), payload).into_response()
    }
}

/// Rejected or failed event, answered with its failure record.
#[derive(Debug)]
pub struct EventFailure(pub ReconciliationFailure);

impl IntoResponse for EventFailure {
    fn into_response(self) -> Response {
        (
            status_for(&self.0.error),
            Json(EventFailureResponse::from(&self.0)),
        )
            .into_response()
    }
}

fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Transform(_)
        | AppError::CmdbUnavailable(_)
        | AppError::CmdbConflict(_)
        | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
