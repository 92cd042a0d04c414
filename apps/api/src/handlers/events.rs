use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use cisync_core::AppError;
use cisync_domain::RawInfrastructureEvent;
use serde_json::Value;
use tracing::info;

use crate::dto::{BatchEventResult, BatchEventsResponse, ConfigurationItemResponse};
use crate::error::{ApiResult, EventFailure};
use crate::state::AppState;

/// Upper bound on events accepted in one batch request.
pub const MAX_BATCH_EVENTS: usize = 500;

pub async fn ingest_event_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Result<Json<ConfigurationItemResponse>, EventFailure>> {
    let raw = RawInfrastructureEvent::from_json_slice(&body)?;

    Ok(state
        .reconciliation_service
        .process_event(raw)
        .await
        .map(|outcome| Json(outcome.into()))
        .map_err(EventFailure))
}

pub async fn ingest_batch_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<BatchEventsResponse>> {
    let values: Vec<Value> = serde_json::from_slice(&body).map_err(|error| {
        AppError::Validation(format!("batch body must be a JSON array of events: {error}"))
    })?;

    if values.len() > MAX_BATCH_EVENTS {
        return Err(AppError::Validation(format!(
            "batch holds {} events, at most {MAX_BATCH_EVENTS} are accepted",
            values.len()
        ))
        .into());
    }

    let mut results: Vec<Option<BatchEventResult>> = Vec::with_capacity(values.len());
    let mut accepted_indexes = Vec::with_capacity(values.len());
    let mut accepted_events = Vec::with_capacity(values.len());

    for (index, value) in values.into_iter().enumerate() {
        match RawInfrastructureEvent::from_value(value) {
            Ok(raw) => {
                accepted_indexes.push(index);
                accepted_events.push(raw);
                results.push(None);
            }
            Err(error) => results.push(Some(BatchEventResult::rejected(index, &error))),
        }
    }

    let processed = state
        .reconciliation_service
        .process_batch(accepted_events)
        .await;
    for (index, result) in accepted_indexes.into_iter().zip(processed) {
        results[index] = Some(BatchEventResult::from_result(index, result));
    }

    let response = BatchEventsResponse::from(results.into_iter().flatten().collect::<Vec<_>>());
    info!(
        done = response.done,
        failed = response.failed,
        "event batch reconciled"
    );

    Ok(Json(response))
}
