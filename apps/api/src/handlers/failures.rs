use axum::Json;
use axum::extract::{Path, Query, State};
use uuid::Uuid;

use crate::dto::{
    FailureListParams, FailureListResponse, FailureSummaryResponse, ReplayFailureResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_failures_handler(
    State(state): State<AppState>,
    Query(params): Query<FailureListParams>,
) -> ApiResult<Json<FailureListResponse>> {
    let failures = state
        .reconciliation_service
        .list_failures(params.into())
        .await?;

    Ok(Json(FailureListResponse {
        failures: failures.into_iter().map(Into::into).collect(),
    }))
}

pub async fn get_failure_handler(
    State(state): State<AppState>,
    Path(failure_id): Path<Uuid>,
) -> ApiResult<Json<FailureSummaryResponse>> {
    let failure = state.reconciliation_service.find_failure(failure_id).await?;
    Ok(Json(failure.into()))
}

pub async fn replay_failure_handler(
    State(state): State<AppState>,
    Path(failure_id): Path<Uuid>,
) -> ApiResult<Json<ReplayFailureResponse>> {
    let result = state
        .reconciliation_service
        .replay_failure(failure_id)
        .await?;

    Ok(Json(ReplayFailureResponse::from_result(failure_id, result)))
}
