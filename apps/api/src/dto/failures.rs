use cisync_application::{FailureListQuery, ReconciliationFailure, ReconciliationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::{ConfigurationItemResponse, EventFailureResponse};

/// Query parameters for failure listing.
#[derive(Debug, Default, Deserialize)]
pub struct FailureListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub retryable_only: Option<bool>,
    pub max_replay_count: Option<u32>,
}

impl From<FailureListParams> for FailureListQuery {
    fn from(params: FailureListParams) -> Self {
        let defaults = FailureListQuery::default();
        Self {
            retryable_only: params.retryable_only.unwrap_or(defaults.retryable_only),
            max_replay_count: params.max_replay_count,
            limit: params.limit.unwrap_or(defaults.limit).clamp(1, 500),
            offset: params.offset.unwrap_or(defaults.offset),
        }
    }
}

/// API representation of one recorded failure.
#[derive(Debug, Serialize)]
pub struct FailureSummaryResponse {
    pub failure_id: Uuid,
    pub asset_tag: Option<String>,
    pub stage: &'static str,
    pub kind: &'static str,
    pub message: String,
    pub retryable: bool,
    pub replay_count: u32,
    pub recorded_at: String,
    pub event: Value,
}

impl From<ReconciliationFailure> for FailureSummaryResponse {
    fn from(failure: ReconciliationFailure) -> Self {
        Self {
            failure_id: failure.failure_id,
            stage: failure.last_stage.as_str(),
            kind: failure.error.kind().as_str(),
            message: failure.error.to_string(),
            retryable: failure.is_retryable(),
            replay_count: failure.replay_count,
            recorded_at: failure.recorded_at.to_rfc3339(),
            event: failure.event.to_value(),
            asset_tag: failure.asset_tag,
        }
    }
}

/// Failure listing response.
#[derive(Debug, Serialize)]
pub struct FailureListResponse {
    pub failures: Vec<FailureSummaryResponse>,
}

/// Outcome of one replay request.
#[derive(Debug, Serialize)]
pub struct ReplayFailureResponse {
    pub failure_id: Uuid,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ConfigurationItemResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EventFailureResponse>,
}

impl ReplayFailureResponse {
    pub fn from_result(failure_id: Uuid, result: ReconciliationResult) -> Self {
        match result {
            Ok(outcome) => Self {
                failure_id,
                status: "done",
                item: Some(outcome.into()),
                error: None,
            },
            Err(failure) => Self {
                failure_id,
                status: "failed",
                item: None,
                error: Some(EventFailureResponse::from(&failure)),
            },
        }
    }
}
