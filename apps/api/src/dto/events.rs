use cisync_application::{ReconciliationFailure, ReconciliationOutcome, ReconciliationResult};
use cisync_core::AppError;
use serde::Serialize;
use uuid::Uuid;

/// API representation of a reconciled configuration item.
#[derive(Debug, Serialize)]
pub struct ConfigurationItemResponse {
    pub record_id: String,
    pub operation: &'static str,
    pub asset_tag: String,
    pub name: String,
    pub classification: String,
    pub environment: String,
    pub status: &'static str,
    pub discovery_source: String,
    pub last_discovered: String,
    pub stages: Vec<&'static str>,
}

impl From<ReconciliationOutcome> for ConfigurationItemResponse {
    fn from(outcome: ReconciliationOutcome) -> Self {
        let item = &outcome.record.item;
        Self {
            record_id: outcome.record.record_id.clone(),
            operation: outcome.operation.as_str(),
            asset_tag: outcome.asset_tag.as_str().to_owned(),
            name: item.name().to_owned(),
            classification: item.classification().to_owned(),
            environment: item.environment().to_owned(),
            status: item.status().as_str(),
            discovery_source: item.discovery_source().to_owned(),
            last_discovered: item.last_discovered().to_rfc3339(),
            stages: outcome.stages.iter().map(|stage| stage.as_str()).collect(),
        }
    }
}

/// Error body for an event that did not reach the CMDB.
#[derive(Debug, Serialize)]
pub struct EventFailureResponse {
    pub message: String,
    pub kind: &'static str,
    pub retryable: bool,
    pub failure_id: Option<Uuid>,
    pub stage: Option<&'static str>,
}

impl From<&ReconciliationFailure> for EventFailureResponse {
    fn from(failure: &ReconciliationFailure) -> Self {
        Self {
            message: failure.error.to_string(),
            kind: failure.error.kind().as_str(),
            retryable: failure.is_retryable(),
            failure_id: Some(failure.failure_id),
            stage: Some(failure.last_stage.as_str()),
        }
    }
}

impl From<&AppError> for EventFailureResponse {
    fn from(error: &AppError) -> Self {
        Self {
            message: error.to_string(),
            kind: error.kind().as_str(),
            retryable: error.is_retryable(),
            failure_id: None,
            stage: None,
        }
    }
}

/// Per-event result inside a batch response.
#[derive(Debug, Serialize)]
pub struct BatchEventResult {
    pub index: usize,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ConfigurationItemResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EventFailureResponse>,
}

impl BatchEventResult {
    pub fn from_result(index: usize, result: ReconciliationResult) -> Self {
        match result {
            Ok(outcome) => Self {
                index,
                status: "done",
                item: Some(outcome.into()),
                error: None,
            },
            Err(failure) => Self {
                index,
                status: "failed",
                item: None,
                error: Some(EventFailureResponse::from(&failure)),
            },
        }
    }

    pub fn rejected(index: usize, error: &AppError) -> Self {
        Self {
            index,
            status: "failed",
            item: None,
            error: Some(EventFailureResponse::from(error)),
        }
    }
}

/// Batch ingestion response.
#[derive(Debug, Serialize)]
pub struct BatchEventsResponse {
    pub done: usize,
    pub failed: usize,
    pub results: Vec<BatchEventResult>,
}

impl From<Vec<BatchEventResult>> for BatchEventsResponse {
    fn from(results: Vec<BatchEventResult>) -> Self {
        let done = results
            .iter()
            .filter(|result| result.status == "done")
            .count();
        Self {
            done,
            failed: results.len() - done,
            results,
        }
    }
}
