use serde::Serialize;

mod events;
mod failures;

pub use events::{
    BatchEventResult, BatchEventsResponse, ConfigurationItemResponse, EventFailureResponse,
};
pub use failures::{
    FailureListParams, FailureListResponse, FailureSummaryResponse, ReplayFailureResponse,
};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
