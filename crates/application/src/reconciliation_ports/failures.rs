use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cisync_core::{AppError, AppResult};
use cisync_domain::RawInfrastructureEvent;
use uuid::Uuid;

use super::stage::ReconciliationStage;

/// Replay record for one event that did not reach the CMDB.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationFailure {
    /// Stable failure identifier.
    pub failure_id: Uuid,
    /// Asset tag hint taken from the raw event, when it carried one.
    pub asset_tag: Option<String>,
    /// Last stage the event reached before the error.
    pub last_stage: ReconciliationStage,
    /// Error that stopped processing.
    pub error: AppError,
    /// Original event as received, kept for replay.
    pub event: RawInfrastructureEvent,
    /// Number of replays already attempted.
    pub replay_count: u32,
    /// Time of the latest failure.
    pub recorded_at: DateTime<Utc>,
}

impl ReconciliationFailure {
    /// Returns whether redelivery may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Failure listing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureListQuery {
    /// Only return failures whose error is retryable.
    pub retryable_only: bool,
    /// Only return failures replayed fewer than this many times.
    pub max_replay_count: Option<u32>,
    /// Page size.
    pub limit: usize,
    /// Row offset.
    pub offset: usize,
}

impl Default for FailureListQuery {
    fn default() -> Self {
        Self {
            retryable_only: false,
            max_replay_count: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl FailureListQuery {
    /// Returns whether one failure passes the filters.
    #[must_use]
    pub fn matches(&self, failure: &ReconciliationFailure) -> bool {
        if self.retryable_only && !failure.is_retryable() {
            return false;
        }

        self.max_replay_count
            .is_none_or(|max_replay_count| failure.replay_count < max_replay_count)
    }
}

/// Repository port for failed events awaiting replay or review.
#[async_trait]
pub trait ReconciliationFailureRepository: Send + Sync {
    /// Inserts a failure or replaces the one with the same identifier.
    async fn record_failure(&self, failure: ReconciliationFailure) -> AppResult<()>;

    /// Returns one failure by identifier.
    async fn find_failure(&self, failure_id: Uuid) -> AppResult<Option<ReconciliationFailure>>;

    /// Lists failures, newest first.
    async fn list_failures(&self, query: FailureListQuery)
    -> AppResult<Vec<ReconciliationFailure>>;

    /// Removes one failure and reports whether it existed.
    async fn remove_failure(&self, failure_id: Uuid) -> AppResult<bool>;
}
