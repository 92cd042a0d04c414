use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cisync_core::{AppError, AppResult};
use cisync_domain::{AssetTag, CiTransformer, ConfigurationItem, InfrastructureEvent, RawInfrastructureEvent};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cmdb_ports::{CmdbClient, StoredConfigurationItem};
use crate::reconciliation_ports::{
    AssetLease, AssetLockCoordinator, FailureListQuery, ReconciliationFailure,
    ReconciliationFailureRepository, ReconciliationOutcome, ReconciliationStage, StageTrail,
    UpsertOperation,
};

mod batch;
mod process;
mod replay;

/// Result of reconciling one event.
pub type ReconciliationResult = Result<ReconciliationOutcome, ReconciliationFailure>;

/// Timeouts and limits applied by the reconciliation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationSettings {
    /// Upper bound for one CMDB call.
    pub cmdb_call_timeout: Duration,
    /// Upper bound for waiting on the asset lock.
    pub lock_wait_timeout: Duration,
    /// Events processed at the same time by one batch.
    pub max_concurrency: usize,
    /// Lease holder identity of this process.
    pub holder_id: String,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            cmdb_call_timeout: Duration::from_secs(10),
            lock_wait_timeout: Duration::from_secs(15),
            max_concurrency: 8,
            holder_id: format!("cisync-{}", std::process::id()),
        }
    }
}

/// Reconciles infrastructure events into the CMDB one event at a time.
#[derive(Clone)]
pub struct ReconciliationService {
    transformer: CiTransformer,
    cmdb_client: Arc<dyn CmdbClient>,
    lock_coordinator: Arc<dyn AssetLockCoordinator>,
    failure_repository: Arc<dyn ReconciliationFailureRepository>,
    settings: ReconciliationSettings,
}

impl ReconciliationService {
    /// Creates a reconciliation service.
    #[must_use]
    pub fn new(
        transformer: CiTransformer,
        cmdb_client: Arc<dyn CmdbClient>,
        lock_coordinator: Arc<dyn AssetLockCoordinator>,
        failure_repository: Arc<dyn ReconciliationFailureRepository>,
    ) -> Self {
        Self {
            transformer,
            cmdb_client,
            lock_coordinator,
            failure_repository,
            settings: ReconciliationSettings::default(),
        }
    }

    /// Replaces the default timeouts and limits.
    #[must_use]
    pub fn with_settings(mut self, settings: ReconciliationSettings) -> Self {
        self.settings = ReconciliationSettings {
            max_concurrency: settings.max_concurrency.max(1),
            ..settings
        };
        self
    }

    /// Returns active settings.
    #[must_use]
    pub fn settings(&self) -> &ReconciliationSettings {
        &self.settings
    }

    /// Lists recorded failures.
    pub async fn list_failures(
        &self,
        query: FailureListQuery,
    ) -> AppResult<Vec<ReconciliationFailure>> {
        self.failure_repository.list_failures(query).await
    }

    /// Returns one recorded failure.
    pub async fn find_failure(&self, failure_id: Uuid) -> AppResult<ReconciliationFailure> {
        self.failure_repository
            .find_failure(failure_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("failure '{failure_id}' not found")))
    }
}
