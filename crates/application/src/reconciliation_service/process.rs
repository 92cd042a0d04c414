use std::future::Future;

use super::*;

/// Replay bookkeeping carried into a rerun of a recorded failure.
#[derive(Debug, Clone, Copy)]
pub(super) struct PriorFailure {
    pub(super) failure_id: Uuid,
    pub(super) replay_count: u32,
}

impl ReconciliationService {
    /// Validates, transforms and upserts one event.
    ///
    /// Failures are recorded with the original event and returned; they are
    /// never retried here.
    pub async fn process_event(&self, raw: RawInfrastructureEvent) -> ReconciliationResult {
        self.process_with_prior(raw, None).await
    }

    pub(super) async fn process_with_prior(
        &self,
        raw: RawInfrastructureEvent,
        prior: Option<PriorFailure>,
    ) -> ReconciliationResult {
        let mut trail = StageTrail::received();

        match self.reconcile(&raw, &mut trail).await {
            Ok((asset_tag, operation, record)) => {
                info!(
                    asset_tag = %asset_tag,
                    operation = operation.as_str(),
                    record_id = %record.record_id,
                    status = record.item.status().as_str(),
                    "event reconciled"
                );

                Ok(ReconciliationOutcome {
                    asset_tag,
                    operation,
                    record,
                    stages: trail.into_stages(),
                })
            }
            Err(error) => {
                let last_stage = trail.fail();
                Err(self.record_failure(raw, last_stage, error, prior).await)
            }
        }
    }

    async fn reconcile(
        &self,
        raw: &RawInfrastructureEvent,
        trail: &mut StageTrail,
    ) -> AppResult<(AssetTag, UpsertOperation, StoredConfigurationItem)> {
        let event = InfrastructureEvent::try_from_raw(raw.clone())?;
        trail.advance(ReconciliationStage::Validated)?;

        let item = self.transformer.transform(&event, Utc::now())?;
        trail.advance(ReconciliationStage::Transformed)?;

        let asset_tag = item.asset_tag().clone();
        let (operation, record) = self.upsert_under_lease(item).await?;
        trail.advance(ReconciliationStage::Upserted)?;
        trail.advance(ReconciliationStage::Done)?;

        Ok((asset_tag, operation, record))
    }

    /// Runs lock, find, create or update and release on its own task.
    ///
    /// The caller dropping its future (client disconnect, aborted batch) must
    /// not strand the lease between acquire and release.
    async fn upsert_under_lease(
        &self,
        item: ConfigurationItem,
    ) -> AppResult<(UpsertOperation, StoredConfigurationItem)> {
        let service = self.clone();
        let asset_tag = item.asset_tag().clone();

        tokio::spawn(async move {
            let lease = service.acquire_lease(&asset_tag).await?;
            let upserted = service.upsert(item).await;
            service.release_lease(lease).await;
            upserted
        })
        .await
        .map_err(|error| AppError::Internal(format!("asset lock section aborted: {error}")))?
    }

    async fn upsert(
        &self,
        item: ConfigurationItem,
    ) -> AppResult<(UpsertOperation, StoredConfigurationItem)> {
        let asset_tag = item.asset_tag().clone();
        let existing = self
            .bounded_cmdb_call("find", self.cmdb_client.find(&asset_tag))
            .await?;

        match existing {
            Some(existing) => {
                if existing.item.asset_tag() != &asset_tag {
                    return Err(AppError::CmdbConflict(format!(
                        "lookup for asset tag '{asset_tag}' returned item '{}'",
                        existing.item.asset_tag()
                    )));
                }

                let record = self
                    .bounded_cmdb_call("update", self.cmdb_client.update(&existing, item))
                    .await?;
                Ok((UpsertOperation::Updated, record))
            }
            None => {
                let record = self
                    .bounded_cmdb_call("create", self.cmdb_client.create(item))
                    .await?;
                Ok((UpsertOperation::Created, record))
            }
        }
    }

    async fn bounded_cmdb_call<T>(
        &self,
        operation: &str,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        let timeout = self.settings.cmdb_call_timeout;
        tokio::time::timeout(timeout, call).await.map_err(|_| {
            AppError::CmdbUnavailable(format!(
                "cmdb {operation} call timed out after {} ms",
                timeout.as_millis()
            ))
        })?
    }

    async fn acquire_lease(&self, asset_tag: &AssetTag) -> AppResult<AssetLease> {
        let timeout = self.settings.lock_wait_timeout;
        tokio::time::timeout(
            timeout,
            self.lock_coordinator
                .acquire(asset_tag, self.settings.holder_id.as_str()),
        )
        .await
        .map_err(|_| {
            AppError::CmdbUnavailable(format!(
                "timed out after {} ms waiting for asset lock '{asset_tag}'",
                timeout.as_millis()
            ))
        })?
    }

    async fn release_lease(&self, lease: AssetLease) {
        let asset_tag = lease.asset_tag.clone();
        if let Err(error) = self.lock_coordinator.release(lease).await {
            warn!(asset_tag = %asset_tag, error = %error, "failed to release asset lock");
        }
    }

    pub(super) async fn record_failure(
        &self,
        raw: RawInfrastructureEvent,
        last_stage: ReconciliationStage,
        error: AppError,
        prior: Option<PriorFailure>,
    ) -> ReconciliationFailure {
        let failure = ReconciliationFailure {
            failure_id: prior.map_or_else(Uuid::new_v4, |prior| prior.failure_id),
            asset_tag: raw.resource_id_hint().map(ToOwned::to_owned),
            last_stage,
            error,
            event: raw,
            replay_count: prior.map_or(0, |prior| prior.replay_count.saturating_add(1)),
            recorded_at: Utc::now(),
        };

        warn!(
            failure_id = %failure.failure_id,
            asset_tag = failure.asset_tag.as_deref().unwrap_or("<none>"),
            stage = failure.last_stage.as_str(),
            kind = failure.error.kind().as_str(),
            retryable = failure.is_retryable(),
            replay_count = failure.replay_count,
            error = %failure.error,
            "event reconciliation failed"
        );

        if let Err(error) = self.failure_repository.record_failure(failure.clone()).await {
            warn!(
                failure_id = %failure.failure_id,
                error = %error,
                "failed to record reconciliation failure for replay"
            );
        }

        failure
    }
}
