use std::collections::HashMap;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::*;

impl ReconciliationService {
    /// Reconciles many events concurrently.
    ///
    /// Results keep the input order. At most `max_concurrency` events run at
    /// once and one event failing, stalling or panicking does not affect the
    /// others.
    pub async fn process_batch(
        &self,
        events: Vec<RawInfrastructureEvent>,
    ) -> Vec<ReconciliationResult> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut task_indexes = HashMap::with_capacity(events.len());
        let mut pending_events = Vec::with_capacity(events.len());

        for (index, raw) in events.into_iter().enumerate() {
            let service = self.clone();
            let semaphore = semaphore.clone();
            pending_events.push(Some(raw.clone()));

            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, service.process_event(raw).await)
            });
            task_indexes.insert(handle.id(), index);
        }

        let mut results: Vec<Option<ReconciliationResult>> =
            (0..pending_events.len()).map(|_| None).collect();

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (index, result))) => {
                    pending_events[index] = None;
                    results[index] = Some(result);
                }
                Err(join_error) => {
                    let Some(index) = task_indexes.get(&join_error.id()).copied() else {
                        warn!(error = %join_error, "reconciliation task ended without an index");
                        continue;
                    };

                    let raw = pending_events[index].take().unwrap_or_default();
                    let failure = self
                        .record_failure(
                            raw,
                            ReconciliationStage::Received,
                            AppError::Internal(format!("reconciliation task aborted: {join_error}")),
                            None,
                        )
                        .await;
                    results[index] = Some(Err(failure));
                }
            }
        }

        results
            .into_iter()
            .zip(pending_events)
            .map(|(result, raw)| match result {
                Some(result) => result,
                None => Err(ReconciliationFailure {
                    failure_id: Uuid::new_v4(),
                    asset_tag: raw
                        .as_ref()
                        .and_then(|raw| raw.resource_id_hint().map(ToOwned::to_owned)),
                    last_stage: ReconciliationStage::Received,
                    error: AppError::Internal("reconciliation task produced no result".to_owned()),
                    event: raw.unwrap_or_default(),
                    replay_count: 0,
                    recorded_at: Utc::now(),
                }),
            })
            .collect()
    }
}
