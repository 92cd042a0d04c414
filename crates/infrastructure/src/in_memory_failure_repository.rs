use std::collections::HashMap;

use async_trait::async_trait;
use cisync_application::{
    FailureListQuery, ReconciliationFailure, ReconciliationFailureRepository,
};
use cisync_core::AppResult;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory failure store. Records are lost on restart.
#[derive(Default)]
pub struct InMemoryFailureRepository {
    failures: RwLock<HashMap<Uuid, ReconciliationFailure>>,
}

impl InMemoryFailureRepository {
    /// Creates an empty failure store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReconciliationFailureRepository for InMemoryFailureRepository {
    async fn record_failure(&self, failure: ReconciliationFailure) -> AppResult<()> {
        self.failures
            .write()
            .await
            .insert(failure.failure_id, failure);
        Ok(())
    }

    async fn find_failure(&self, failure_id: Uuid) -> AppResult<Option<ReconciliationFailure>> {
        Ok(self.failures.read().await.get(&failure_id).cloned())
    }

    async fn list_failures(
        &self,
        query: FailureListQuery,
    ) -> AppResult<Vec<ReconciliationFailure>> {
        let mut failures: Vec<ReconciliationFailure> = self
            .failures
            .read()
            .await
            .values()
            .filter(|failure| query.matches(failure))
            .cloned()
            .collect();

        failures.sort_by(|left, right| {
            right
                .recorded_at
                .cmp(&left.recorded_at)
                .then_with(|| left.failure_id.cmp(&right.failure_id))
        });

        Ok(failures
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn remove_failure(&self, failure_id: Uuid) -> AppResult<bool> {
        Ok(self.failures.write().await.remove(&failure_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use cisync_application::{
        FailureListQuery, ReconciliationFailure, ReconciliationFailureRepository,
        ReconciliationStage,
    };
    use cisync_core::AppError;
    use cisync_domain::RawInfrastructureEvent;
    use uuid::Uuid;

    use super::InMemoryFailureRepository;

    fn failure(error: AppError, minutes_ago: i64, replay_count: u32) -> ReconciliationFailure {
        ReconciliationFailure {
            failure_id: Uuid::new_v4(),
            asset_tag: Some("A-1".to_owned()),
            last_stage: ReconciliationStage::Transformed,
            error,
            event: RawInfrastructureEvent::default(),
            replay_count,
            recorded_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn lists_newest_first_with_filters_and_paging() {
        let repository = InMemoryFailureRepository::new();
        let oldest = failure(AppError::CmdbUnavailable("503".to_owned()), 30, 0);
        let newest = failure(AppError::CmdbUnavailable("timeout".to_owned()), 1, 0);
        let fatal = failure(AppError::CmdbConflict("bad body".to_owned()), 10, 0);
        let exhausted = failure(AppError::CmdbUnavailable("503".to_owned()), 5, 3);
        for entry in [&oldest, &newest, &fatal, &exhausted] {
            assert!(repository.record_failure(entry.clone()).await.is_ok());
        }

        let all = repository.list_failures(FailureListQuery::default()).await;
        assert_eq!(
            all.map(|failures| failures.iter().map(|f| f.failure_id).collect::<Vec<_>>())
                .ok(),
            Some(vec![
                newest.failure_id,
                exhausted.failure_id,
                fatal.failure_id,
                oldest.failure_id
            ])
        );

        let replayable = repository
            .list_failures(FailureListQuery {
                retryable_only: true,
                max_replay_count: Some(3),
                limit: 1,
                offset: 1,
            })
            .await;
        assert_eq!(
            replayable
                .map(|failures| failures.iter().map(|f| f.failure_id).collect::<Vec<_>>())
                .ok(),
            Some(vec![oldest.failure_id])
        );
    }

    #[tokio::test]
    async fn record_replaces_and_remove_reports_existence() {
        let repository = InMemoryFailureRepository::new();
        let mut entry = failure(AppError::CmdbUnavailable("503".to_owned()), 0, 0);
        assert!(repository.record_failure(entry.clone()).await.is_ok());

        entry.replay_count = 1;
        assert!(repository.record_failure(entry.clone()).await.is_ok());
        let stored = repository.find_failure(entry.failure_id).await;
        assert_eq!(
            stored.ok().flatten().map(|stored| stored.replay_count),
            Some(1)
        );

        assert_eq!(repository.remove_failure(entry.failure_id).await.ok(), Some(true));
        assert_eq!(repository.remove_failure(entry.failure_id).await.ok(), Some(false));
    }
}
