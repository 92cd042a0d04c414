use super::process::PriorFailure;
use super::*;

impl ReconciliationService {
    /// Reruns the original event of a recorded failure.
    ///
    /// A successful replay removes the failure record. A failed replay keeps
    /// the same failure identifier and increments its replay count.
    pub async fn replay_failure(&self, failure_id: Uuid) -> AppResult<ReconciliationResult> {
        let failure = self.find_failure(failure_id).await?;
        let prior = PriorFailure {
            failure_id: failure.failure_id,
            replay_count: failure.replay_count,
        };

        let result = self.process_with_prior(failure.event, Some(prior)).await;

        if result.is_ok() {
            let removed = self.failure_repository.remove_failure(failure_id).await?;
            if !removed {
                warn!(failure_id = %failure_id, "replayed failure was already removed");
            }
            info!(
                failure_id = %failure_id,
                replay_count = prior.replay_count.saturating_add(1),
                "failure replayed"
            );
        }

        Ok(result)
    }
}
