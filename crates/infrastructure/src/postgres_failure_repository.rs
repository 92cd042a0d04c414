use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use cisync_application::{
    FailureListQuery, ReconciliationFailure, ReconciliationFailureRepository,
    ReconciliationStage,
};
use cisync_core::{AppError, AppResult, ErrorKind};
use cisync_domain::RawInfrastructureEvent;

/// PostgreSQL-backed store for failed events awaiting replay.
#[derive(Clone)]
pub struct PostgresFailureRepository {
    pool: PgPool,
}

impl PostgresFailureRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct FailureRow {
    failure_id: Uuid,
    asset_tag: Option<String>,
    last_stage: String,
    error_kind: String,
    error_detail: String,
    event: Value,
    replay_count: i32,
    recorded_at: DateTime<Utc>,
}

impl FailureRow {
    fn into_failure(self) -> AppResult<ReconciliationFailure> {
        let kind = ErrorKind::parse(self.error_kind.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "stored failure '{}' has invalid error kind: {error}",
                self.failure_id
            ))
        })?;
        let last_stage = ReconciliationStage::parse(self.last_stage.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "stored failure '{}' has invalid stage: {error}",
                self.failure_id
            ))
        })?;
        let event = RawInfrastructureEvent::from_value(self.event).map_err(|error| {
            AppError::Internal(format!(
                "stored failure '{}' has an unreadable event: {error}",
                self.failure_id
            ))
        })?;

        Ok(ReconciliationFailure {
            failure_id: self.failure_id,
            asset_tag: self.asset_tag,
            last_stage,
            error: AppError::from_kind(kind, self.error_detail),
            event,
            replay_count: u32::try_from(self.replay_count).unwrap_or_default(),
            recorded_at: self.recorded_at,
        })
    }
}

const SELECT_FAILURE_COLUMNS: &str = r#"
    SELECT
        failure_id,
        asset_tag,
        last_stage,
        error_kind,
        error_detail,
        event,
        replay_count,
        recorded_at
    FROM reconciliation_failures
"#;

#[async_trait]
impl ReconciliationFailureRepository for PostgresFailureRepository {
    async fn record_failure(&self, failure: ReconciliationFailure) -> AppResult<()> {
        let replay_count = i32::try_from(failure.replay_count).unwrap_or(i32::MAX);

        sqlx::query(
            r#"
            INSERT INTO reconciliation_failures (
                failure_id,
                asset_tag,
                last_stage,
                error_kind,
                error_detail,
                retryable,
                event,
                replay_count,
                recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (failure_id) DO UPDATE SET
                asset_tag = EXCLUDED.asset_tag,
                last_stage = EXCLUDED.last_stage,
                error_kind = EXCLUDED.error_kind,
                error_detail = EXCLUDED.error_detail,
                retryable = EXCLUDED.retryable,
                event = EXCLUDED.event,
                replay_count = EXCLUDED.replay_count,
                recorded_at = EXCLUDED.recorded_at
            "#,
        )
        .bind(failure.failure_id)
        .bind(failure.asset_tag.as_deref())
        .bind(failure.last_stage.as_str())
        .bind(failure.error.kind().as_str())
        .bind(failure.error.detail())
        .bind(failure.is_retryable())
        .bind(failure.event.to_value())
        .bind(replay_count)
        .bind(failure.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record reconciliation failure '{}': {error}",
                failure.failure_id
            ))
        })?;

        Ok(())
    }

    async fn find_failure(&self, failure_id: Uuid) -> AppResult<Option<ReconciliationFailure>> {
        let row = sqlx::query_as::<_, FailureRow>(
            format!("{SELECT_FAILURE_COLUMNS} WHERE failure_id = $1").as_str(),
        )
        .bind(failure_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load reconciliation failure '{failure_id}': {error}"
            ))
        })?;

        row.map(FailureRow::into_failure).transpose()
    }

    async fn list_failures(
        &self,
        query: FailureListQuery,
    ) -> AppResult<Vec<ReconciliationFailure>> {
        let capped_limit = query.limit.clamp(1, 500) as i64;
        let capped_offset = query.offset.min(100_000) as i64;
        let max_replay_count = query
            .max_replay_count
            .map(|count| i32::try_from(count).unwrap_or(i32::MAX));

        let rows = sqlx::query_as::<_, FailureRow>(
            format!(
                "{SELECT_FAILURE_COLUMNS}
                WHERE ($1 = FALSE OR retryable)
                    AND ($2::INTEGER IS NULL OR replay_count < $2)
                ORDER BY recorded_at DESC, failure_id
                LIMIT $3
                OFFSET $4"
            )
            .as_str(),
        )
        .bind(query.retryable_only)
        .bind(max_replay_count)
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list reconciliation failures: {error}"))
        })?;

        rows.into_iter().map(FailureRow::into_failure).collect()
    }

    async fn remove_failure(&self, failure_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM reconciliation_failures WHERE failure_id = $1")
            .bind(failure_id)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to remove reconciliation failure '{failure_id}': {error}"
                ))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests;
