use chrono::{Duration, Utc};
use cisync_application::{
    FailureListQuery, ReconciliationFailure, ReconciliationFailureRepository,
    ReconciliationStage,
};
use cisync_core::{AppError, ErrorKind};
use cisync_domain::RawInfrastructureEvent;
use serde_json::json;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresFailureRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres failure tests: {error}");
    }

    Some(pool)
}

fn raw_event(asset_tag: &str) -> RawInfrastructureEvent {
    let event = RawInfrastructureEvent::from_value(json!({
        "resource_id": asset_tag,
        "resource_type": "aws_instance",
        "action": "create",
        "metadata": {"region": "eu-west-1"}
    }));
    assert!(event.is_ok());
    event.unwrap_or_else(|_| unreachable!())
}

fn failure(asset_tag: &str, error: AppError, minutes_ago: i64) -> ReconciliationFailure {
    ReconciliationFailure {
        failure_id: Uuid::new_v4(),
        asset_tag: Some(asset_tag.to_owned()),
        last_stage: ReconciliationStage::Transformed,
        error,
        event: raw_event(asset_tag),
        replay_count: 0,
        // Far-future timestamps keep these rows ahead of rows left by other runs.
        recorded_at: Utc::now() + Duration::days(3650) - Duration::minutes(minutes_ago),
    }
}

#[tokio::test]
async fn records_and_reloads_failure_with_original_event() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresFailureRepository::new(pool);

    let mut recorded = failure(
        "pg-A-1",
        AppError::CmdbUnavailable("status 503".to_owned()),
        0,
    );
    recorded.recorded_at = Utc::now();
    assert!(repository.record_failure(recorded.clone()).await.is_ok());

    recorded.replay_count = 2;
    recorded.error = AppError::CmdbConflict("missing result".to_owned());
    assert!(repository.record_failure(recorded.clone()).await.is_ok());

    let loaded = repository.find_failure(recorded.failure_id).await;
    assert!(loaded.is_ok());
    let loaded = loaded.unwrap_or_else(|_| unreachable!());
    assert!(loaded.is_some());
    let loaded = loaded.unwrap_or_else(|| unreachable!());

    assert_eq!(loaded.replay_count, 2);
    assert_eq!(loaded.error.kind(), ErrorKind::CmdbConflict);
    assert_eq!(loaded.error.detail(), "missing result");
    assert_eq!(loaded.last_stage, ReconciliationStage::Transformed);
    assert_eq!(loaded.event, recorded.event);

    assert_eq!(
        repository.remove_failure(recorded.failure_id).await.ok(),
        Some(true)
    );
    assert!(matches!(
        repository.find_failure(recorded.failure_id).await,
        Ok(None)
    ));
}

#[tokio::test]
async fn lists_replayable_failures_newest_first() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresFailureRepository::new(pool);

    let older = failure("pg-B-1", AppError::CmdbUnavailable("timeout".to_owned()), 10);
    let newer = failure("pg-B-2", AppError::CmdbUnavailable("status 429".to_owned()), 5);
    let fatal = failure("pg-B-3", AppError::Validation("resource_id missing".to_owned()), 1);
    for entry in [&older, &newer, &fatal] {
        assert!(repository.record_failure(entry.clone()).await.is_ok());
    }

    let listed = repository
        .list_failures(FailureListQuery {
            retryable_only: true,
            max_replay_count: Some(1),
            limit: 2,
            offset: 0,
        })
        .await;
    assert_eq!(
        listed
            .map(|failures| failures
                .iter()
                .map(|failure| failure.failure_id)
                .collect::<Vec<_>>())
            .ok(),
        Some(vec![newer.failure_id, older.failure_id])
    );

    for entry in [&older, &newer, &fatal] {
        assert!(repository.remove_failure(entry.failure_id).await.is_ok());
    }
}
