//! cisync failure replayer.
//!
//! Polls the API for recorded retryable failures and asks it to replay
//! each one. The reconciliation core never retries on its own; this
//! process is the redelivery path.

#![forbid(unsafe_code)]

use std::env;
use std::str::FromStr;
use std::time::Duration;

use cisync_core::{AppError, AppResult};
use reqwest::{StatusCode, header};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReplayerConfig {
    api_base_url: String,
    internal_shared_secret: String,
    poll_interval_ms: u64,
    request_timeout_ms: u64,
    batch_limit: usize,
    max_replays: u32,
}

#[derive(Debug, Deserialize)]
struct FailureListResponse {
    failures: Vec<PendingFailure>,
}

#[derive(Debug, Deserialize)]
struct PendingFailure {
    failure_id: Uuid,
    asset_tag: Option<String>,
    kind: String,
    replay_count: u32,
}

#[derive(Debug, Deserialize)]
struct ReplayResponse {
    status: String,
    error: Option<ReplayError>,
}

#[derive(Debug, Deserialize)]
struct ReplayError {
    message: String,
    retryable: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CycleSummary {
    listed: usize,
    replayed: u32,
    failed: u32,
    vanished: u32,
}

impl CycleSummary {
    /// A full page with progress suggests more work is waiting.
    fn should_continue_immediately(&self, batch_limit: usize) -> bool {
        self.listed >= batch_limit && self.replayed > 0
    }
}

enum ReplayOutcome {
    Replayed,
    Failed(ReplayError),
    Vanished,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ReplayerConfig::load()?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    info!(
        api_base_url = %config.api_base_url,
        batch_limit = config.batch_limit,
        max_replays = config.max_replays,
        poll_interval_ms = config.poll_interval_ms,
        request_timeout_ms = config.request_timeout_ms,
        "cisync-replayer started"
    );

    loop {
        match run_cycle(&http_client, &config).await {
            Ok(summary) => {
                if summary.listed > 0 {
                    info!(
                        listed = summary.listed,
                        replayed = summary.replayed,
                        failed = summary.failed,
                        vanished = summary.vanished,
                        "replay cycle finished"
                    );
                }
                if summary.should_continue_immediately(config.batch_limit) {
                    continue;
                }
            }
            Err(error) => {
                warn!(error = %error, "failed to list replayable failures");
            }
        }

        tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
    }
}

async fn run_cycle(http_client: &reqwest::Client, config: &ReplayerConfig) -> AppResult<CycleSummary> {
    let pending = list_replayable(http_client, config).await?;
    let mut summary = CycleSummary {
        listed: pending.len(),
        ..CycleSummary::default()
    };

    for failure in pending {
        let asset_tag = failure.asset_tag.as_deref().unwrap_or("<none>");
        match replay(http_client, config, failure.failure_id).await {
            Ok(ReplayOutcome::Replayed) => {
                summary.replayed = summary.replayed.saturating_add(1);
                info!(
                    failure_id = %failure.failure_id,
                    asset_tag,
                    previous_kind = %failure.kind,
                    "failure replayed"
                );
            }
            Ok(ReplayOutcome::Failed(error)) => {
                summary.failed = summary.failed.saturating_add(1);
                warn!(
                    failure_id = %failure.failure_id,
                    asset_tag,
                    replay_count = failure.replay_count.saturating_add(1),
                    retryable = error.retryable,
                    error = %error.message,
                    "replay failed"
                );
            }
            Ok(ReplayOutcome::Vanished) => {
                summary.vanished = summary.vanished.saturating_add(1);
            }
            Err(error) => {
                summary.failed = summary.failed.saturating_add(1);
                warn!(
                    failure_id = %failure.failure_id,
                    asset_tag,
                    error = %error,
                    "replay request failed"
                );
            }
        }
    }

    Ok(summary)
}

async fn list_replayable(
    http_client: &reqwest::Client,
    config: &ReplayerConfig,
) -> AppResult<Vec<PendingFailure>> {
    let response = http_client
        .get(config.list_endpoint())
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", config.internal_shared_secret),
        )
        .send()
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to call failure listing endpoint: {error}"))
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_owned());
        return Err(AppError::Internal(format!(
            "failure listing endpoint returned status {}: {body}",
            status.as_u16()
        )));
    }

    let listing = response.json::<FailureListResponse>().await.map_err(|error| {
        AppError::Internal(format!(
            "failed to parse failure listing response body: {error}"
        ))
    })?;

    Ok(listing.failures)
}

async fn replay(
    http_client: &reqwest::Client,
    config: &ReplayerConfig,
    failure_id: Uuid,
) -> AppResult<ReplayOutcome> {
    let response = http_client
        .post(config.replay_endpoint(failure_id))
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", config.internal_shared_secret),
        )
        .send()
        .await
        .map_err(|error| AppError::Internal(format!("failed to call replay endpoint: {error}")))?;

    let status = response.status();
    // Another replayer or operator resolved it first.
    if status == StatusCode::NOT_FOUND {
        return Ok(ReplayOutcome::Vanished);
    }
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_owned());
        return Err(AppError::Internal(format!(
            "replay endpoint returned status {}: {body}",
            status.as_u16()
        )));
    }

    let replayed = response.json::<ReplayResponse>().await.map_err(|error| {
        AppError::Internal(format!("failed to parse replay response body: {error}"))
    })?;

    Ok(replayed.into_outcome())
}

impl ReplayResponse {
    fn into_outcome(self) -> ReplayOutcome {
        match (self.status.as_str(), self.error) {
            ("done", _) => ReplayOutcome::Replayed,
            (_, Some(error)) => ReplayOutcome::Failed(error),
            (status, None) => ReplayOutcome::Failed(ReplayError {
                message: format!("replay reported status '{status}' without an error"),
                retryable: false,
            }),
        }
    }
}

impl ReplayerConfig {
    fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("REPLAYER_API_BASE_URL")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "http://127.0.0.1:3001".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let internal_shared_secret = lookup("INTERNAL_SHARED_SECRET")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Validation("INTERNAL_SHARED_SECRET is required".to_owned()))?;
        let poll_interval_ms = parse_env(&lookup, "REPLAYER_POLL_INTERVAL_MS", 5_000_u64)?;
        // Must outlast one server-side replay: lock wait plus find and upsert.
        let request_timeout_ms = parse_env(&lookup, "REPLAYER_REQUEST_TIMEOUT_MS", 60_000_u64)?;
        let batch_limit = parse_env(&lookup, "REPLAYER_BATCH_LIMIT", 25_usize)?;
        let max_replays = parse_env(&lookup, "REPLAYER_MAX_REPLAYS", 5_u32)?;

        if poll_interval_ms == 0 {
            return Err(AppError::Validation(
                "REPLAYER_POLL_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        if request_timeout_ms == 0 {
            return Err(AppError::Validation(
                "REPLAYER_REQUEST_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        if batch_limit == 0 || batch_limit > 500 {
            return Err(AppError::Validation(
                "REPLAYER_BATCH_LIMIT must be between 1 and 500".to_owned(),
            ));
        }

        if max_replays == 0 {
            return Err(AppError::Validation(
                "REPLAYER_MAX_REPLAYS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            api_base_url,
            internal_shared_secret,
            poll_interval_ms,
            request_timeout_ms,
            batch_limit,
            max_replays,
        })
    }

    fn list_endpoint(&self) -> String {
        format!(
            "{}/api/internal/failures?retryable_only=true&max_replay_count={}&limit={}",
            self.api_base_url, self.max_replays, self.batch_limit
        )
    }

    fn replay_endpoint(&self, failure_id: Uuid) -> String {
        format!(
            "{}/api/internal/failures/{failure_id}/replay",
            self.api_base_url
        )
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_env<F, T>(lookup: &F, name: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use uuid::Uuid;

    use super::{CycleSummary, FailureListResponse, ReplayOutcome, ReplayResponse, ReplayerConfig};

    fn load(pairs: &[(&str, &str)]) -> Result<ReplayerConfig, cisync_core::AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        ReplayerConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn config_defaults_and_endpoints() {
        let config = load(&[
            ("INTERNAL_SHARED_SECRET", "internal-secret"),
            ("REPLAYER_API_BASE_URL", "http://cisync.internal:3001/"),
        ]);
        assert!(config.is_ok());
        let config = config.unwrap_or_else(|_| unreachable!());

        assert_eq!(config.poll_interval_ms, 5_000);
        // Default API bounds: 15 s lock wait plus two 10 s CMDB calls.
        assert!(config.request_timeout_ms > 15_000 + 2 * 10_000);
        assert_eq!(
            config.list_endpoint(),
            "http://cisync.internal:3001/api/internal/failures?retryable_only=true&max_replay_count=5&limit=25"
        );

        let failure_id = Uuid::nil();
        assert_eq!(
            config.replay_endpoint(failure_id),
            format!("http://cisync.internal:3001/api/internal/failures/{failure_id}/replay")
        );
    }

    #[test]
    fn config_rejects_missing_secret_and_bad_numbers() {
        assert!(load(&[]).is_err());
        for (name, value) in [
            ("REPLAYER_POLL_INTERVAL_MS", "0"),
            ("REPLAYER_REQUEST_TIMEOUT_MS", "0"),
            ("REPLAYER_BATCH_LIMIT", "501"),
            ("REPLAYER_MAX_REPLAYS", "0"),
            ("REPLAYER_MAX_REPLAYS", "many"),
        ] {
            assert!(
                load(&[("INTERNAL_SHARED_SECRET", "s"), (name, value)]).is_err(),
                "{name}={value}"
            );
        }
    }

    #[test]
    fn parses_failure_listing_ignoring_extra_fields() {
        let listing: Result<FailureListResponse, _> = serde_json::from_value(json!({
            "failures": [{
                "failure_id": "6f1c1f8e-6a4e-4d43-9a55-0d5f3c8a9b10",
                "asset_tag": "i-1",
                "stage": "transformed",
                "kind": "cmdb_unavailable",
                "message": "cmdb unavailable: status 503",
                "retryable": true,
                "replay_count": 2,
                "recorded_at": "2026-10-16T08:00:00+00:00",
                "event": {"resource_id": "i-1"}
            }]
        }));
        assert!(listing.is_ok());
        let listing = listing.unwrap_or_else(|_| unreachable!());

        assert_eq!(listing.failures.len(), 1);
        assert_eq!(listing.failures[0].asset_tag.as_deref(), Some("i-1"));
        assert_eq!(listing.failures[0].replay_count, 2);
    }

    #[test]
    fn replay_response_maps_to_outcome() {
        let done: ReplayResponse = serde_json::from_value(json!({
            "failure_id": Uuid::nil(),
            "status": "done",
            "item": {"operation": "created"}
        }))
        .unwrap_or_else(|_| unreachable!());
        assert!(matches!(done.into_outcome(), ReplayOutcome::Replayed));

        let failed: ReplayResponse = serde_json::from_value(json!({
            "failure_id": Uuid::nil(),
            "status": "failed",
            "error": {"message": "cmdb unavailable: timed out", "kind": "cmdb_unavailable", "retryable": true}
        }))
        .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            failed.into_outcome(),
            ReplayOutcome::Failed(error) if error.retryable
        ));

        let odd: ReplayResponse =
            serde_json::from_value(json!({"status": "pending"})).unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            odd.into_outcome(),
            ReplayOutcome::Failed(error) if !error.retryable
        ));
    }

    #[test]
    fn continues_only_after_full_page_with_progress() {
        let full = CycleSummary {
            listed: 25,
            replayed: 3,
            failed: 22,
            vanished: 0,
        };
        assert!(full.should_continue_immediately(25));

        let stuck = CycleSummary {
            listed: 25,
            failed: 25,
            ..CycleSummary::default()
        };
        assert!(!stuck.should_continue_immediately(25));
        assert!(!CycleSummary::default().should_continue_immediately(25));
    }
}
