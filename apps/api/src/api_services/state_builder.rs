use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;
use cisync_application::{
    AssetLockCoordinator, CmdbClient, ReconciliationFailureRepository, ReconciliationService,
    ReconciliationSettings,
};
use cisync_core::{AppError, AppResult};
use cisync_domain::CiTransformer;
use cisync_infrastructure::{
    HmacSha256SignatureVerifier, HttpCmdbClient, InMemoryAssetLockCoordinator,
    InMemoryCmdbClient, InMemoryFailureRepository, PostgresFailureRepository,
    RedisAssetLockCoordinator,
};
use tracing::{info, warn};

use crate::api_config::{ApiConfig, CmdbBackendConfig, FailureStoreConfig, LockBackendConfig};
use crate::state::AppState;

use super::database::connect_and_migrate;
use super::redis::build_redis_client;

pub async fn build_app_state(config: &ApiConfig) -> AppResult<AppState> {
    let cmdb_client = build_cmdb_client(config)?;
    let lock_coordinator = build_lock_coordinator(config)?;
    let failure_repository = build_failure_repository(config).await?;

    let reconciliation_service = ReconciliationService::new(
        CiTransformer::new(config.discovery_source.as_str())?,
        cmdb_client,
        lock_coordinator,
        failure_repository,
    )
    .with_settings(ReconciliationSettings {
        cmdb_call_timeout: config.cmdb_call_timeout,
        lock_wait_timeout: config.lock_wait_timeout,
        max_concurrency: config.reconcile_concurrency,
        holder_id: config.instance_id.clone(),
    });

    let signature_header = HeaderName::try_from(config.signature_header.as_str())
        .map_err(|error| {
            AppError::Validation(format!(
                "invalid SIGNATURE_HEADER '{}': {error}",
                config.signature_header
            ))
        })?;

    Ok(AppState {
        reconciliation_service,
        signature_verifier: Arc::new(HmacSha256SignatureVerifier::new(
            config.signature_secret.as_bytes(),
        )?),
        signature_header,
        internal_shared_secret: config.internal_shared_secret.clone(),
    })
}

fn build_cmdb_client(config: &ApiConfig) -> AppResult<Arc<dyn CmdbClient>> {
    match &config.cmdb_backend {
        CmdbBackendConfig::Memory => {
            warn!("CMDB_MODE=memory keeps configuration items in process memory only");
            Ok(Arc::new(InMemoryCmdbClient::new()))
        }
        CmdbBackendConfig::Http(http_config) => {
            let http_client = reqwest::Client::builder()
                .timeout(config.cmdb_call_timeout)
                .connect_timeout(config.cmdb_call_timeout.min(Duration::from_secs(5)))
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build CMDB HTTP client: {error}"))
                })?;
            info!(
                instance_url = %http_config.instance_url,
                table = %http_config.table,
                "using CMDB table API"
            );
            Ok(Arc::new(HttpCmdbClient::new(
                http_client,
                http_config.clone(),
            )?))
        }
    }
}

fn build_lock_coordinator(config: &ApiConfig) -> AppResult<Arc<dyn AssetLockCoordinator>> {
    match &config.lock_backend {
        LockBackendConfig::Memory => Ok(Arc::new(InMemoryAssetLockCoordinator::new())),
        LockBackendConfig::Redis {
            redis_url,
            lease_seconds,
        } => Ok(Arc::new(RedisAssetLockCoordinator::new(
            build_redis_client(redis_url)?,
            "cisync:asset_lock",
            Duration::from_secs(u64::from(*lease_seconds)),
        )?)),
    }
}

async fn build_failure_repository(
    config: &ApiConfig,
) -> AppResult<Arc<dyn ReconciliationFailureRepository>> {
    match &config.failure_store {
        FailureStoreConfig::Memory => Ok(Arc::new(InMemoryFailureRepository::new())),
        FailureStoreConfig::Postgres { database_url } => {
            let pool = connect_and_migrate(database_url).await?;
            Ok(Arc::new(PostgresFailureRepository::new(pool)))
        }
    }
}
