//! cisync API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use cisync_core::AppError;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, FailureStoreConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    if config.migrate_only {
        match &config.failure_store {
            FailureStoreConfig::Postgres { database_url } => {
                api_services::connect_and_migrate(database_url).await?;
                info!("database migrations applied successfully");
            }
            FailureStoreConfig::Memory => {
                warn!("FAILURE_STORE=memory has no migrations to apply");
            }
        }
        return Ok(());
    }

    let app_state = api_services::build_app_state(&config).await?;
    let app = api_router::build_router(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(
        %address,
        instance_id = %config.instance_id,
        concurrency = config.reconcile_concurrency,
        "cisync-api listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("server error: {error}")))
}
