//! Redis-backed asset lock for ingestion replicas sharing one CMDB.

use std::time::Duration;

use async_trait::async_trait;
use cisync_application::{AssetLease, AssetLockCoordinator};
use cisync_core::{AppError, AppResult};
use cisync_domain::AssetTag;
use redis::Script;
use redis::aio::MultiplexedConnection;
use tracing::debug;

const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Redis implementation of asset lock coordination.
///
/// Each lock is a `SET NX PX` key holding a random token. The expiry bounds how
/// long a crashed replica can keep an asset tag locked.
#[derive(Clone)]
pub struct RedisAssetLockCoordinator {
    client: redis::Client,
    key_prefix: String,
    lease_ttl: Duration,
    retry_interval: Duration,
}

impl RedisAssetLockCoordinator {
    /// Creates one coordinator adapter.
    pub fn new(
        client: redis::Client,
        key_prefix: impl Into<String>,
        lease_ttl: Duration,
    ) -> AppResult<Self> {
        if lease_ttl.is_zero() {
            return Err(AppError::Validation(
                "asset lock lease ttl must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
            lease_ttl,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        })
    }

    /// Overrides the polling interval used while the lock is taken.
    #[must_use]
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval.max(Duration::from_millis(5));
        self
    }

    fn key_for(&self, asset_tag: &str) -> String {
        format!("{}:{asset_tag}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::CmdbUnavailable(format!("asset lock backend unreachable: {error}"))
            })
    }
}

#[async_trait]
impl AssetLockCoordinator for RedisAssetLockCoordinator {
    async fn acquire(&self, asset_tag: &AssetTag, holder_id: &str) -> AppResult<AssetLease> {
        if holder_id.trim().is_empty() {
            return Err(AppError::Validation(
                "asset lock holder_id must not be empty".to_owned(),
            ));
        }

        let key = self.key_for(asset_tag.as_str());
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        let ttl_millis = u64::try_from(self.lease_ttl.as_millis()).unwrap_or(u64::MAX);
        let mut connection = self.connection().await?;

        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(key.as_str())
                .arg(token.as_str())
                .arg("NX")
                .arg("PX")
                .arg(ttl_millis)
                .query_async(&mut connection)
                .await
                .map_err(|error| {
                    AppError::CmdbUnavailable(format!(
                        "failed to acquire asset lock '{asset_tag}': {error}"
                    ))
                })?;

            if acquired.is_some() {
                debug!(asset_tag = %asset_tag, holder_id, "asset lock acquired");
                return Ok(AssetLease {
                    asset_tag: asset_tag.as_str().to_owned(),
                    holder_id: holder_id.to_owned(),
                    token,
                });
            }

            tokio::time::sleep(self.retry_interval).await;
        }
    }

    async fn release(&self, lease: AssetLease) -> AppResult<()> {
        let key = self.key_for(lease.asset_tag.as_str());
        let script = Script::new(RELEASE_LOCK_SCRIPT);
        let mut connection = self.connection().await?;

        let released = script
            .key(key)
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to release asset lock '{}': {error}",
                    lease.asset_tag
                ))
            })?;

        if released == 0 {
            return Err(AppError::Internal(format!(
                "asset lock '{}' expired before release",
                lease.asset_tag
            )));
        }

        Ok(())
    }
}
