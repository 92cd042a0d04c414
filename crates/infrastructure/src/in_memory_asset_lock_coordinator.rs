use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cisync_application::{AssetLease, AssetLockCoordinator};
use cisync_core::{AppError, AppResult};
use cisync_domain::AssetTag;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Process-local asset lock registry with one async mutex per asset tag.
#[derive(Default)]
pub struct InMemoryAssetLockCoordinator {
    registry: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    held: Mutex<HashMap<String, OwnedMutexGuard<()>>>,
}

impl InMemoryAssetLockCoordinator {
    /// Creates an empty lock registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of asset tags with a live lock entry.
    pub async fn tracked_asset_tags(&self) -> usize {
        self.registry.lock().await.len()
    }
}

#[async_trait]
impl AssetLockCoordinator for InMemoryAssetLockCoordinator {
    async fn acquire(&self, asset_tag: &AssetTag, holder_id: &str) -> AppResult<AssetLease> {
        let lock = self
            .registry
            .lock()
            .await
            .entry(asset_tag.as_str().to_owned())
            .or_default()
            .clone();

        let guard = lock.lock_owned().await;
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        self.held.lock().await.insert(token.clone(), guard);
        debug!(asset_tag = %asset_tag, holder_id, "asset lock acquired");

        Ok(AssetLease {
            asset_tag: asset_tag.as_str().to_owned(),
            holder_id: holder_id.to_owned(),
            token,
        })
    }

    async fn release(&self, lease: AssetLease) -> AppResult<()> {
        let Some(guard) = self.held.lock().await.remove(lease.token.as_str()) else {
            return Err(AppError::Internal(format!(
                "asset lock '{}' is not held by token '{}'",
                lease.asset_tag, lease.token
            )));
        };
        drop(guard);

        let mut registry = self.registry.lock().await;
        if registry
            .get(lease.asset_tag.as_str())
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            registry.remove(lease.asset_tag.as_str());
        }

        Ok(())
    }
}
