use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use cisync_application::{CmdbClient, StoredConfigurationItem};
use cisync_core::{AppError, AppResult};
use cisync_domain::{AssetTag, ConfigurationItem};
use tokio::sync::RwLock;

/// Number of CMDB calls issued against an [`InMemoryCmdbClient`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CmdbCallCounts {
    /// Lookups by asset tag.
    pub find: usize,
    /// Inserts.
    pub create: usize,
    /// Updates.
    pub update: usize,
}

/// In-memory CMDB table keyed by asset tag.
///
/// Used for local runs without a CMDB instance. Failures can be injected per
/// asset tag.
#[derive(Default)]
pub struct InMemoryCmdbClient {
    items: RwLock<HashMap<AssetTag, StoredConfigurationItem>>,
    injected_failures: RwLock<HashMap<AssetTag, AppError>>,
    next_record_id: AtomicU64,
    find_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl InMemoryCmdbClient {
    /// Creates an empty in-memory CMDB.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call for the asset tag fail with the given error.
    pub async fn inject_failure(&self, asset_tag: AssetTag, error: AppError) {
        self.injected_failures.write().await.insert(asset_tag, error);
    }

    /// Removes an injected failure.
    pub async fn clear_failure(&self, asset_tag: &AssetTag) {
        self.injected_failures.write().await.remove(asset_tag);
    }

    /// Returns the stored item for one asset tag.
    pub async fn get(&self, asset_tag: &AssetTag) -> Option<StoredConfigurationItem> {
        self.items.read().await.get(asset_tag).cloned()
    }

    /// Returns the number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Returns whether no item is stored.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Returns call counters.
    #[must_use]
    pub fn call_counts(&self) -> CmdbCallCounts {
        CmdbCallCounts {
            find: self.find_calls.load(Ordering::Relaxed),
            create: self.create_calls.load(Ordering::Relaxed),
            update: self.update_calls.load(Ordering::Relaxed),
        }
    }

    async fn check_injected(&self, asset_tag: &AssetTag) -> AppResult<()> {
        match self.injected_failures.read().await.get(asset_tag) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CmdbClient for InMemoryCmdbClient {
    async fn find(&self, asset_tag: &AssetTag) -> AppResult<Option<StoredConfigurationItem>> {
        self.find_calls.fetch_add(1, Ordering::Relaxed);
        self.check_injected(asset_tag).await?;

        Ok(self.items.read().await.get(asset_tag).cloned())
    }

    async fn create(&self, item: ConfigurationItem) -> AppResult<StoredConfigurationItem> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        self.check_injected(item.asset_tag()).await?;

        let mut items = self.items.write().await;
        if items.contains_key(item.asset_tag()) {
            return Err(AppError::CmdbConflict(format!(
                "asset tag '{}' already exists",
                item.asset_tag()
            )));
        }

        let record_id = format!(
            "mem-{:08}",
            self.next_record_id.fetch_add(1, Ordering::Relaxed) + 1
        );
        let stored = StoredConfigurationItem { record_id, item };
        items.insert(stored.item.asset_tag().clone(), stored.clone());

        Ok(stored)
    }

    async fn update(
        &self,
        existing: &StoredConfigurationItem,
        item: ConfigurationItem,
    ) -> AppResult<StoredConfigurationItem> {
        self.update_calls.fetch_add(1, Ordering::Relaxed);
        self.check_injected(item.asset_tag()).await?;

        let mut items = self.items.write().await;
        let Some(current) = items.get_mut(item.asset_tag()) else {
            return Err(AppError::CmdbConflict(format!(
                "asset tag '{}' does not exist",
                item.asset_tag()
            )));
        };

        if current.record_id != existing.record_id {
            return Err(AppError::CmdbConflict(format!(
                "record '{}' does not hold asset tag '{}'",
                existing.record_id,
                item.asset_tag()
            )));
        }

        current.item = item;
        Ok(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use cisync_application::CmdbClient;
    use cisync_core::{AppError, ErrorKind};
    use cisync_domain::{AssetTag, CiStatus, ConfigurationItem, ConfigurationItemInput};

    use super::{CmdbCallCounts, InMemoryCmdbClient};

    fn item(asset_tag: &str, status: CiStatus) -> ConfigurationItem {
        ConfigurationItem::new(ConfigurationItemInput {
            asset_tag: asset_tag.to_owned(),
            name: asset_tag.to_owned(),
            classification: "aws_instance".to_owned(),
            environment: "dev".to_owned(),
            status,
            discovery_source: "cisync".to_owned(),
            last_discovered: Utc::now(),
        })
        .unwrap_or_else(|_| unreachable!())
    }

    fn tag(value: &str) -> AssetTag {
        AssetTag::new(value).unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn create_then_update_keeps_one_record() {
        let cmdb = InMemoryCmdbClient::new();

        let created = cmdb.create(item("A-1", CiStatus::Installed)).await;
        assert!(created.is_ok());
        let created = created.unwrap_or_else(|_| unreachable!());

        let updated = cmdb.update(&created, item("A-1", CiStatus::Retired)).await;
        assert!(updated.is_ok());

        assert_eq!(cmdb.len().await, 1);
        assert_eq!(
            cmdb.get(&tag("A-1")).await.map(|stored| stored.item.status()),
            Some(CiStatus::Retired)
        );
        assert_eq!(
            cmdb.call_counts(),
            CmdbCallCounts {
                find: 0,
                create: 1,
                update: 1
            }
        );
    }

    #[tokio::test]
    async fn duplicate_create_is_a_conflict() {
        let cmdb = InMemoryCmdbClient::new();
        assert!(cmdb.create(item("A-1", CiStatus::Installed)).await.is_ok());

        let duplicate = cmdb.create(item("A-1", CiStatus::Installed)).await;
        assert!(duplicate.is_err_and(|error| error.kind() == ErrorKind::CmdbConflict));
    }

    #[tokio::test]
    async fn injected_failure_only_hits_its_asset_tag() {
        let cmdb = InMemoryCmdbClient::new();
        cmdb.inject_failure(tag("A-1"), AppError::CmdbUnavailable("down".to_owned()))
            .await;

        assert!(cmdb.find(&tag("A-1")).await.is_err());
        assert!(matches!(cmdb.find(&tag("A-2")).await, Ok(None)));

        cmdb.clear_failure(&tag("A-1")).await;
        assert!(cmdb.find(&tag("A-1")).await.is_ok());
    }
}
