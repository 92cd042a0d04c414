use async_trait::async_trait;
use cisync_core::AppResult;
use cisync_domain::{AssetTag, ConfigurationItem};

/// Configuration item as held by the CMDB, with the row locator the CMDB assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConfigurationItem {
    /// CMDB row identifier (`sys_id` on ServiceNow-style tables).
    pub record_id: String,
    /// Item contents.
    pub item: ConfigurationItem,
}

/// Port for the CMDB configuration item table.
///
/// Implementations classify transport, timeout and credential failures as
/// [`cisync_core::AppError::CmdbUnavailable`] and any response they cannot
/// interpret as [`cisync_core::AppError::CmdbConflict`].
#[async_trait]
pub trait CmdbClient: Send + Sync {
    /// Looks up the single item carrying this asset tag.
    async fn find(&self, asset_tag: &AssetTag) -> AppResult<Option<StoredConfigurationItem>>;

    /// Creates one item.
    async fn create(&self, item: ConfigurationItem) -> AppResult<StoredConfigurationItem>;

    /// Replaces the fields of an item previously returned by [`CmdbClient::find`].
    async fn update(
        &self,
        existing: &StoredConfigurationItem,
        item: ConfigurationItem,
    ) -> AppResult<StoredConfigurationItem>;
}
