use async_trait::async_trait;
use cisync_core::AppResult;
use cisync_domain::AssetTag;

/// Exclusive ownership of one asset tag for the find/upsert sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLease {
    /// Locked asset tag.
    pub asset_tag: String,
    /// Process or request that owns the lease.
    pub holder_id: String,
    /// Ownership token checked on release.
    pub token: String,
}

/// Coordination port that serializes work on the same asset tag.
#[async_trait]
pub trait AssetLockCoordinator: Send + Sync {
    /// Waits until the asset tag is free and takes it.
    ///
    /// Callers bound the wait themselves; dropping the future before it
    /// resolves must not leave the tag locked.
    async fn acquire(&self, asset_tag: &AssetTag, holder_id: &str) -> AppResult<AssetLease>;

    /// Releases a lease using token compare-and-delete semantics.
    async fn release(&self, lease: AssetLease) -> AppResult<()>;
}
