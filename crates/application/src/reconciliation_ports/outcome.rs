use cisync_domain::AssetTag;

use super::stage::ReconciliationStage;
use crate::cmdb_ports::StoredConfigurationItem;

/// CMDB write issued for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOperation {
    /// No item carried the asset tag, one was created.
    Created,
    /// The existing item was updated in place.
    Updated,
}

impl UpsertOperation {
    /// Returns stable API value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

/// Result of one successfully reconciled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    /// Reconciled asset tag.
    pub asset_tag: AssetTag,
    /// Write issued against the CMDB.
    pub operation: UpsertOperation,
    /// Item as acknowledged by the CMDB.
    pub record: StoredConfigurationItem,
    /// Stages the event passed through.
    pub stages: Vec<ReconciliationStage>,
}
