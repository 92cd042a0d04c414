//! Application services and ports.

#![forbid(unsafe_code)]

mod cmdb_ports;
mod reconciliation_ports;
mod reconciliation_service;
mod signature_ports;

pub use cmdb_ports::{CmdbClient, StoredConfigurationItem};
pub use reconciliation_ports::{
    AssetLease, AssetLockCoordinator, FailureListQuery, ReconciliationFailure,
    ReconciliationFailureRepository, ReconciliationOutcome, ReconciliationStage, StageTrail,
    UpsertOperation,
};
pub use reconciliation_service::{
    ReconciliationResult, ReconciliationService, ReconciliationSettings,
};
pub use signature_ports::SignatureVerifier;
