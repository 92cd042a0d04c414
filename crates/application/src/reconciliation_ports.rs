mod failures;
mod lock;
mod outcome;
mod stage;

pub use failures::{FailureListQuery, ReconciliationFailure, ReconciliationFailureRepository};
pub use lock::{AssetLease, AssetLockCoordinator};
pub use outcome::{ReconciliationOutcome, UpsertOperation};
pub use stage::{ReconciliationStage, StageTrail};
