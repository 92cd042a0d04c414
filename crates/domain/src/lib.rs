//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod configuration_item;
mod event;
mod transform;
mod validation;

pub use configuration_item::{CiStatus, ConfigurationItem, ConfigurationItemInput};
pub use event::{
    ASSET_TAG_MAX_LENGTH, ASSET_TAG_RESERVED_CHARACTER, AssetTag, EventAction, InfrastructureEvent, RawInfrastructureEvent,
};
pub use transform::{CiTransformer, DEFAULT_DISCOVERY_SOURCE, UNKNOWN_ENVIRONMENT};
pub use validation::{FieldIssue, FieldProblem, ValidationReport, validate_event};
