use chrono::{DateTime, Utc};
use cisync_core::{AppError, AppResult};

use crate::configuration_item::{CiStatus, ConfigurationItem, ConfigurationItemInput};
use crate::event::InfrastructureEvent;

/// Default value written into `discovery_source`.
pub const DEFAULT_DISCOVERY_SOURCE: &str = "cisync";

/// Environment label used when the event does not carry one.
pub const UNKNOWN_ENVIRONMENT: &str = "unknown";

/// Maps validated events into canonical configuration items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiTransformer {
    discovery_source: String,
}

impl CiTransformer {
    /// Creates a transformer that stamps the given discovery source.
    pub fn new(discovery_source: impl Into<String>) -> AppResult<Self> {
        let discovery_source = discovery_source.into().trim().to_owned();
        if discovery_source.is_empty() {
            return Err(AppError::Validation(
                "discovery source must not be empty".to_owned(),
            ));
        }

        Ok(Self { discovery_source })
    }

    /// Returns the discovery source stamped on every item.
    #[must_use]
    pub fn discovery_source(&self) -> &str {
        self.discovery_source.as_str()
    }

    /// Builds the configuration item for one event, seen at `processed_at`.
    pub fn transform(
        &self,
        event: &InfrastructureEvent,
        processed_at: DateTime<Utc>,
    ) -> AppResult<ConfigurationItem> {
        ConfigurationItem::new(ConfigurationItemInput {
            asset_tag: event.resource_id().to_owned(),
            name: event
                .resource_name()
                .unwrap_or_else(|| event.resource_id())
                .to_owned(),
            classification: event.resource_type().to_owned(),
            environment: event.environment().unwrap_or(UNKNOWN_ENVIRONMENT).to_owned(),
            status: CiStatus::from_action(event.action()),
            discovery_source: self.discovery_source.clone(),
            last_discovered: processed_at,
        })
        .map_err(|error| {
            AppError::Transform(format!(
                "event for resource '{}' did not map to a configuration item: {}",
                event.resource_id(),
                error.detail()
            ))
        })
    }
}

impl Default for CiTransformer {
    fn default() -> Self {
        Self {
            discovery_source: DEFAULT_DISCOVERY_SOURCE.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::CiTransformer;
    use crate::configuration_item::CiStatus;
    use crate::event::{InfrastructureEvent, RawInfrastructureEvent};

    fn event(action: &str, name: Option<&str>) -> InfrastructureEvent {
        let event = InfrastructureEvent::try_from_raw(RawInfrastructureEvent {
            resource_id: Some("i-0abc".to_owned()),
            resource_name: name.map(ToOwned::to_owned),
            resource_type: Some("aws_instance".to_owned()),
            environment: Some("prod".to_owned()),
            action: Some(action.to_owned()),
            ..RawInfrastructureEvent::default()
        });
        assert!(event.is_ok());
        event.unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn transform_builds_canonical_item() {
        let processed_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single();
        assert!(processed_at.is_some());
        let processed_at = processed_at.unwrap_or_default();

        let item = CiTransformer::default().transform(&event("create", Some("web-1")), processed_at);
        assert!(item.is_ok());
        let item = item.unwrap_or_else(|_| unreachable!());

        assert_eq!(item.asset_tag().as_str(), "i-0abc");
        assert_eq!(item.name(), "web-1");
        assert_eq!(item.classification(), "aws_instance");
        assert_eq!(item.environment(), "prod");
        assert_eq!(item.status(), CiStatus::Installed);
        assert_eq!(item.discovery_source(), "cisync");
        assert_eq!(item.last_discovered(), processed_at);
    }

    #[test]
    fn transform_falls_back_to_resource_id_for_name() {
        let item = CiTransformer::default().transform(&event("update", None), Utc::now());
        assert_eq!(item.map(|item| item.name().to_owned()).ok(), Some("i-0abc".to_owned()));
    }

    #[test]
    fn transform_is_deterministic() {
        let transformer = CiTransformer::new("terraform-cloud");
        assert!(transformer.is_ok());
        let transformer = transformer.unwrap_or_default();
        let processed_at = Utc::now();

        let first = transformer.transform(&event("delete", Some("db")), processed_at);
        let second = transformer.transform(&event("delete", Some("db")), processed_at);
        assert_eq!(first, second);
        assert_eq!(first.map(|item| item.status()).ok(), Some(CiStatus::Retired));
    }

    #[test]
    fn blank_discovery_source_is_rejected() {
        assert!(CiTransformer::new("   ").is_err());
    }

    proptest! {
        #[test]
        fn every_action_maps_to_exactly_one_status(action in "[a-zA-Z_-]{1,16}") {
            let item = CiTransformer::default().transform(&event(action.as_str(), None), Utc::now());
            prop_assert!(item.is_ok());
            let status = item.map(|item| item.status()).unwrap_or(CiStatus::Unknown);
            let expected = match action.to_ascii_lowercase().as_str() {
                "create" => CiStatus::Installed,
                "update" => CiStatus::InUse,
                "delete" => CiStatus::Retired,
                _ => CiStatus::Unknown,
            };
            prop_assert_eq!(status, expected);
        }
    }
}
