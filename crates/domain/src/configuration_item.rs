use chrono::{DateTime, Utc};
use cisync_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::event::{AssetTag, EventAction};

/// CMDB lifecycle status of a configuration item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CiStatus {
    /// Resource was provisioned.
    Installed,
    /// Resource is live and has been changed since provisioning.
    InUse,
    /// Resource was destroyed. The record is kept for audit.
    Retired,
    /// Event carried an action outside the fixed table.
    Unknown,
}

impl CiStatus {
    /// Maps an event action through the fixed status table.
    #[must_use]
    pub fn from_action(action: &EventAction) -> Self {
        match action {
            EventAction::Create => Self::Installed,
            EventAction::Update => Self::InUse,
            EventAction::Delete => Self::Retired,
            EventAction::Unrecognized(_) => Self::Unknown,
        }
    }

    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "Installed",
            Self::InUse => "InUse",
            Self::Retired => "Retired",
            Self::Unknown => "Unknown",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "Installed" => Ok(Self::Installed),
            "InUse" => Ok(Self::InUse),
            "Retired" => Ok(Self::Retired),
            "Unknown" => Ok(Self::Unknown),
            _ => Err(AppError::Validation(format!("unknown CI status '{value}'"))),
        }
    }
}

/// Input payload used to construct a validated configuration item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationItemInput {
    /// Unique CMDB key.
    pub asset_tag: String,
    /// Display name.
    pub name: String,
    /// CMDB class of the resource.
    pub classification: String,
    /// Environment label.
    pub environment: String,
    /// Lifecycle status.
    pub status: CiStatus,
    /// Tool that reported the resource.
    pub discovery_source: String,
    /// Time the resource was last seen.
    pub last_discovered: DateTime<Utc>,
}

/// Canonical CMDB record for one infrastructure resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationItem {
    asset_tag: AssetTag,
    name: NonEmptyString,
    classification: NonEmptyString,
    environment: NonEmptyString,
    status: CiStatus,
    discovery_source: NonEmptyString,
    last_discovered: DateTime<Utc>,
}

impl ConfigurationItem {
    /// Creates a validated configuration item.
    pub fn new(input: ConfigurationItemInput) -> AppResult<Self> {
        let ConfigurationItemInput {
            asset_tag,
            name,
            classification,
            environment,
            status,
            discovery_source,
            last_discovered,
        } = input;

        Ok(Self {
            asset_tag: AssetTag::new(asset_tag)?,
            name: required("name", name)?,
            classification: required("classification", classification)?,
            environment: required("environment", environment)?,
            status,
            discovery_source: required("discovery_source", discovery_source)?,
            last_discovered,
        })
    }

    /// Returns the unique CMDB key.
    #[must_use]
    pub fn asset_tag(&self) -> &AssetTag {
        &self.asset_tag
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the CMDB class.
    #[must_use]
    pub fn classification(&self) -> &str {
        self.classification.as_str()
    }

    /// Returns the environment label.
    #[must_use]
    pub fn environment(&self) -> &str {
        self.environment.as_str()
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> CiStatus {
        self.status
    }

    /// Returns the reporting tool.
    #[must_use]
    pub fn discovery_source(&self) -> &str {
        self.discovery_source.as_str()
    }

    /// Returns the last time the resource was seen.
    #[must_use]
    pub fn last_discovered(&self) -> DateTime<Utc> {
        self.last_discovered
    }
}

fn required(field: &str, value: String) -> AppResult<NonEmptyString> {
    NonEmptyString::new(value.trim())
        .map_err(|_| AppError::Validation(format!("configuration item {field} must not be empty")))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{CiStatus, ConfigurationItem, ConfigurationItemInput};
    use crate::event::EventAction;

    #[test]
    fn status_table_matches_actions() {
        assert_eq!(CiStatus::from_action(&EventAction::Create), CiStatus::Installed);
        assert_eq!(CiStatus::from_action(&EventAction::Update), CiStatus::InUse);
        assert_eq!(CiStatus::from_action(&EventAction::Delete), CiStatus::Retired);
        assert_eq!(
            CiStatus::from_action(&EventAction::parse("unknown-action")),
            CiStatus::Unknown
        );
    }

    #[test]
    fn status_storage_value_parses_back() {
        for status in [
            CiStatus::Installed,
            CiStatus::InUse,
            CiStatus::Retired,
            CiStatus::Unknown,
        ] {
            assert_eq!(CiStatus::parse(status.as_str()).ok(), Some(status));
        }
        assert!(CiStatus::parse("installed").is_err());
    }

    #[test]
    fn configuration_item_requires_name() {
        let item = ConfigurationItem::new(ConfigurationItemInput {
            asset_tag: "i-1".to_owned(),
            name: " ".to_owned(),
            classification: "aws_instance".to_owned(),
            environment: "prod".to_owned(),
            status: CiStatus::Installed,
            discovery_source: "cisync".to_owned(),
            last_discovered: Utc::now(),
        });
        assert!(item.is_err());
    }
}
