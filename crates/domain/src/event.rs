use std::fmt::{Display, Formatter};

use cisync_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::validate_event;

/// Maximum asset tag width accepted by the CMDB column.
pub const ASSET_TAG_MAX_LENGTH: usize = 40;

/// Encoded-query separator of the CMDB table API; never part of an asset tag.
pub const ASSET_TAG_RESERVED_CHARACTER: char = '^';

/// Infrastructure change event as it arrives on the wire.
///
/// Every field is optional here so the validator can report all missing
/// fields at once. Unknown top-level fields and wrongly typed values are
/// rejected while decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawInfrastructureEvent {
    /// Provider resource identifier, becomes the asset tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Human readable resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    /// Provider resource type, for example `aws_instance`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Deployment environment label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Lifecycle action reported by the tooling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Owning organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Free-form tool metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl RawInfrastructureEvent {
    /// Decodes one event from a JSON body.
    pub fn from_json_slice(body: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(body)
            .map_err(|error| AppError::Validation(format!("malformed event payload: {error}")))
    }

    /// Decodes one event from an already parsed JSON value.
    pub fn from_value(value: Value) -> AppResult<Self> {
        serde_json::from_value(value)
            .map_err(|error| AppError::Validation(format!("malformed event payload: {error}")))
    }

    /// Returns the JSON form stored for replay.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Returns the trimmed resource identifier when one was sent.
    #[must_use]
    pub fn resource_id_hint(&self) -> Option<&str> {
        self.resource_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Lifecycle action carried by an infrastructure event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventAction {
    /// Resource was provisioned.
    Create,
    /// Resource was modified.
    Update,
    /// Resource was destroyed.
    Delete,
    /// Any other action string, kept verbatim.
    Unrecognized(String),
}

impl EventAction {
    /// Parses an action value. Matching ignores case and surrounding whitespace.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Unrecognized(trimmed.to_owned()),
        }
    }

    /// Returns the action value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Unrecognized(value) => value.as_str(),
        }
    }
}

impl Display for EventAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Validated infrastructure change event.
#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureEvent {
    resource_id: NonEmptyString,
    resource_name: Option<String>,
    resource_type: NonEmptyString,
    environment: Option<String>,
    action: EventAction,
    organization: Option<String>,
    metadata: Map<String, Value>,
}

impl InfrastructureEvent {
    /// Validates a raw event and rejects it when any required field is missing or invalid.
    pub fn try_from_raw(raw: RawInfrastructureEvent) -> AppResult<Self> {
        let report = validate_event(&raw);
        if !report.is_valid() {
            return Err(AppError::Validation(report.to_string()));
        }

        let RawInfrastructureEvent {
            resource_id,
            resource_name,
            resource_type,
            environment,
            action,
            organization,
            metadata,
        } = raw;

        Ok(Self {
            resource_id: NonEmptyString::new(resource_id.unwrap_or_default().trim())?,
            resource_name: non_blank(resource_name),
            resource_type: NonEmptyString::new(resource_type.unwrap_or_default().trim())?,
            environment: non_blank(environment),
            action: EventAction::parse(action.unwrap_or_default().as_str()),
            organization: non_blank(organization),
            metadata: metadata.unwrap_or_default(),
        })
    }

    /// Returns the resource identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.resource_id.as_str()
    }

    /// Returns the resource name, if one was sent.
    #[must_use]
    pub fn resource_name(&self) -> Option<&str> {
        self.resource_name.as_deref()
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.resource_type.as_str()
    }

    /// Returns the environment label, if one was sent.
    #[must_use]
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Returns the lifecycle action.
    #[must_use]
    pub fn action(&self) -> &EventAction {
        &self.action
    }

    /// Returns the owning organization, if one was sent.
    #[must_use]
    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    /// Returns the tool metadata.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim().to_owned();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

/// Unique CMDB key for one configuration item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AssetTag(String);

impl AssetTag {
    /// Creates a trimmed asset tag within the CMDB column width.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "asset tag must not be empty or whitespace".to_owned(),
            ));
        }

        if trimmed.chars().count() > ASSET_TAG_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "asset tag '{trimmed}' exceeds {ASSET_TAG_MAX_LENGTH} characters"
            )));
        }

        if trimmed.contains(ASSET_TAG_RESERVED_CHARACTER) {
            return Err(AppError::Validation(format!(
                "asset tag '{trimmed}' must not contain '{ASSET_TAG_RESERVED_CHARACTER}'"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the asset tag value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for AssetTag {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}
