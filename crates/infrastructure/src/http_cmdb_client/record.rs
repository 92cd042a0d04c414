use chrono::{DateTime, NaiveDateTime, Utc};
use cisync_application::StoredConfigurationItem;
use cisync_core::{AppError, AppResult};
use cisync_domain::{CiStatus, ConfigurationItem, ConfigurationItemInput, UNKNOWN_ENVIRONMENT};
use serde::{Deserialize, Serialize};

/// Table API timestamp layout, always UTC.
const CMDB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
pub(super) struct CmdbResultEnvelope<T> {
    pub(super) result: Option<T>,
}

#[derive(Debug, Serialize)]
pub(super) struct CmdbRecordBody<'a> {
    asset_tag: &'a str,
    name: &'a str,
    sys_class_name: &'a str,
    environment: &'a str,
    install_status: &'static str,
    discovery_source: &'a str,
    last_discovered: String,
}

impl<'a> CmdbRecordBody<'a> {
    pub(super) fn from_item(item: &'a ConfigurationItem) -> Self {
        Self {
            asset_tag: item.asset_tag().as_str(),
            name: item.name(),
            sys_class_name: item.classification(),
            environment: item.environment(),
            install_status: item.status().as_str(),
            discovery_source: item.discovery_source(),
            last_discovered: item
                .last_discovered()
                .format(CMDB_TIMESTAMP_FORMAT)
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CmdbRecord {
    sys_id: String,
    asset_tag: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    sys_class_name: String,
    #[serde(default)]
    environment: String,
    #[serde(default)]
    install_status: String,
    #[serde(default)]
    discovery_source: String,
    #[serde(default)]
    last_discovered: String,
}

impl CmdbRecord {
    pub(super) fn into_stored(self, operation: &str) -> AppResult<StoredConfigurationItem> {
        if self.sys_id.trim().is_empty() {
            return Err(AppError::CmdbConflict(format!(
                "cmdb {operation} returned a record without sys_id"
            )));
        }

        let item = ConfigurationItem::new(ConfigurationItemInput {
            asset_tag: self.asset_tag,
            name: self.name,
            classification: self.sys_class_name,
            environment: or_unknown(self.environment),
            // Statuses written by other tools are kept visible as Unknown.
            status: CiStatus::parse(self.install_status.trim()).unwrap_or(CiStatus::Unknown),
            discovery_source: or_unknown(self.discovery_source),
            last_discovered: parse_timestamp(self.last_discovered.as_str()),
        })
        .map_err(|error| {
            AppError::CmdbConflict(format!(
                "cmdb {operation} returned record '{}' that is not a valid configuration item: {}",
                self.sys_id,
                error.detail()
            ))
        })?;

        Ok(StoredConfigurationItem {
            record_id: self.sys_id,
            item,
        })
    }
}

fn or_unknown(value: String) -> String {
    if value.trim().is_empty() {
        UNKNOWN_ENVIRONMENT.to_owned()
    } else {
        value
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, CMDB_TIMESTAMP_FORMAT)
        .map(|timestamp| timestamp.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|timestamp| timestamp.to_utc()))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
