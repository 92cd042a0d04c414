//! REST table adapter for the CMDB client port.

use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use cisync_application::{CmdbClient, StoredConfigurationItem};
use cisync_core::{AppError, AppResult};
use cisync_domain::{AssetTag, ConfigurationItem};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use url::Url;

mod record;

use record::{CmdbRecord, CmdbRecordBody, CmdbResultEnvelope};

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Credentials attached to every CMDB request.
#[derive(Clone, PartialEq, Eq)]
pub enum CmdbAuth {
    /// HTTP basic authentication.
    Basic {
        /// Integration user name.
        username: String,
        /// Integration user password.
        password: String,
    },
    /// OAuth access token sent as a bearer token.
    Bearer {
        /// Access token.
        token: String,
    },
}

impl Debug for CmdbAuth {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => formatter
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => formatter
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Connection settings for [`HttpCmdbClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCmdbClientConfig {
    /// CMDB instance base URL, for example `https://acme.service-now.com`.
    pub instance_url: String,
    /// Configuration item table name.
    pub table: String,
    /// Request credentials.
    pub auth: CmdbAuth,
}

/// CMDB client speaking the REST table API with a `{"result": ...}` envelope.
///
/// Request timeouts are configured on the injected `reqwest::Client`.
pub struct HttpCmdbClient {
    http_client: reqwest::Client,
    table_url: Url,
    auth: CmdbAuth,
}

impl HttpCmdbClient {
    /// Creates a client for one CMDB table.
    pub fn new(http_client: reqwest::Client, config: HttpCmdbClientConfig) -> AppResult<Self> {
        let table = config.table.trim();
        if table.is_empty() || table.contains('/') {
            return Err(AppError::Validation(format!(
                "cmdb table name '{}' is invalid",
                config.table
            )));
        }

        let mut table_url = Url::parse(config.instance_url.trim()).map_err(|error| {
            AppError::Validation(format!(
                "cmdb instance url '{}' is invalid: {error}",
                config.instance_url
            ))
        })?;
        table_url
            .path_segments_mut()
            .map_err(|()| {
                AppError::Validation(format!(
                    "cmdb instance url '{}' cannot be a base url",
                    config.instance_url
                ))
            })?
            .pop_if_empty()
            .extend(["api", "now", "table", table]);

        Ok(Self {
            http_client,
            table_url,
            auth: config.auth,
        })
    }

    fn lookup_url(&self, asset_tag: &AssetTag) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut()
            .append_pair("sysparm_query", format!("asset_tag={asset_tag}").as_str())
            .append_pair("sysparm_limit", "2");
        url
    }

    fn record_url(&self, record_id: &str) -> AppResult<Url> {
        let mut url = self.table_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::Internal("cmdb table url cannot be a base url".to_owned()))?
            .push(record_id);
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(ACCEPT, "application/json");
        match &self.auth {
            CmdbAuth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            CmdbAuth::Bearer { token } => builder.bearer_auth(token),
        }
    }

    async fn send<T>(&self, operation: &str, builder: reqwest::RequestBuilder) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.authorize(builder).send().await.map_err(|error| {
            let reason = if error.is_timeout() {
                "timed out"
            } else {
                "transport error"
            };
            AppError::CmdbUnavailable(format!("cmdb {operation} {reason}: {error}"))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|error| {
            AppError::CmdbUnavailable(format!("cmdb {operation} body read failed: {error}"))
        })?;

        if !status.is_success() {
            return Err(classify_failure(operation, status, &body));
        }

        decode_result(operation, &body)
    }
}

fn classify_failure(operation: &str, status: StatusCode, body: &[u8]) -> AppError {
    let body: String = String::from_utf8_lossy(body)
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();

    if is_transient_status(status) {
        AppError::CmdbUnavailable(format!(
            "cmdb {operation} returned transient status {status}: {body}"
        ))
    } else {
        AppError::CmdbConflict(format!(
            "cmdb {operation} returned unexpected status {status}: {body}"
        ))
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(
            status,
            StatusCode::UNAUTHORIZED
                | StatusCode::FORBIDDEN
                | StatusCode::REQUEST_TIMEOUT
                | StatusCode::TOO_MANY_REQUESTS
        )
}

fn decode_result<T>(operation: &str, body: &[u8]) -> AppResult<T>
where
    T: DeserializeOwned,
{
    let envelope: CmdbResultEnvelope<T> = serde_json::from_slice(body).map_err(|error| {
        AppError::CmdbConflict(format!("cmdb {operation} returned undecodable body: {error}"))
    })?;

    envelope.result.ok_or_else(|| {
        AppError::CmdbConflict(format!("cmdb {operation} response is missing 'result'"))
    })
}

fn ensure_asset_tag(
    operation: &str,
    expected: &AssetTag,
    stored: StoredConfigurationItem,
) -> AppResult<StoredConfigurationItem> {
    if stored.item.asset_tag() != expected {
        return Err(AppError::CmdbConflict(format!(
            "cmdb {operation} for asset tag '{expected}' returned record '{}' with asset tag '{}'",
            stored.record_id,
            stored.item.asset_tag()
        )));
    }

    Ok(stored)
}

#[async_trait]
impl CmdbClient for HttpCmdbClient {
    async fn find(&self, asset_tag: &AssetTag) -> AppResult<Option<StoredConfigurationItem>> {
        let records: Vec<CmdbRecord> = self
            .send("find", self.http_client.get(self.lookup_url(asset_tag)))
            .await?;

        if records.len() > 1 {
            return Err(AppError::CmdbConflict(format!(
                "cmdb holds {} records for asset tag '{asset_tag}'",
                records.len()
            )));
        }

        records
            .into_iter()
            .next()
            .map(|record| {
                let stored = record.into_stored("find")?;
                ensure_asset_tag("find", asset_tag, stored)
            })
            .transpose()
    }

    async fn create(&self, item: ConfigurationItem) -> AppResult<StoredConfigurationItem> {
        let record: CmdbRecord = self
            .send(
                "create",
                self.http_client
                    .post(self.table_url.clone())
                    .json(&CmdbRecordBody::from_item(&item)),
            )
            .await?;

        ensure_asset_tag("create", item.asset_tag(), record.into_stored("create")?)
    }

    async fn update(
        &self,
        existing: &StoredConfigurationItem,
        item: ConfigurationItem,
    ) -> AppResult<StoredConfigurationItem> {
        let url = self.record_url(existing.record_id.as_str())?;
        let record: CmdbRecord = self
            .send(
                "update",
                self.http_client
                    .patch(url)
                    .json(&CmdbRecordBody::from_item(&item)),
            )
            .await?;

        ensure_asset_tag("update", item.asset_tag(), record.into_stored("update")?)
    }
}

#[cfg(test)]
mod tests;
