use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode as AxumStatus};
use axum::routing::{get, patch};
use chrono::{TimeZone, Utc};
use cisync_application::CmdbClient;
use cisync_core::{AppError, ErrorKind};
use cisync_domain::{AssetTag, CiStatus, ConfigurationItem, ConfigurationItemInput};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::{
    CmdbAuth, HttpCmdbClient, HttpCmdbClientConfig, classify_failure, decode_result,
};
use super::record::CmdbRecord;

fn config(instance_url: &str) -> HttpCmdbClientConfig {
    HttpCmdbClientConfig {
        instance_url: instance_url.to_owned(),
        table: "cmdb_ci".to_owned(),
        auth: CmdbAuth::Basic {
            username: "integration".to_owned(),
            password: "secret".to_owned(),
        },
    }
}

fn item(asset_tag: &str, status: CiStatus) -> ConfigurationItem {
    let item = ConfigurationItem::new(ConfigurationItemInput {
        asset_tag: asset_tag.to_owned(),
        name: "web-1".to_owned(),
        classification: "aws_instance".to_owned(),
        environment: "prod".to_owned(),
        status,
        discovery_source: "cisync".to_owned(),
        last_discovered: Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 30, 0)
            .single()
            .unwrap_or_else(|| unreachable!()),
    });
    assert!(item.is_ok());
    item.unwrap_or_else(|_| unreachable!())
}

#[test]
fn builds_table_and_record_urls() {
    let client = HttpCmdbClient::new(reqwest::Client::new(), config("https://acme.example.com/"));
    assert!(client.is_ok());
    let client = client.unwrap_or_else(|_| unreachable!());

    let asset_tag = AssetTag::new("i-0abc").unwrap_or_else(|_| unreachable!());
    assert_eq!(
        client.lookup_url(&asset_tag).as_str(),
        "https://acme.example.com/api/now/table/cmdb_ci?sysparm_query=asset_tag%3Di-0abc&sysparm_limit=2"
    );
    assert_eq!(
        client.record_url("abc123").map(|url| url.to_string()).ok(),
        Some("https://acme.example.com/api/now/table/cmdb_ci/abc123".to_owned())
    );
}

#[test]
fn rejects_invalid_instance_url_and_table() {
    assert!(HttpCmdbClient::new(reqwest::Client::new(), config("not a url")).is_err());

    let mut bad_table = config("https://acme.example.com");
    bad_table.table = "cmdb/ci".to_owned();
    assert!(HttpCmdbClient::new(reqwest::Client::new(), bad_table).is_err());
}

#[test]
fn classifies_status_codes() {
    for status in [
        StatusCode::UNAUTHORIZED,
        StatusCode::FORBIDDEN,
        StatusCode::REQUEST_TIMEOUT,
        StatusCode::TOO_MANY_REQUESTS,
        StatusCode::BAD_GATEWAY,
        StatusCode::SERVICE_UNAVAILABLE,
    ] {
        assert_eq!(
            classify_failure("find", status, b"busy").kind(),
            ErrorKind::CmdbUnavailable,
            "{status}"
        );
    }

    for status in [
        StatusCode::BAD_REQUEST,
        StatusCode::NOT_FOUND,
        StatusCode::CONFLICT,
    ] {
        assert_eq!(
            classify_failure("find", status, b"nope").kind(),
            ErrorKind::CmdbConflict,
            "{status}"
        );
    }
}

#[test]
fn undecodable_or_missing_result_is_a_conflict() {
    let garbage = decode_result::<Vec<CmdbRecord>>("find", b"<html>");
    assert!(matches!(garbage, Err(AppError::CmdbConflict(_))));

    let missing = decode_result::<Vec<CmdbRecord>>("find", br#"{"error":"x"}"#);
    assert!(
        missing.is_err_and(|error| error.to_string().contains("missing 'result'"))
    );
}

#[test]
fn maps_record_with_foreign_status_and_blank_fields() {
    let record: Result<CmdbRecord, _> = serde_json::from_value(json!({
        "sys_id": "abc123",
        "asset_tag": "i-0abc",
        "name": "web-1",
        "sys_class_name": "cmdb_ci_server",
        "environment": "",
        "install_status": "7",
        "last_discovered": "2026-03-01 12:30:00"
    }));
    assert!(record.is_ok());

    let stored = record
        .unwrap_or_else(|_| unreachable!())
        .into_stored("find");
    assert!(stored.is_ok());
    let stored = stored.unwrap_or_else(|_| unreachable!());

    assert_eq!(stored.record_id, "abc123");
    assert_eq!(stored.item.status(), CiStatus::Unknown);
    assert_eq!(stored.item.environment(), "unknown");
    assert_eq!(
        stored.item.last_discovered(),
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0)
            .single()
            .unwrap_or_else(|| unreachable!())
    );
}

#[test]
fn auth_debug_output_is_redacted() {
    let rendered = format!(
        "{:?}",
        CmdbAuth::Bearer {
            token: "top-secret".to_owned()
        }
    );
    assert!(!rendered.contains("top-secret"));
}

#[derive(Default)]
struct FakeTable {
    rows: Mutex<Vec<Value>>,
    seen_authorization: Mutex<Vec<String>>,
    forced_status: Mutex<Option<AxumStatus>>,
}

async fn list_rows(
    State(table): State<Arc<FakeTable>>,
    headers: HeaderMap,
    Query(query): Query<std::collections::HashMap<String, String>>,
) -> (AxumStatus, Json<Value>) {
    if let Some(value) = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
    {
        table.seen_authorization.lock().await.push(value.to_owned());
    }
    if let Some(status) = *table.forced_status.lock().await {
        return (status, Json(json!({"error": "forced"})));
    }

    let wanted = query
        .get("sysparm_query")
        .and_then(|query| query.strip_prefix("asset_tag="))
        .unwrap_or_default()
        .to_owned();
    let rows: Vec<Value> = table
        .rows
        .lock()
        .await
        .iter()
        .filter(|row| row["asset_tag"] == wanted.as_str())
        .cloned()
        .collect();

    (AxumStatus::OK, Json(json!({ "result": rows })))
}

async fn insert_row(
    State(table): State<Arc<FakeTable>>,
    Json(mut body): Json<Value>,
) -> (AxumStatus, Json<Value>) {
    let mut rows = table.rows.lock().await;
    body["sys_id"] = json!(format!("sys-{}", rows.len() + 1));
    rows.push(body.clone());
    (AxumStatus::CREATED, Json(json!({ "result": body })))
}

async fn patch_row(
    State(table): State<Arc<FakeTable>>,
    Path(record_id): Path<String>,
    Json(body): Json<Value>,
) -> (AxumStatus, Json<Value>) {
    let mut rows = table.rows.lock().await;
    let Some(row) = rows.iter_mut().find(|row| row["sys_id"] == record_id.as_str()) else {
        return (AxumStatus::NOT_FOUND, Json(json!({"error": "no row"})));
    };

    if let (Some(row_fields), Some(updates)) = (row.as_object_mut(), body.as_object()) {
        for (key, value) in updates {
            row_fields.insert(key.clone(), value.clone());
        }
    }

    (AxumStatus::OK, Json(json!({ "result": row.clone() })))
}

async fn spawn_table(table: Arc<FakeTable>) -> String {
    let router = Router::new()
        .route("/api/now/table/cmdb_ci", get(list_rows).post(insert_row))
        .route("/api/now/table/cmdb_ci/{record_id}", patch(patch_row))
        .with_state(table);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await;
    assert!(listener.is_ok());
    let listener = listener.unwrap_or_else(|_| unreachable!());
    let address = listener.local_addr().unwrap_or_else(|_| unreachable!());

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    format!("http://{address}")
}

fn client_for(base_url: &str) -> HttpCmdbClient {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| unreachable!());
    HttpCmdbClient::new(http_client, config(base_url)).unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn find_create_update_round_trip_against_table_api() {
    let table = Arc::new(FakeTable::default());
    let client = client_for(spawn_table(table.clone()).await.as_str());
    let asset_tag = AssetTag::new("i-0abc").unwrap_or_else(|_| unreachable!());

    let missing = client.find(&asset_tag).await;
    assert!(matches!(missing, Ok(None)));

    let created = client.create(item("i-0abc", CiStatus::Installed)).await;
    assert!(created.is_ok());
    let created = created.unwrap_or_else(|_| unreachable!());
    assert_eq!(created.record_id, "sys-1");

    let found = client.find(&asset_tag).await;
    assert!(matches!(&found, Ok(Some(stored)) if stored.record_id == "sys-1"));
    let found = found
        .ok()
        .flatten()
        .unwrap_or_else(|| unreachable!());

    let updated = client
        .update(&found, item("i-0abc", CiStatus::Retired))
        .await;
    assert!(updated.is_ok());
    let updated = updated.unwrap_or_else(|_| unreachable!());
    assert_eq!(updated.record_id, "sys-1");
    assert_eq!(updated.item.status(), CiStatus::Retired);

    assert_eq!(table.rows.lock().await.len(), 1);
    assert!(
        table
            .seen_authorization
            .lock()
            .await
            .iter()
            .all(|value| value.starts_with("Basic "))
    );
}

#[tokio::test]
async fn duplicate_rows_for_asset_tag_are_a_conflict() {
    let table = Arc::new(FakeTable::default());
    table.rows.lock().await.extend([
        json!({"sys_id": "a", "asset_tag": "i-dup", "name": "x", "sys_class_name": "c"}),
        json!({"sys_id": "b", "asset_tag": "i-dup", "name": "y", "sys_class_name": "c"}),
    ]);
    let client = client_for(spawn_table(table).await.as_str());

    let result = client
        .find(&AssetTag::new("i-dup").unwrap_or_else(|_| unreachable!()))
        .await;
    assert!(result.is_err_and(|error| error.kind() == ErrorKind::CmdbConflict));
}

#[tokio::test]
async fn overloaded_table_api_is_retryable() {
    let table = Arc::new(FakeTable::default());
    *table.forced_status.lock().await = Some(AxumStatus::SERVICE_UNAVAILABLE);
    let client = client_for(spawn_table(table).await.as_str());

    let result = client
        .find(&AssetTag::new("i-0abc").unwrap_or_else(|_| unreachable!()))
        .await;
    assert!(result.is_err_and(|error| error.is_retryable()));
}

#[tokio::test]
async fn unreachable_cmdb_is_retryable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await;
    let address = listener
        .and_then(|listener| listener.local_addr())
        .unwrap_or_else(|_| unreachable!());
    let client = client_for(format!("http://{address}").as_str());

    let result = client
        .find(&AssetTag::new("i-0abc").unwrap_or_else(|_| unreachable!()))
        .await;
    assert!(result.is_err_and(|error| error.kind() == ErrorKind::CmdbUnavailable));
}
