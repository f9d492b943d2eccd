//! Retry budget and error classification of the rate-limited client

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use sports_data_harvester::downloader::HarvestError;
use sports_data_harvester::fetcher::{ErrorClass, FetchErrorKind, RateLimitedClient};
use sports_data_harvester::store::DIAGNOSTICS_DIR;
use sports_data_harvester::{DetailCategory, HarvestConfig};

use crate::support::*;

fn client(mock: &Arc<MockTransport>, config: &HarvestConfig) -> RateLimitedClient {
    RateLimitedClient::from_config(mock.clone(), config)
}

#[tokio::test]
async fn test_persistent_server_error_makes_r_plus_one_attempts() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new().on("/flaky", vec![Reply::Json(503, json!({}))]));
    let config = test_config(temp_dir.path());

    let err = client(&mock, &config).fetch("/flaky", &[]).await.unwrap_err();

    assert_eq!(err.kind, FetchErrorKind::Server);
    assert_eq!(err.attempts, config.max_retries + 1);
    assert_eq!(err.last_status, Some(503));
    assert_eq!(mock.calls_to("/flaky"), 3);
}

#[tokio::test]
async fn test_timeouts_are_retried_then_reported() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new().on("/slow", vec![Reply::Hang]));
    let config = HarvestConfig {
        request_timeout: Duration::from_millis(50),
        max_retries: 1,
        ..test_config(temp_dir.path())
    };

    let err = client(&mock, &config).fetch("/slow", &[]).await.unwrap_err();

    assert_eq!(err.kind, FetchErrorKind::Timeout);
    assert_eq!(err.class(), ErrorClass::Transient);
    assert_eq!(err.attempts, 2);
    assert_eq!(err.last_status, None);
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new().on(
        "/busy",
        vec![
            Reply::Json(429, json!({})),
            Reply::Connection,
            Reply::Json(200, json!({"ok": true})),
        ],
    ));

    let value = client(&mock, &test_config(temp_dir.path()))
        .fetch("/busy", &[])
        .await
        .unwrap();

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(mock.calls_to("/busy"), 3);
}

#[tokio::test]
async fn test_client_errors_fail_immediately() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(
        MockTransport::new()
            .on("/forbidden", vec![Reply::Json(403, json!({}))])
            .on("/garbage", vec![Reply::Raw(200, "<html>challenge</html>")]),
    );
    let client = client(&mock, &test_config(temp_dir.path()));

    let missing = client.fetch("/missing", &[]).await.unwrap_err();
    assert!(missing.is_not_found());
    assert_eq!(missing.attempts, 1);

    let forbidden = client.fetch("/forbidden", &[]).await.unwrap_err();
    assert_eq!(forbidden.kind, FetchErrorKind::Client);
    assert_eq!(forbidden.class(), ErrorClass::Permanent);
    assert_eq!(forbidden.attempts, 1);

    let garbage = client.fetch("/garbage", &[]).await.unwrap_err();
    assert_eq!(garbage.kind, FetchErrorKind::Parse);
    assert_eq!(garbage.attempts, 1);
    assert_eq!(garbage.raw_body.as_deref(), Some("<html>challenge</html>"));

    assert_eq!(mock.calls().len(), 3);
}

#[tokio::test]
async fn test_unparseable_payload_is_preserved_for_diagnosis() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new().on(event_path(9, ""), vec![Reply::Raw(200, "not json")]));
    let harvester = harvester(&mock, temp_dir.path());

    let err = harvester
        .fetch_match_detail(9, DetailCategory::Basic)
        .await
        .unwrap_err();

    match err {
        HarvestError::Fetch(e) => assert_eq!(e.kind, FetchErrorKind::Parse),
        other => panic!("expected a fetch error, got {other:?}"),
    }
    let preserved = harvester.store().list_keys("").unwrap();
    assert!(preserved.is_empty(), "no document may be stored: {preserved:?}");

    let raw = temp_dir
        .path()
        .join(DIAGNOSTICS_DIR)
        .join("match_details/0/0/9/basic.raw");
    assert_eq!(std::fs::read_to_string(raw).unwrap(), "not json");
}
