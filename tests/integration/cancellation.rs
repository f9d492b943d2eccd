//! Cooperative cancellation of a running harvest

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use sports_data_harvester::downloader::{HarvestRequest, SeasonSelection};
use sports_data_harvester::fetcher::FetchErrorKind;
use sports_data_harvester::{CancellationToken, DetailCategory};

use crate::support::*;

fn slow_league() -> MockTransport {
    let ids: Vec<u64> = (1..=20).collect();
    let mut mock = MockTransport::new()
        .ok(seasons_path(17), seasons_body(&[(61627, "24/25")]))
        .ok(round_path(17, 61627, 1), round_body(&ids, "finished"));
    for id in ids {
        mock = mock.ok(event_path(id, ""), basic_body(id, 17, 61627));
        for category in &DetailCategory::ALL[1..] {
            mock = mock.ok(event_path(id, category.endpoint_suffix()), json!({}));
        }
    }
    mock.with_latency(Duration::from_millis(25))
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_calls() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(slow_league());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = harvester(&mock, temp_dir.path())
        .with_cancellation(cancel)
        .harvest(&HarvestRequest::new(vec![17]))
        .await;

    assert!(summary.cancelled);
    assert!(mock.calls().is_empty());
    assert!(summary.failed_items.is_empty());
}

#[tokio::test]
async fn test_cancel_mid_run_stops_promptly_without_failures() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(slow_league());
    let cancel = CancellationToken::new();
    let harvester = harvester(&mock, temp_dir.path()).with_cancellation(cancel.clone());

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            cancel.cancel();
        }
    });

    let request = HarvestRequest::new(vec![17]).with_seasons(SeasonSelection::All);
    let summary = tokio::time::timeout(Duration::from_secs(5), harvester.harvest(&request))
        .await
        .expect("harvest did not stop after cancellation");

    assert!(summary.cancelled);
    assert!(summary.failed_items.is_empty(), "{:?}", summary.failed_items);
    // 20 matches x 6 categories at 4 in flight and 25ms each cannot finish in 120ms.
    assert!(summary.details.stored < 120);
    assert_eq!(harvester.client().limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_cancel_interrupts_backoff_sleep() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new().on("/down", vec![Reply::Json(503, json!({}))]));
    let config = sports_data_harvester::HarvestConfig {
        max_retries: 5,
        backoff_base: Duration::from_secs(10),
        backoff_max: Duration::from_secs(10),
        ..test_config(temp_dir.path())
    };
    let cancel = CancellationToken::new();
    let client = sports_data_harvester::fetcher::RateLimitedClient::from_config(mock.clone(), &config)
        .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(5), client.fetch("/down", &[]))
        .await
        .expect("backoff sleep ignored cancellation")
        .unwrap_err();

    assert_eq!(err.kind, FetchErrorKind::Cancelled);
    assert_eq!(err.attempts, 1);
    assert_eq!(err.last_status, Some(503));
}
