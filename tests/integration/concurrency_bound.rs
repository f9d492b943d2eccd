//! Global in-flight cap across leagues, seasons, matches and categories

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use sports_data_harvester::downloader::{HarvestRequest, Harvester, SeasonSelection};
use sports_data_harvester::{DetailCategory, HarvestConfig};

use crate::support::*;

fn busy_league(mut mock: MockTransport, league: u64, season: u64, first_id: u64) -> MockTransport {
    let ids: Vec<u64> = (first_id..first_id + 6).collect();
    mock = mock
        .ok(seasons_path(league), seasons_body(&[(season, "24/25")]))
        .ok(round_path(league, season, 1), round_body(&ids, "finished"));
    for id in ids {
        for category in DetailCategory::ALL {
            let body = match category {
                DetailCategory::Basic => basic_body(id, league, season),
                _ => json!({}),
            };
            mock = mock.ok(event_path(id, category.endpoint_suffix()), body);
        }
    }
    mock
}

#[tokio::test]
async fn test_in_flight_never_exceeds_cap() {
    let temp_dir = TempDir::new().unwrap();
    let mock = busy_league(MockTransport::new(), 17, 1, 100);
    let mock = Arc::new(busy_league(mock, 8, 2, 200).with_latency(Duration::from_millis(15)));

    let config = HarvestConfig {
        max_concurrent: 3,
        ..test_config(temp_dir.path())
    };
    let harvester = Harvester::new(config, mock.clone()).unwrap();

    let summary = harvester
        .harvest(&HarvestRequest::new(vec![17, 8]).with_seasons(SeasonSelection::All))
        .await;

    assert!(summary.is_clean(), "unexpected failures: {:?}", summary.failed_items);
    assert_eq!(summary.details.stored, 2 * 6 * 6);

    let observed = mock.peak_in_flight();
    assert!(observed <= 3, "transport saw {observed} concurrent requests");
    assert!(harvester.client().limiter().peak_in_flight() <= 3);
    assert!(observed > 1, "work was never concurrent");
    assert_eq!(harvester.client().limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_cap_of_one_serializes_requests() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(
        busy_league(MockTransport::new(), 17, 1, 100).with_latency(Duration::from_millis(2)),
    );
    let config = HarvestConfig {
        max_concurrent: 1,
        ..test_config(temp_dir.path())
    };

    let summary = Harvester::new(config, mock.clone())
        .unwrap()
        .harvest(&HarvestRequest::new(vec![17]))
        .await;

    assert_eq!(summary.details.stored, 36);
    assert_eq!(mock.peak_in_flight(), 1);
}
