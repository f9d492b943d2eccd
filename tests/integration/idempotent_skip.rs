//! Skip-if-exists and force refresh

use std::sync::Arc;
use tempfile::TempDir;

use sports_data_harvester::downloader::{HarvestRequest, ItemStatus, SeasonSelection};
use sports_data_harvester::store::{MatchLocation, StoreKey};
use sports_data_harvester::DetailCategory;

use crate::support::*;

#[tokio::test]
async fn test_two_fetches_without_force_make_one_call() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(with_basic_only(MockTransport::new(), 12436870, 17, 61627));
    let harvester = harvester(&mock, temp_dir.path());

    let first = harvester
        .fetch_match_detail(12436870, DetailCategory::Basic)
        .await
        .unwrap();
    let second = harvester
        .fetch_match_detail(12436870, DetailCategory::Basic)
        .await
        .unwrap();

    assert_eq!(first, ItemStatus::Stored);
    assert_eq!(second, ItemStatus::Skipped);
    assert_eq!(mock.calls().len(), 1);
    assert!(harvester.store().exists(&StoreKey::Detail {
        location: MatchLocation::new(17, 61627, 12436870),
        category: DetailCategory::Basic,
    }));
}

#[tokio::test]
async fn test_skip_of_existing_document_issues_zero_calls() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(MockTransport::new());
    let harvester = harvester(&mock, temp_dir.path());
    let location = MatchLocation::new(17, 61627, 55);
    harvester
        .store()
        .write(&location.key(DetailCategory::H2H), &serde_json::json!({"teamDuel": {}}))
        .unwrap();

    let status = harvester
        .fetch_detail_at(location, DetailCategory::H2H)
        .await
        .unwrap();

    assert_eq!(status, ItemStatus::Skipped);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_force_refetches_stored_document() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(with_basic_only(MockTransport::new(), 7, 17, 61627));
    let location = MatchLocation::new(17, 61627, 7);

    let cached = harvester(&mock, temp_dir.path());
    cached.fetch_detail_at(location, DetailCategory::Basic).await.unwrap();

    let forced = harvester(&mock, temp_dir.path()).with_force(true);
    let status = forced
        .fetch_detail_at(location, DetailCategory::Basic)
        .await
        .unwrap();

    assert_eq!(status, ItemStatus::Stored);
    assert_eq!(mock.calls_to(&event_path(7, "")), 2);
}

#[tokio::test]
async fn test_second_harvest_only_rerequests_the_end_of_each_season() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(
        MockTransport::new()
            .ok(seasons_path(17), seasons_body(&[(61627, "24/25")]))
            .ok(round_path(17, 61627, 1), round_body(&[101, 102], "finished"))
            .ok(event_path(101, ""), basic_body(101, 17, 61627))
            .ok(event_path(102, ""), basic_body(102, 17, 61627)),
    );
    let request = HarvestRequest::new(vec![17])
        .with_seasons(SeasonSelection::All)
        .with_categories(vec![DetailCategory::Basic]);

    let first = harvester(&mock, temp_dir.path()).harvest(&request).await;
    assert_eq!(first.details.stored, 2);
    let calls_after_first = mock.calls().len();

    let second = harvester(&mock, temp_dir.path()).harvest(&request).await;

    assert_eq!(second.seasons.skipped, 1);
    assert_eq!(second.rounds.skipped, 1);
    assert_eq!(second.details.skipped, 2);
    assert_eq!(second.details.stored, 0);
    // Only the terminating round is asked again; it was never stored.
    assert_eq!(
        mock.calls()[calls_after_first..].to_vec(),
        vec![round_path(17, 61627, 2)]
    );
}
