//! Write failures: one unwritable document fails only itself

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use sports_data_harvester::downloader::{
    HarvestError, HarvestRequest, ItemStatus, Level, RoundOutcome, SeasonSelection,
};
use sports_data_harvester::store::MatchLocation;
use sports_data_harvester::DetailCategory;

use crate::support::*;

const LEAGUE: u64 = 17;
const SEASON: u64 = 5;

fn basic_only() -> HarvestRequest {
    HarvestRequest::new(vec![LEAGUE])
        .with_seasons(SeasonSelection::All)
        .with_categories(vec![DetailCategory::Basic])
}

fn three_round_season() -> MockTransport {
    let mut mock = MockTransport::new().ok(seasons_path(LEAGUE), seasons_body(&[(SEASON, "24/25")]));
    for (round, id) in [(1, 101), (2, 102), (3, 103)] {
        mock = mock
            .ok(round_path(LEAGUE, SEASON, round), round_body(&[id], "finished"))
            .ok(event_path(id, ""), basic_body(id, LEAGUE, SEASON));
    }
    mock
}

/// Occupy a document's path with a non-empty directory so renaming onto it fails.
fn block(root: &Path, document: &str) {
    let dir = root.join(document);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("blocker"), b"occupied").unwrap();
}

#[tokio::test]
async fn test_unwritable_round_still_schedules_its_matches() {
    let temp_dir = TempDir::new().unwrap();
    block(temp_dir.path(), &format!("matches/{LEAGUE}/{SEASON}/round_2.json"));
    let mock = Arc::new(three_round_season());

    let summary = harvester(&mock, temp_dir.path()).harvest(&basic_only()).await;

    assert_eq!(summary.rounds.stored, 2);
    assert_eq!(summary.rounds.failed, 1);
    assert_eq!(summary.details.stored, 3);
    assert_eq!(summary.total_failed(), 1);
    assert_eq!(summary.failed_items.len(), 1);
    let failed = &summary.failed_items[0];
    assert_eq!(failed.level, Level::Rounds);
    assert_eq!(failed.id, "league 17 season 5 round 2");
    assert!(failed.error.contains("storage failed"), "{}", failed.error);

    // Discovery went on past the failed write.
    assert_eq!(mock.calls_to(&round_path(LEAGUE, SEASON, 3)), 1);
    assert_eq!(mock.calls_to(&round_path(LEAGUE, SEASON, 4)), 1);
    assert_eq!(mock.calls_to(&event_path(102, "")), 1);
    assert!(temp_dir.path().join("match_details/17/5/102/basic.json").is_file());
}

#[tokio::test]
async fn test_unwritable_detail_fails_alone() {
    let temp_dir = TempDir::new().unwrap();
    block(temp_dir.path(), &format!("match_details/{LEAGUE}/{SEASON}/102/basic.json"));
    let mock = Arc::new(three_round_season());

    let summary = harvester(&mock, temp_dir.path()).harvest(&basic_only()).await;

    assert_eq!(summary.rounds.stored, 3);
    assert_eq!(summary.details.stored, 2);
    assert_eq!(summary.details.failed, 1);
    assert_eq!(summary.total_failed(), 1);
    assert_eq!(summary.failed_items[0].level, Level::Details);
    assert_eq!(summary.failed_items[0].id, "match 102 basic");
    assert_eq!(mock.calls_to(&round_path(LEAGUE, SEASON, 3)), 1);
    assert_eq!(mock.calls_to(&event_path(103, "")), 1);
}

#[tokio::test]
async fn test_unwritable_season_list_still_walks_seasons() {
    let temp_dir = TempDir::new().unwrap();
    block(temp_dir.path(), &format!("seasons/{LEAGUE}.json"));
    let mock = Arc::new(three_round_season());

    let summary = harvester(&mock, temp_dir.path()).harvest(&basic_only()).await;

    assert_eq!(summary.seasons.stored, 0);
    assert_eq!(summary.seasons.failed, 1);
    assert_eq!(summary.rounds.stored, 3);
    assert_eq!(summary.details.stored, 3);
    assert_eq!(summary.failed_items.len(), 1);
    assert_eq!(summary.failed_items[0].id, "league 17");
}

#[tokio::test]
async fn test_single_operations_report_failed_writes() {
    let temp_dir = TempDir::new().unwrap();
    block(temp_dir.path(), &format!("matches/{LEAGUE}/{SEASON}/round_2.json"));
    block(temp_dir.path(), &format!("seasons/{LEAGUE}.json"));
    block(temp_dir.path(), &format!("match_details/{LEAGUE}/{SEASON}/101/basic.json"));
    let mock = Arc::new(three_round_season());
    let harvester = harvester(&mock, temp_dir.path());

    let seasons = harvester.fetch_seasons(LEAGUE).await.unwrap();
    assert_eq!(seasons.status, ItemStatus::Failed);
    assert_eq!(seasons.value.len(), 1);
    assert!(seasons.store_error.is_some());

    match harvester.fetch_matches_for_round(LEAGUE, SEASON, 2).await.unwrap() {
        RoundOutcome::Unsaved { matches, error } => {
            assert_eq!(matches.iter().map(|m| m.id).collect::<Vec<_>>(), vec![102]);
            assert!(error.contains("storage failed"), "{error}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let detail = harvester
        .fetch_detail_at(MatchLocation::new(LEAGUE, SEASON, 101), DetailCategory::Basic)
        .await;
    assert!(matches!(detail, Err(HarvestError::Store(_))));
}
