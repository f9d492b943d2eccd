//! Harvest to CSV, end to end

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use sports_data_harvester::downloader::{HarvestRequest, SeasonSelection};
use sports_data_harvester::output::{CsvExporter, COLUMNS};
use sports_data_harvester::store::{EntityStore, MatchLocation};
use sports_data_harvester::DetailCategory;

use crate::support::*;

fn read_rows(path: &std::path::Path) -> Vec<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    reader
        .records()
        .map(|r| {
            let record = r.unwrap();
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

fn possession_only() -> serde_json::Value {
    json!({"statistics": [{"period": "ALL", "groups": [
        {"groupName": "Possession", "statisticsItems": [
            {"name": "Ball possession", "home": "65%", "away": "35%", "homeValue": 65, "awayValue": 35, "key": "ballPossession"}
        ]}
    ]}]})
}

#[tokio::test]
async fn test_harvest_then_export_league() {
    let temp_dir = TempDir::new().unwrap();
    let mock = Arc::new(
        MockTransport::new()
            .ok(seasons_path(17), seasons_body(&[(61627, "24/25")]))
            .ok(round_path(17, 61627, 1), round_body(&[1, 2], "finished"))
            .ok(event_path(1, ""), basic_body(1, 17, 61627))
            .ok(event_path(2, ""), basic_body(2, 17, 61627))
            .ok(event_path(2, "/statistics"), possession_only()),
    );
    let harvester = harvester(&mock, temp_dir.path());
    let summary = harvester
        .harvest(&HarvestRequest::new(vec![17]).with_seasons(SeasonSelection::All))
        .await;
    // Categories without a scripted reply answer 404 and fail individually.
    assert_eq!(summary.details.stored, 3);
    assert_eq!(summary.details.failed, 9);

    let report = CsvExporter::new(harvester.store().clone())
        .export_league(17)
        .unwrap();
    let path = temp_dir.path().join("processed/league_17.csv");
    assert_eq!(report.paths(), vec![path.as_path()]);
    assert_eq!(report.rows_written(), 2);

    let rows = read_rows(&path);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].len(), COLUMNS.len());

    // Basic only: stats columns are null, not zero.
    assert_eq!(rows[0]["match_id"], "1");
    assert_eq!(rows[0]["home_team_name"], "Manchester United");
    assert_eq!(rows[0]["home_possession"], "");
    assert_eq!(rows[0]["h2h_home_wins"], "");

    // Possession present, corners absent.
    assert_eq!(rows[1]["match_id"], "2");
    assert_eq!(rows[1]["home_possession"], "65");
    assert_eq!(rows[1]["away_possession"], "35");
    assert_eq!(rows[1]["home_corners"], "");
    assert_eq!(rows[1]["away_corners"], "");
    assert_eq!(rows[1]["start_time"], "2024-08-16T19:00:00Z");
}

#[test]
fn test_export_is_deterministic() {
    let temp_dir = TempDir::new().unwrap();
    let store = EntityStore::new(temp_dir.path());
    for id in [3u64, 1, 2] {
        let location = MatchLocation::new(17, 61627, id);
        store
            .write(&location.key(DetailCategory::Basic), &basic_body(id, 17, 61627))
            .unwrap();
        store
            .write(&location.key(DetailCategory::Statistics), &possession_only())
            .unwrap();
    }
    let exporter = CsvExporter::new(store);

    exporter.export_all().unwrap();
    let first = std::fs::read(temp_dir.path().join("processed/all_leagues.csv")).unwrap();
    exporter.export_all().unwrap();
    let second = std::fs::read(temp_dir.path().join("processed/all_leagues.csv")).unwrap();

    assert_eq!(first, second);
    let ids: Vec<String> = read_rows(&temp_dir.path().join("processed/all_leagues.csv"))
        .into_iter()
        .map(|r| r["match_id"].clone())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[test]
fn test_match_listed_twice_is_written_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = EntityStore::new(temp_dir.path());
    // The same match stored under two leagues (e.g. a relisted cup tie).
    for (league, season) in [(17, 61627), (8, 52376)] {
        store
            .write(
                &MatchLocation::new(league, season, 42).key(DetailCategory::Basic),
                &basic_body(42, league, season),
            )
            .unwrap();
    }

    let report = CsvExporter::new(store).export_all().unwrap();
    let combined = report.files.last().unwrap();

    assert!(combined.path.ends_with("all_leagues.csv"));
    assert_eq!(combined.rows_written, 1);
    assert_eq!(combined.duplicates_skipped, 1);
    // League 8 sorts first, so its row wins.
    let rows = read_rows(&combined.path);
    assert_eq!(rows[0]["tournament_id"], "8");
}

#[test]
fn test_single_match_export_and_missing_basic() {
    let temp_dir = TempDir::new().unwrap();
    let store = EntityStore::new(temp_dir.path());
    store
        .write(&MatchLocation::new(17, 1, 5).key(DetailCategory::Basic), &basic_body(5, 17, 1))
        .unwrap();
    store
        .write(&MatchLocation::new(17, 1, 6).key(DetailCategory::Lineups), &json!({"confirmed": true}))
        .unwrap();
    let exporter = CsvExporter::new(store);

    let report = exporter.export_match(5).unwrap();
    assert_eq!(report.paths(), vec![temp_dir.path().join("processed/match_5.csv").as_path()]);

    let report = exporter.export_match(6).unwrap();
    assert!(report.files.is_empty());
    assert_eq!(report.missing_basic, vec![6]);
}
