//! Flattening rules observable through the public API

use serde_json::json;

use sports_data_harvester::output::{flatten_documents, CellValue, FlattenError, MatchDocuments};
use sports_data_harvester::DetailCategory;

use crate::support::basic_body;

const STAT_COLUMNS: &[&str] = &[
    "home_possession",
    "away_possession",
    "home_expected_goals",
    "home_total_shots",
    "home_corners",
    "away_corners",
    "home_passes",
];

#[test]
fn test_basic_only_match_has_null_stats() {
    let docs = MatchDocuments::new(1).with(DetailCategory::Basic, basic_body(1, 17, 61627));

    let row = flatten_documents(&docs).unwrap();

    assert_eq!(row.get("match_id"), Some(&CellValue::Integer(1)));
    for column in STAT_COLUMNS {
        assert_eq!(row.get(column), Some(&CellValue::Null), "{column} should be null");
    }
    assert_eq!(row.get("home_form"), Some(&CellValue::Null));
    assert_eq!(row.get("lineups_confirmed"), Some(&CellValue::Null));
}

#[test]
fn test_possession_without_corners() {
    let docs = MatchDocuments::new(2)
        .with(DetailCategory::Basic, basic_body(2, 17, 61627))
        .with(
            DetailCategory::Statistics,
            json!({"statistics": [{"period": "ALL", "groups": [
                {"groupName": "Possession", "statisticsItems": [
                    {"name": "Ball possession", "home": "65%", "away": "35%"}
                ]}
            ]}]}),
        );

    let row = flatten_documents(&docs).unwrap();

    assert_eq!(row.get("home_possession").unwrap().to_field(), "65");
    assert_eq!(row.get("away_possession").unwrap().to_field(), "35");
    assert_eq!(row.get("home_corners"), Some(&CellValue::Null));
    assert_eq!(row.get("away_corners"), Some(&CellValue::Null));
}

#[test]
fn test_flattening_is_deterministic() {
    let docs = MatchDocuments::new(3)
        .with(DetailCategory::Basic, basic_body(3, 17, 61627))
        .with(DetailCategory::H2H, json!({"teamDuel": {"homeWins": 4, "draws": 1, "awayWins": 2}}))
        .with(
            DetailCategory::PregameForm,
            json!({"homeTeam": {"form": ["W", "D"], "position": 1}, "awayTeam": {"position": 9}}),
        );

    let first = flatten_documents(&docs).unwrap();
    let second = flatten_documents(&docs.clone()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.to_record(), second.to_record());
}

#[test]
fn test_missing_basic_is_reported() {
    let docs = MatchDocuments::new(4).with(DetailCategory::Lineups, json!({"confirmed": false}));
    assert!(matches!(flatten_documents(&docs), Err(FlattenError::MissingBasic(4))));
}

#[test]
fn test_uncoercible_values_become_null() {
    let docs = MatchDocuments::new(5)
        .with(
            DetailCategory::Basic,
            json!({"event": {"homeScore": {"normaltime": "n/a"}, "startTimestamp": "soon"}}),
        )
        .with(
            DetailCategory::H2H,
            json!({"teamDuel": {"homeWins": [1], "draws": null, "awayWins": 2.5}}),
        );

    let row = flatten_documents(&docs).unwrap();

    assert_eq!(row.get("home_score_ft"), Some(&CellValue::Null));
    assert_eq!(row.get("start_time"), Some(&CellValue::Null));
    assert_eq!(row.get("h2h_home_wins"), Some(&CellValue::Null));
    assert_eq!(row.get("h2h_draws"), Some(&CellValue::Null));
    assert_eq!(row.get("h2h_away_wins"), Some(&CellValue::Null));
}
