//! Per-match flattening
//!
//! Each [`DetailCategory`] has one pure extractor in [`EXTRACTORS`]. An
//! extractor reads named paths from its category's document and writes the
//! columns that category owns; a category without a document leaves its
//! columns null. Statistics are matched by item name or key, never by
//! position, because upstream reorders groups between matches.

use serde_json::Value;
use std::collections::BTreeMap;

use super::schema::{CellValue, Row};
use crate::store::{EntityStore, MatchLocation, StoreError};
use crate::DetailCategory;

/// Writes one category's columns into a row.
pub type Extractor = fn(&Value, &mut Row);

/// Dispatch table, in column order.
pub const EXTRACTORS: [(DetailCategory, Extractor); 6] = [
    (DetailCategory::Basic, extract_basic),
    (DetailCategory::Statistics, extract_statistics),
    (DetailCategory::TeamStreaks, extract_team_streaks),
    (DetailCategory::PregameForm, extract_pregame_form),
    (DetailCategory::H2H, extract_h2h),
    (DetailCategory::Lineups, extract_lineups),
];

/// Extractor of a category.
pub fn extractor_for(category: DetailCategory) -> Extractor {
    EXTRACTORS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, f)| *f)
        .unwrap_or(extract_nothing)
}

fn extract_nothing(_: &Value, _: &mut Row) {}

/// Flattening errors
#[derive(Debug, thiserror::Error)]
pub enum FlattenError {
    /// No Basic document; the match cannot be flattened
    #[error("match {0} has no basic document")]
    MissingBasic(u64),

    /// No documents stored for this match at all
    #[error("match {0} not found in store")]
    UnknownMatch(u64),

    /// Store read failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Documents available for one match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchDocuments {
    /// Match id
    pub match_id: u64,
    /// Stored documents by category
    pub documents: BTreeMap<DetailCategory, Value>,
}

impl MatchDocuments {
    /// Empty set for `match_id`.
    pub fn new(match_id: u64) -> Self {
        Self {
            match_id,
            documents: BTreeMap::new(),
        }
    }

    /// Add or replace a category document.
    pub fn with(mut self, category: DetailCategory, document: Value) -> Self {
        self.documents.insert(category, document);
        self
    }
}

/// Flatten a match's documents. Pure: identical input gives an identical row.
pub fn flatten_documents(docs: &MatchDocuments) -> Result<Row, FlattenError> {
    if !docs.documents.contains_key(&DetailCategory::Basic) {
        return Err(FlattenError::MissingBasic(docs.match_id));
    }

    let mut row = Row::empty();
    for (category, extract) in EXTRACTORS {
        if let Some(document) = docs.documents.get(&category) {
            extract(document, &mut row);
        }
    }
    // The store key is authoritative for identity.
    row.set_cell("match_id", CellValue::Integer(docs.match_id as i64));
    Ok(row)
}

/// Flattens matches straight from the store.
#[derive(Debug, Clone)]
pub struct Flattener {
    store: EntityStore,
}

impl Flattener {
    /// Flattener over `store`.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Flatten a match by id.
    pub fn flatten(&self, match_id: u64) -> Result<Row, FlattenError> {
        let location = self
            .store
            .locate_match(match_id)?
            .ok_or(FlattenError::UnknownMatch(match_id))?;
        self.flatten_at(&location)
    }

    /// Flatten a match at a known location.
    pub fn flatten_at(&self, location: &MatchLocation) -> Result<Row, FlattenError> {
        let documents = self.store.read_match(location)?;
        flatten_documents(&MatchDocuments {
            match_id: location.match_id,
            documents,
        })
    }
}

fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, segment| node.get(segment))
}

const BASIC_PATHS: &[(&str, &[&str])] = &[
    ("tournament_id", &["event", "tournament", "uniqueTournament", "id"]),
    ("tournament_name", &["event", "tournament", "uniqueTournament", "name"]),
    ("season_id", &["event", "season", "id"]),
    ("season_name", &["event", "season", "name"]),
    ("season_year", &["event", "season", "year"]),
    ("round", &["event", "roundInfo", "round"]),
    ("status", &["event", "status", "description"]),
    ("start_time", &["event", "startTimestamp"]),
    ("home_team_id", &["event", "homeTeam", "id"]),
    ("home_team_name", &["event", "homeTeam", "name"]),
    ("away_team_id", &["event", "awayTeam", "id"]),
    ("away_team_name", &["event", "awayTeam", "name"]),
    ("home_score_ht", &["event", "homeScore", "period1"]),
    ("away_score_ht", &["event", "awayScore", "period1"]),
    ("home_score_ft", &["event", "homeScore", "normaltime"]),
    ("away_score_ft", &["event", "awayScore", "normaltime"]),
    ("venue", &["event", "venue", "name"]),
    ("referee", &["event", "referee", "name"]),
];

fn extract_basic(doc: &Value, row: &mut Row) {
    for (column, path) in BASIC_PATHS {
        row.set(column, at(doc, path));
    }
}

/// A home/away statistic pair and the names it appears under.
struct StatColumns {
    home: &'static str,
    away: &'static str,
    names: &'static [&'static str],
    keys: &'static [&'static str],
}

const STAT_COLUMNS: &[StatColumns] = &[
    StatColumns {
        home: "home_possession",
        away: "away_possession",
        names: &["Ball possession", "Possession"],
        keys: &["ballPossession"],
    },
    StatColumns {
        home: "home_expected_goals",
        away: "away_expected_goals",
        names: &["Expected goals"],
        keys: &["expectedGoals"],
    },
    StatColumns {
        home: "home_total_shots",
        away: "away_total_shots",
        names: &["Total shots"],
        keys: &["totalShotsOnGoal"],
    },
    StatColumns {
        home: "home_shots_on_target",
        away: "away_shots_on_target",
        names: &["Shots on target"],
        keys: &["shotsOnGoal"],
    },
    StatColumns {
        home: "home_big_chances",
        away: "away_big_chances",
        names: &["Big chances"],
        keys: &["bigChanceCreated"],
    },
    StatColumns {
        home: "home_corners",
        away: "away_corners",
        names: &["Corner kicks", "Corners"],
        keys: &["cornerKicks"],
    },
    StatColumns {
        home: "home_fouls",
        away: "away_fouls",
        names: &["Fouls"],
        keys: &["fouls"],
    },
    StatColumns {
        home: "home_offsides",
        away: "away_offsides",
        names: &["Offsides"],
        keys: &["offsides"],
    },
    StatColumns {
        home: "home_yellow_cards",
        away: "away_yellow_cards",
        names: &["Yellow cards"],
        keys: &["yellowCards"],
    },
    StatColumns {
        home: "home_red_cards",
        away: "away_red_cards",
        names: &["Red cards"],
        keys: &["redCards"],
    },
    StatColumns {
        home: "home_goalkeeper_saves",
        away: "away_goalkeeper_saves",
        names: &["Goalkeeper saves"],
        keys: &["goalkeeperSaves"],
    },
    StatColumns {
        home: "home_passes",
        away: "away_passes",
        names: &["Passes"],
        keys: &["passes"],
    },
];

/// The whole-match period, or the only period when upstream omits labels.
fn overall_period(doc: &Value) -> Option<&Value> {
    let periods = doc.get("statistics")?.as_array()?;
    periods
        .iter()
        .find(|p| p.get("period").and_then(Value::as_str) == Some("ALL"))
        .or_else(|| match periods.as_slice() {
            [only] if only.get("period").is_none() => Some(only),
            _ => None,
        })
}

fn name_matches(candidate: Option<&Value>, wanted: &[&str]) -> bool {
    candidate
        .and_then(Value::as_str)
        .map(|s| wanted.iter().any(|w| w.eq_ignore_ascii_case(s.trim())))
        .unwrap_or(false)
}

fn find_stat<'a>(period: &'a Value, columns: &StatColumns) -> Option<&'a Value> {
    let groups = period.get("groups")?.as_array()?;
    let items_of = |group: &'a Value| {
        group
            .get("statisticsItems")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    };

    groups
        .iter()
        .flat_map(items_of)
        .find(|item| {
            name_matches(item.get("key"), columns.keys) || name_matches(item.get("name"), columns.names)
        })
        .or_else(|| {
            // A group named after the statistic holds it as its first item.
            groups
                .iter()
                .find(|g| name_matches(g.get("groupName"), columns.names))
                .and_then(|g| items_of(g).next())
        })
}

fn side_value<'a>(item: &'a Value, numeric: &str, display: &str) -> Option<&'a Value> {
    item.get(numeric).or_else(|| item.get(display))
}

fn extract_statistics(doc: &Value, row: &mut Row) {
    let Some(period) = overall_period(doc) else {
        return;
    };
    for columns in STAT_COLUMNS {
        if let Some(item) = find_stat(period, columns) {
            row.set(columns.home, side_value(item, "homeValue", "home"));
            row.set(columns.away, side_value(item, "awayValue", "away"));
        }
    }
}

fn extract_team_streaks(doc: &Value, row: &mut Row) {
    let Some(streaks) = doc.get("general").and_then(Value::as_array) else {
        return;
    };
    for (team, column) in [
        ("home", "home_streaks"),
        ("away", "away_streaks"),
        ("both", "shared_streaks"),
    ] {
        let joined: Vec<String> = streaks
            .iter()
            .filter(|s| s.get("team").and_then(Value::as_str) == Some(team))
            .filter_map(|s| {
                let name = s.get("name")?.as_str()?;
                let value = match s.get("value")? {
                    Value::String(v) => v.clone(),
                    other => other.to_string(),
                };
                Some(format!("{name}={value}"))
            })
            .collect();
        if !joined.is_empty() {
            row.set_cell(column, CellValue::Text(joined.join("|")));
        }
    }
}

fn extract_pregame_form(doc: &Value, row: &mut Row) {
    for (side, prefix) in [("homeTeam", "home"), ("awayTeam", "away")] {
        let Some(team) = doc.get(side) else {
            continue;
        };
        row.set(&format!("{prefix}_position"), team.get("position"));
        row.set(&format!("{prefix}_form_points"), team.get("value"));
        row.set(&format!("{prefix}_avg_rating"), team.get("avgRating"));

        let form: Vec<&str> = team
            .get("form")
            .and_then(Value::as_array)
            .map(|f| f.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if !form.is_empty() {
            row.set_cell(&format!("{prefix}_form"), CellValue::Text(form.join("_")));
        }
    }
}

fn extract_h2h(doc: &Value, row: &mut Row) {
    row.set("h2h_home_wins", at(doc, &["teamDuel", "homeWins"]));
    row.set("h2h_draws", at(doc, &["teamDuel", "draws"]));
    row.set("h2h_away_wins", at(doc, &["teamDuel", "awayWins"]));
    row.set("h2h_manager_home_wins", at(doc, &["managerDuel", "homeWins"]));
    row.set("h2h_manager_draws", at(doc, &["managerDuel", "draws"]));
    row.set("h2h_manager_away_wins", at(doc, &["managerDuel", "awayWins"]));
}

fn extract_lineups(doc: &Value, row: &mut Row) {
    row.set("lineups_confirmed", doc.get("confirmed"));
    for (side, prefix) in [("home", "home"), ("away", "away")] {
        let Some(team) = doc.get(side) else {
            continue;
        };
        row.set(&format!("{prefix}_formation"), team.get("formation"));

        let Some(players) = team.get("players").and_then(Value::as_array) else {
            continue;
        };
        let starters = players
            .iter()
            .filter(|p| !p.get("substitute").and_then(Value::as_bool).unwrap_or(false))
            .count();
        row.set_cell(&format!("{prefix}_starters"), CellValue::Integer(starters as i64));

        let ratings: Vec<f64> = players
            .iter()
            .filter_map(|p| at(p, &["statistics", "rating"]))
            .filter_map(|r| match r {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .filter(|r| r.is_finite())
            .collect();
        if !ratings.is_empty() {
            let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
            row.set_cell(
                &format!("{prefix}_avg_player_rating"),
                CellValue::Float((mean * 100.0).round() / 100.0),
            );
        }
    }
}
