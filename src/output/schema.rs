//! Fixed row schema and value coercion
//!
//! The column list below is the CSV header, in order. Each column declares
//! its type and the category whose document feeds it; a column whose source
//! document is absent stays null.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::DetailCategory;
use crate::DetailCategory::{Basic, H2H, Lineups, PregameForm, Statistics, TeamStreaks};

/// Declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// UTF-8 text
    Text,
    /// Signed integer
    Integer,
    /// Floating point, rendered with `.` decimals
    Float,
    /// Unix seconds rendered as RFC 3339 UTC
    Timestamp,
}

/// One column of the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Header name
    pub name: &'static str,
    /// Declared type
    pub ty: ColumnType,
    /// Category whose document feeds the column
    pub source: DetailCategory,
}

const fn col(name: &'static str, ty: ColumnType, source: DetailCategory) -> Column {
    Column { name, ty, source }
}

use ColumnType::{Float, Integer, Text, Timestamp};

/// The flattened schema, in output order.
pub const COLUMNS: &[Column] = &[
    col("match_id", Integer, Basic),
    col("tournament_id", Integer, Basic),
    col("tournament_name", Text, Basic),
    col("season_id", Integer, Basic),
    col("season_name", Text, Basic),
    col("season_year", Text, Basic),
    col("round", Integer, Basic),
    col("status", Text, Basic),
    col("start_time", Timestamp, Basic),
    col("home_team_id", Integer, Basic),
    col("home_team_name", Text, Basic),
    col("away_team_id", Integer, Basic),
    col("away_team_name", Text, Basic),
    col("home_score_ht", Integer, Basic),
    col("away_score_ht", Integer, Basic),
    col("home_score_ft", Integer, Basic),
    col("away_score_ft", Integer, Basic),
    col("venue", Text, Basic),
    col("referee", Text, Basic),
    col("home_possession", Float, Statistics),
    col("away_possession", Float, Statistics),
    col("home_expected_goals", Float, Statistics),
    col("away_expected_goals", Float, Statistics),
    col("home_total_shots", Integer, Statistics),
    col("away_total_shots", Integer, Statistics),
    col("home_shots_on_target", Integer, Statistics),
    col("away_shots_on_target", Integer, Statistics),
    col("home_big_chances", Integer, Statistics),
    col("away_big_chances", Integer, Statistics),
    col("home_corners", Integer, Statistics),
    col("away_corners", Integer, Statistics),
    col("home_fouls", Integer, Statistics),
    col("away_fouls", Integer, Statistics),
    col("home_offsides", Integer, Statistics),
    col("away_offsides", Integer, Statistics),
    col("home_yellow_cards", Integer, Statistics),
    col("away_yellow_cards", Integer, Statistics),
    col("home_red_cards", Integer, Statistics),
    col("away_red_cards", Integer, Statistics),
    col("home_goalkeeper_saves", Integer, Statistics),
    col("away_goalkeeper_saves", Integer, Statistics),
    col("home_passes", Integer, Statistics),
    col("away_passes", Integer, Statistics),
    col("home_streaks", Text, TeamStreaks),
    col("away_streaks", Text, TeamStreaks),
    col("shared_streaks", Text, TeamStreaks),
    col("home_position", Integer, PregameForm),
    col("away_position", Integer, PregameForm),
    col("home_form_points", Integer, PregameForm),
    col("away_form_points", Integer, PregameForm),
    col("home_avg_rating", Float, PregameForm),
    col("away_avg_rating", Float, PregameForm),
    col("home_form", Text, PregameForm),
    col("away_form", Text, PregameForm),
    col("h2h_home_wins", Integer, H2H),
    col("h2h_draws", Integer, H2H),
    col("h2h_away_wins", Integer, H2H),
    col("h2h_manager_home_wins", Integer, H2H),
    col("h2h_manager_draws", Integer, H2H),
    col("h2h_manager_away_wins", Integer, H2H),
    col("lineups_confirmed", Text, Lineups),
    col("home_formation", Text, Lineups),
    col("away_formation", Text, Lineups),
    col("home_starters", Integer, Lineups),
    col("away_starters", Integer, Lineups),
    col("home_avg_player_rating", Float, Lineups),
    col("away_avg_player_rating", Float, Lineups),
];

/// Header names in order.
pub fn header() -> Vec<&'static str> {
    COLUMNS.iter().map(|c| c.name).collect()
}

/// Position of a column by name.
pub fn column_index(name: &str) -> Option<usize> {
    COLUMNS.iter().position(|c| c.name == name)
}

/// A typed cell. `Null` is distinct from any zero.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Missing node or failed coercion
    Null,
    /// Text
    Text(String),
    /// Integer
    Integer(i64),
    /// Finite float
    Float(f64),
    /// UTC instant
    Timestamp(DateTime<Utc>),
}

impl CellValue {
    /// Whether the cell is null.
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Integer value, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Float value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// CSV rendering: empty for null, `.` decimals, RFC 3339 timestamps.
    pub fn to_field(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(v) => v.clone(),
            CellValue::Integer(v) => v.to_string(),
            CellValue::Float(v) => v.to_string(),
            CellValue::Timestamp(v) => v.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Coerce a JSON node to `ty`. Missing nodes and failed coercions give `Null`.
pub fn coerce(value: Option<&Value>, ty: ColumnType) -> CellValue {
    let Some(value) = value else {
        return CellValue::Null;
    };
    let coerced = match ty {
        ColumnType::Text => to_text(value).map(CellValue::Text),
        ColumnType::Integer => to_integer(value).map(CellValue::Integer),
        ColumnType::Float => to_float(value).map(CellValue::Float),
        ColumnType::Timestamp => to_timestamp(value).map(CellValue::Timestamp),
    };
    coerced.unwrap_or(CellValue::Null)
}

fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn numeric_text(s: &str) -> &str {
    s.trim().trim_end_matches('%').trim()
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_to_i64)),
        Value::String(s) => {
            let s = numeric_text(s);
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_to_i64))
        }
        _ => None,
    }
}

/// A whole float inside the i64 range; `None` instead of saturating.
fn whole_to_i64(f: f64) -> Option<i64> {
    // 2^63 is exactly representable and is the first value past i64::MAX.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.is_finite() && f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then(|| f as i64)
}

fn to_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => numeric_text(s).parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(secs) => DateTime::from_timestamp(secs, 0),
                Err(_) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
            }
        }
        _ => None,
    }
}

/// One flattened match, aligned with [`COLUMNS`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<CellValue>,
}

impl Row {
    /// All-null row.
    pub fn empty() -> Self {
        Self {
            values: vec![CellValue::Null; COLUMNS.len()],
        }
    }

    /// Cell by column name.
    pub fn get(&self, name: &str) -> Option<&CellValue> {
        column_index(name).map(|i| &self.values[i])
    }

    /// Cells in column order.
    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    /// Match id cell as integer.
    pub fn match_id(&self) -> Option<i64> {
        self.values[0].as_i64()
    }

    /// CSV fields in column order.
    pub fn to_record(&self) -> Vec<String> {
        self.values.iter().map(CellValue::to_field).collect()
    }

    /// Set a column from a JSON node, coercing to its declared type.
    pub fn set(&mut self, name: &str, value: Option<&Value>) {
        if let Some(index) = column_index(name) {
            self.values[index] = coerce(value, COLUMNS[index].ty);
        } else {
            debug_assert!(false, "unknown column {name}");
        }
    }

    /// Set a column to an already-typed value.
    pub fn set_cell(&mut self, name: &str, cell: CellValue) {
        if let Some(index) = column_index(name) {
            self.values[index] = cell;
        } else {
            debug_assert!(false, "unknown column {name}");
        }
    }
}
