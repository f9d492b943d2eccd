//! Season list parsing and selection

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::Season;

#[derive(Debug, Deserialize)]
struct SeasonsPage {
    seasons: Vec<RawSeason>,
}

#[derive(Debug, Deserialize)]
struct RawSeason {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    year: String,
}

/// Parse an upstream season-list document (`{"seasons": [...]}`).
pub fn parse_seasons(league_id: u64, document: &Value) -> Result<Vec<Season>, String> {
    let page = SeasonsPage::deserialize(document).map_err(|e| e.to_string())?;
    Ok(page
        .seasons
        .into_iter()
        .map(|raw| Season {
            id: raw.id,
            league_id,
            name: raw.name,
            year: raw.year,
            is_current: false,
        })
        .collect())
}

/// Start year of a season label: "24/25" → 2024, "2024/2025" → 2024, "2024" → 2024.
///
/// Falls back to the last year-like token of `name` when `year` has none.
pub fn start_year(year: &str, name: &str) -> Option<i32> {
    first_year(year).or_else(|| {
        name.split_whitespace()
            .rev()
            .find_map(first_year)
    })
}

fn first_year(text: &str) -> Option<i32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.len() {
        2 => digits.parse::<i32>().ok().map(|y| 2000 + y),
        4 => digits.parse().ok(),
        _ => None,
    }
}

/// Flag the season considered current on `today`.
///
/// Preference: a season starting this year; else one that started last
/// year while we are still in the first half of this year; else the newest
/// season that is not in the future; else the first listed.
pub fn mark_current(seasons: &mut [Season], today: NaiveDate) {
    for season in seasons.iter_mut() {
        season.is_current = false;
    }
    let year = today.year();
    let years: Vec<Option<i32>> = seasons
        .iter()
        .map(|s| start_year(&s.year, &s.name))
        .collect();

    let newest_with = |pred: &dyn Fn(i32) -> bool| -> Option<usize> {
        years
            .iter()
            .enumerate()
            .filter_map(|(i, y)| y.filter(|y| pred(*y)).map(|y| (i, y)))
            .max_by(|(ia, ya), (ib, yb)| ya.cmp(yb).then(ib.cmp(ia)))
            .map(|(i, _)| i)
    };

    let chosen = newest_with(&|y| y == year)
        .or_else(|| {
            if today.month() <= 6 {
                newest_with(&|y| y == year - 1)
            } else {
                None
            }
        })
        .or_else(|| newest_with(&|y| y <= year))
        .or(if seasons.is_empty() { None } else { Some(0) });

    if let Some(index) = chosen {
        seasons[index].is_current = true;
    }
}

/// Which seasons of a league to walk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeasonSelection {
    /// Every listed season
    #[default]
    All,
    /// Only the season flagged current
    Current,
    /// The `n` newest seasons
    Latest(usize),
    /// Exactly these season ids
    Ids(Vec<u64>),
}

impl SeasonSelection {
    /// Apply the selection to a league's seasons (already marked current).
    pub fn select<'a>(&self, seasons: &'a [Season]) -> Vec<&'a Season> {
        match self {
            SeasonSelection::All => seasons.iter().collect(),
            SeasonSelection::Current => seasons.iter().filter(|s| s.is_current).collect(),
            SeasonSelection::Latest(n) => {
                let mut ordered: Vec<&Season> = seasons.iter().collect();
                // Stable sort keeps upstream order among equal or unknown years.
                ordered.sort_by_key(|s| std::cmp::Reverse(start_year(&s.year, &s.name)));
                ordered.truncate(*n);
                ordered
            }
            SeasonSelection::Ids(ids) => seasons.iter().filter(|s| ids.contains(&s.id)).collect(),
        }
    }
}

impl FromStr for SeasonSelection {
    type Err = String;

    /// Accepts `all`, `current`, `latest:N` or a comma-separated id list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "all" => return Ok(SeasonSelection::All),
            "current" => return Ok(SeasonSelection::Current),
            _ => {}
        }
        if let Some(n) = s.strip_prefix("latest:") {
            let n = n
                .parse::<usize>()
                .map_err(|_| format!("invalid season count in '{s}'"))?;
            return Ok(SeasonSelection::Latest(n));
        }
        let ids = s
            .split(',')
            .map(|part| part.trim().parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                format!("invalid season selection '{s}' (expected all, current, latest:N or id,id,...)")
            })?;
        Ok(SeasonSelection::Ids(ids))
    }
}
