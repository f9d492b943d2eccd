//! Store completeness report
//!
//! Counts, per league and season, how many stored matches hold every
//! required category document and which categories are missing.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::csv::CsvRowWriter;
use super::{OutputResult, OutputWriter};
use crate::store::{EntityStore, MatchLocation};
use crate::DetailCategory;

/// File name of the per-season completeness CSV
pub const COMPLETENESS_FILE: &str = "match_files_report.csv";

/// Categories a match needs to count as complete unless told otherwise.
///
/// Lineups are left out: upstream often publishes none for older matches.
pub const DEFAULT_REQUIRED: [DetailCategory; 5] = [
    DetailCategory::Basic,
    DetailCategory::Statistics,
    DetailCategory::TeamStreaks,
    DetailCategory::PregameForm,
    DetailCategory::H2H,
];

const CSV_COLUMNS: [&str; 7] = [
    "league_id",
    "season_id",
    "total_matches",
    "complete_matches",
    "completion_rate",
    "missing",
    "unreadable",
];

/// Match counts of one scope (run, league or season).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tally {
    /// Matches with at least one stored document
    pub total_matches: u64,
    /// Matches holding every required category
    pub complete_matches: u64,
    /// Matches whose documents could not be read
    pub unreadable_matches: u64,
    /// Matches lacking each category
    pub missing: BTreeMap<DetailCategory, u64>,
}

impl Tally {
    fn add(&mut self, missing: &[DetailCategory]) {
        self.total_matches += 1;
        if missing.is_empty() {
            self.complete_matches += 1;
        }
        for category in missing {
            *self.missing.entry(*category).or_default() += 1;
        }
    }

    fn add_unreadable(&mut self) {
        self.total_matches += 1;
        self.unreadable_matches += 1;
    }

    /// Share of complete matches in percent, rounded to 2 places; 0 when empty.
    pub fn completion_rate(&self) -> f64 {
        if self.total_matches == 0 {
            return 0.0;
        }
        let rate = self.complete_matches as f64 * 100.0 / self.total_matches as f64;
        (rate * 100.0).round() / 100.0
    }
}

/// A match lacking required documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompleteMatch {
    /// Match id
    pub match_id: u64,
    /// Required categories not stored
    pub missing: Vec<DetailCategory>,
}

/// One season's completeness.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeasonCompleteness {
    /// Counts
    #[serde(flatten)]
    pub tally: Tally,
    /// Matches lacking documents, by id
    pub incomplete: Vec<IncompleteMatch>,
}

/// One league's completeness.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeagueCompleteness {
    /// Counts over all seasons
    #[serde(flatten)]
    pub tally: Tally,
    /// Per-season breakdown, by season id
    pub seasons: BTreeMap<u64, SeasonCompleteness>,
}

/// Which required documents are present for every stored match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompletenessReport {
    /// Categories counted as required
    pub required: Vec<DetailCategory>,
    /// Counts over the whole store
    pub overall: Tally,
    /// Per-league breakdown, by league id
    pub leagues: BTreeMap<u64, LeagueCompleteness>,
    /// Matches whose documents could not be read, with the reason
    pub unreadable: Vec<(u64, String)>,
}

impl CompletenessReport {
    /// Inspect every stored match, optionally only one league's.
    pub fn build(
        store: &EntityStore,
        league_id: Option<u64>,
        required: &[DetailCategory],
    ) -> OutputResult<Self> {
        let mut report = CompletenessReport {
            required: required.to_vec(),
            ..Self::default()
        };
        for location in store.match_locations(league_id)? {
            report.inspect(store, &location);
        }
        info!(
            matches = report.overall.total_matches,
            complete = report.overall.complete_matches,
            rate = report.overall.completion_rate(),
            "Completeness report built"
        );
        Ok(report)
    }

    fn inspect(&mut self, store: &EntityStore, location: &MatchLocation) {
        let league = self.leagues.entry(location.league_id).or_default();
        let season = league.seasons.entry(location.season_id).or_default();

        let documents = match store.read_match(location) {
            Ok(documents) => documents,
            Err(e) => {
                warn!(match_id = location.match_id, error = %e, "Unreadable match documents");
                self.overall.add_unreadable();
                league.tally.add_unreadable();
                season.tally.add_unreadable();
                self.unreadable.push((location.match_id, e.to_string()));
                return;
            }
        };

        let missing: Vec<DetailCategory> = self
            .required
            .iter()
            .copied()
            .filter(|c| !documents.contains_key(c))
            .collect();

        self.overall.add(&missing);
        league.tally.add(&missing);
        season.tally.add(&missing);
        if !missing.is_empty() {
            season.incomplete.push(IncompleteMatch {
                match_id: location.match_id,
                missing,
            });
        }
    }

    /// Write one row per season to `{dir}/match_files_report.csv`.
    pub fn write_csv(&self, dir: &Path) -> OutputResult<PathBuf> {
        let path = dir.join(COMPLETENESS_FILE);
        let mut writer = CsvRowWriter::with_header(&path, &CSV_COLUMNS)?;
        for (league_id, league) in &self.leagues {
            for (season_id, season) in &league.seasons {
                let tally = &season.tally;
                writer.write_record(
                    None,
                    [
                        league_id.to_string(),
                        season_id.to_string(),
                        tally.total_matches.to_string(),
                        tally.complete_matches.to_string(),
                        tally.completion_rate().to_string(),
                        missing_summary(&tally.missing),
                        tally.unreadable_matches.to_string(),
                    ],
                )?;
            }
        }
        writer.close()?;
        Ok(path)
    }
}

/// `category: count` pairs joined by `; `.
pub fn missing_summary(missing: &BTreeMap<DetailCategory, u64>) -> String {
    missing
        .iter()
        .map(|(category, count)| format!("{category}: {count}"))
        .collect::<Vec<_>>()
        .join("; ")
}
