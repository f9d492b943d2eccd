//! Store to CSV export

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::csv::CsvRowWriter;
use super::flatten::{FlattenError, Flattener};
use super::schema::Row;
use super::{OutputError, OutputResult, OutputWriter, RowWriter};
use crate::downloader::season::parse_seasons;
use crate::registry::LeagueRegistry;
use crate::store::{EntityStore, MatchLocation, StoreKey, SEASONS_DIR};

/// Directory under the data root that receives CSV files
pub const PROCESSED_DIR: &str = "processed";

/// File name of the combined export
pub const ALL_LEAGUES_FILE: &str = "all_leagues.csv";

/// File name of the season listing
pub const SEASONS_FILE: &str = "league_seasons.csv";

const SEASON_COLUMNS: [&str; 5] = [
    "league_name",
    "league_id",
    "season_id",
    "season_name",
    "season_year",
];

/// One CSV file produced by an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// Output path
    pub path: PathBuf,
    /// Data rows written (header excluded)
    pub rows_written: u64,
    /// Rows dropped because their match id was already written
    pub duplicates_skipped: u64,
}

/// Outcome of an export call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Files written, in creation order
    pub files: Vec<ExportedFile>,
    /// Matches left out because their Basic document is missing
    pub missing_basic: Vec<u64>,
    /// Matches left out because their documents could not be read
    pub failed: Vec<(u64, String)>,
}

impl ExportReport {
    /// Paths of every file written.
    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(|f| f.path.as_path()).collect()
    }

    /// Total rows over all files.
    pub fn rows_written(&self) -> u64 {
        self.files.iter().map(|f| f.rows_written).sum()
    }

    /// Total duplicates over all files.
    pub fn duplicates_skipped(&self) -> u64 {
        self.files.iter().map(|f| f.duplicates_skipped).sum()
    }
}

/// Writes flattened matches from an [`EntityStore`] to CSV files.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    store: EntityStore,
    flattener: Flattener,
    output_dir: PathBuf,
}

impl CsvExporter {
    /// Exporter writing to `{store root}/processed`.
    pub fn new(store: EntityStore) -> Self {
        let output_dir = store.root().join(PROCESSED_DIR);
        Self {
            flattener: Flattener::new(store.clone()),
            store,
            output_dir,
        }
    }

    /// Write somewhere other than the default directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export one match to `match_{id}.csv`.
    ///
    /// A match without Basic is reported in `missing_basic` and no file is
    /// written.
    pub fn export_match(&self, match_id: u64) -> OutputResult<ExportReport> {
        let location = self
            .store
            .locate_match(match_id)?
            .ok_or(OutputError::UnknownMatch(match_id))?;

        let mut report = ExportReport::default();
        let Some(row) = self.flatten_or_report(&location, &mut report) else {
            return Ok(report);
        };

        let mut writer = CsvRowWriter::new(self.output_dir.join(format!("match_{match_id}.csv")))?;
        writer.write_row(&row)?;
        report.files.push(finish(writer)?);
        Ok(report)
    }

    /// Export every stored match of a league to `league_{id}.csv`.
    pub fn export_league(&self, league_id: u64) -> OutputResult<ExportReport> {
        let mut report = ExportReport::default();
        let mut writer = CsvRowWriter::new(self.league_path(league_id))?;

        for location in self.store.match_locations(Some(league_id))? {
            if let Some(row) = self.flatten_or_report(&location, &mut report) {
                writer.write_row(&row)?;
            }
        }

        report.files.push(finish(writer)?);
        log_report(&report);
        Ok(report)
    }

    /// Export every league to its own file plus `all_leagues.csv`.
    pub fn export_all(&self) -> OutputResult<ExportReport> {
        let mut report = ExportReport::default();
        let mut combined = CsvRowWriter::new(self.output_dir.join(ALL_LEAGUES_FILE))?;

        for league_id in self.store.league_ids()? {
            let mut writer = CsvRowWriter::new(self.league_path(league_id))?;
            for location in self.store.match_locations(Some(league_id))? {
                if let Some(row) = self.flatten_or_report(&location, &mut report) {
                    writer.write_row(&row)?;
                    combined.write_row(&row)?;
                }
            }
            report.files.push(finish(writer)?);
        }

        report.files.push(finish(combined)?);
        log_report(&report);
        Ok(report)
    }

    /// List every stored season of every league in `league_seasons.csv`.
    ///
    /// Leagues come in id order, seasons in upstream order. League names
    /// come from `registry`; an unknown id is written as `Unknown league {id}`.
    /// A season list that cannot be read or parsed is reported in `failed`
    /// under its league id.
    pub fn export_seasons(&self, registry: &LeagueRegistry) -> OutputResult<ExportReport> {
        let mut league_ids: Vec<u64> = self
            .store
            .list_keys(SEASONS_DIR)?
            .iter()
            .filter_map(|k| match StoreKey::parse(k) {
                Some(StoreKey::Seasons { league_id }) => Some(league_id),
                _ => None,
            })
            .collect();
        league_ids.sort_unstable();

        let mut report = ExportReport::default();
        let mut writer =
            CsvRowWriter::with_header(self.output_dir.join(SEASONS_FILE), &SEASON_COLUMNS)?;

        for league_id in league_ids {
            let key = StoreKey::Seasons { league_id };
            let seasons = match self.store.read(&key) {
                Ok(Some(document)) => parse_seasons(league_id, &document),
                Ok(None) => continue,
                Err(e) => Err(e.to_string()),
            };
            let seasons = match seasons {
                Ok(seasons) => seasons,
                Err(message) => {
                    warn!(league_id, error = %message, "Unreadable season list, left out of export");
                    report.failed.push((league_id, message));
                    continue;
                }
            };

            let league_name = registry
                .name(league_id)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Unknown league {league_id}"));
            for season in seasons {
                writer.write_record(
                    i64::try_from(season.id).ok(),
                    [
                        league_name.clone(),
                        league_id.to_string(),
                        season.id.to_string(),
                        season.name,
                        season.year,
                    ],
                )?;
            }
        }

        report.files.push(finish(writer)?);
        log_report(&report);
        Ok(report)
    }

    fn league_path(&self, league_id: u64) -> PathBuf {
        self.output_dir.join(format!("league_{league_id}.csv"))
    }

    fn flatten_or_report(&self, location: &MatchLocation, report: &mut ExportReport) -> Option<Row> {
        match self.flattener.flatten_at(location) {
            Ok(row) => Some(row),
            Err(FlattenError::MissingBasic(id)) => {
                warn!(match_id = id, "Match has no basic document, left out of export");
                report.missing_basic.push(id);
                None
            }
            Err(e) => {
                warn!(match_id = location.match_id, error = %e, "Failed to flatten match");
                report.failed.push((location.match_id, e.to_string()));
                None
            }
        }
    }
}

fn finish(writer: CsvRowWriter) -> OutputResult<ExportedFile> {
    let file = ExportedFile {
        path: writer.path().to_path_buf(),
        rows_written: writer.rows_written(),
        duplicates_skipped: writer.duplicates_skipped(),
    };
    writer.close()?;
    Ok(file)
}

fn log_report(report: &ExportReport) {
    info!(
        files = report.files.len(),
        rows = report.rows_written(),
        duplicates = report.duplicates_skipped(),
        missing_basic = report.missing_basic.len(),
        failed = report.failed.len(),
        "Export complete"
    );
}
