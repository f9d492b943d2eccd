//! Command execution

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Cli, CliError, Commands, OutputFormat};
use crate::downloader::{HarvestRequest, HarvestSummary, Harvester, RoundOutcome};
use crate::fetcher::transport::ReqwestTransport;
use crate::metrics;
use crate::output::export::PROCESSED_DIR;
use crate::output::report::missing_summary;
use crate::output::{CompletenessReport, CsvExporter, ExportReport, Tally, DEFAULT_REQUIRED};
use crate::registry::LeagueRegistry;
use crate::shutdown::CancellationToken;
use crate::store::EntityStore;
use crate::DetailCategory;

/// Run the parsed command to completion.
pub async fn execute(cli: &Cli, cancel: CancellationToken) -> Result<(), CliError> {
    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr).await?;
    }

    let registry = match &cli.leagues_file {
        Some(path) => LeagueRegistry::from_file(path)?,
        None => LeagueRegistry::load_embedded(),
    };

    match &cli.command {
        Commands::Leagues => print(cli.output_format, registry.entries(), || {
            registry
                .entries()
                .iter()
                .map(|l| format!("{:>6}  {}", l.id, l.name))
                .collect()
        }),

        Commands::Seasons { league } => {
            let league_id = registry.resolve(league)?;
            let fetched = harvester(cli, cancel)?.fetch_seasons(league_id).await?;
            print(cli.output_format, &fetched.value, || {
                fetched
                    .value
                    .iter()
                    .map(|s| {
                        let marker = if s.is_current { " (current)" } else { "" };
                        format!("{:>8}  {}{}", s.id, s.name, marker)
                    })
                    .collect()
            })?;
            unsaved(fetched.store_error.as_deref())
        }

        Commands::Round {
            league,
            season,
            round,
        } => {
            let league_id = registry.resolve(league)?;
            let outcome = harvester(cli, cancel)?
                .fetch_matches_for_round(league_id, *season, *round)
                .await?;
            let value = match &outcome {
                RoundOutcome::Listed { status, matches } => json!({
                    "round": round,
                    "status": status,
                    "matches": matches,
                }),
                RoundOutcome::Unsaved { matches, error } => json!({
                    "round": round,
                    "status": "failed",
                    "matches": matches,
                    "error": error,
                }),
                RoundOutcome::Discarded { events } => json!({
                    "round": round,
                    "status": "empty",
                    "events": events,
                }),
                RoundOutcome::End => json!({"round": round, "status": "not_found"}),
            };
            print(cli.output_format, &value, || match &outcome {
                RoundOutcome::Listed { status, matches } => {
                    let mut lines = vec![format!(
                        "Round {round}: {} match(es), {}",
                        matches.len(),
                        status.as_str()
                    )];
                    lines.extend(
                        matches
                            .iter()
                            .map(|m| format!("{:>10}  {}", m.id, m.status.description)),
                    );
                    lines
                }
                RoundOutcome::Unsaved { matches, error } => vec![format!(
                    "Round {round}: {} match(es), not stored: {error}",
                    matches.len()
                )],
                RoundOutcome::Discarded { events } => {
                    vec![format!("Round {round}: {events} event(s), none selectable")]
                }
                RoundOutcome::End => vec![format!("Round {round} does not exist")],
            })?;
            match &outcome {
                RoundOutcome::Unsaved { error, .. } => unsaved(Some(error)),
                _ => Ok(()),
            }
        }

        Commands::Detail { match_id, category } => {
            let status = harvester(cli, cancel)?
                .fetch_match_detail(*match_id, *category)
                .await?;
            let value = json!({"match_id": match_id, "category": category, "status": status});
            print(cli.output_format, &value, || {
                vec![format!("match {match_id} {category}: {}", status.as_str())]
            })
        }

        Commands::Harvest {
            leagues,
            seasons,
            categories,
        } => {
            let league_ids = if leagues.is_empty() {
                registry.entries().iter().map(|l| l.id).collect()
            } else {
                leagues
                    .iter()
                    .map(|l| registry.resolve(l))
                    .collect::<Result<Vec<_>, _>>()?
            };
            let categories = if categories.is_empty() {
                DetailCategory::ALL.to_vec()
            } else {
                categories.clone()
            };
            let request = HarvestRequest::new(league_ids)
                .with_seasons(seasons.clone())
                .with_categories(categories);

            let summary = harvester(cli, cancel)?.harvest(&request).await;
            print(cli.output_format, &summary, || summary_lines(&summary))?;

            if summary.is_clean() {
                Ok(())
            } else {
                Err(CliError::Incomplete {
                    failed: summary.total_failed(),
                    cancelled: summary.cancelled,
                })
            }
        }

        Commands::Export {
            league,
            match_id,
            seasons,
            output_dir,
        } => {
            let mut exporter = CsvExporter::new(EntityStore::new(cli.data_dir.clone()));
            if let Some(dir) = output_dir {
                exporter = exporter.with_output_dir(dir);
            }
            let report = match (league, match_id) {
                _ if *seasons => exporter.export_seasons(&registry)?,
                (_, Some(id)) => exporter.export_match(*id)?,
                (Some(league), None) => exporter.export_league(registry.resolve(league)?)?,
                (None, None) => exporter.export_all()?,
            };
            for id in &report.missing_basic {
                warn!(match_id = id, "Skipped match without basic document");
            }
            print(cli.output_format, &report_json(&report), || report_lines(&report))
        }

        Commands::Report {
            league,
            categories,
            output_dir,
        } => {
            let store = EntityStore::new(cli.data_dir.clone());
            let league_id = league.as_deref().map(|l| registry.resolve(l)).transpose()?;
            let required = if categories.is_empty() {
                DEFAULT_REQUIRED.to_vec()
            } else {
                categories.clone()
            };
            let report = CompletenessReport::build(&store, league_id, &required)?;
            let dir = output_dir
                .clone()
                .unwrap_or_else(|| cli.data_dir.join(PROCESSED_DIR));
            let path = report.write_csv(&dir)?;
            info!(path = %path.display(), "Completeness report written");
            print(cli.output_format, &report, || completeness_lines(&report, &registry))
        }
    }
}

/// A listing fetched but not written fails the command after it is shown.
fn unsaved(store_error: Option<&str>) -> Result<(), CliError> {
    match store_error {
        Some(error) => {
            warn!(error, "Listing was fetched but not stored");
            Err(CliError::Incomplete {
                failed: 1,
                cancelled: false,
            })
        }
        None => Ok(()),
    }
}

fn harvester(cli: &Cli, cancel: CancellationToken) -> Result<Harvester, CliError> {
    let config = cli.harvest_config();
    let transport = Arc::new(ReqwestTransport::new(&config)?);
    info!(
        data_dir = %config.data_dir.display(),
        max_concurrent = config.max_concurrent,
        max_retries = config.max_retries,
        "Harvester configured"
    );
    Ok(Harvester::new(config, transport)?
        .with_force(cli.force)
        .with_cancellation(cancel))
}

fn print<T, F>(format: OutputFormat, value: &T, human: F) -> Result<(), CliError>
where
    T: Serialize + ?Sized,
    F: FnOnce() -> Vec<String>,
{
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(value)
                .map_err(|e| CliError::SerializationError(e.to_string()))?;
            println!("{text}");
        }
        OutputFormat::Human => {
            for line in human() {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn summary_lines(summary: &HarvestSummary) -> Vec<String> {
    let mut lines = vec![
        format!(
            "seasons: {} stored, {} skipped, {} failed",
            summary.seasons.stored, summary.seasons.skipped, summary.seasons.failed
        ),
        format!(
            "rounds:  {} stored, {} skipped, {} failed, {} empty",
            summary.rounds.stored, summary.rounds.skipped, summary.rounds.failed, summary.rounds.empty
        ),
        format!(
            "details: {} stored, {} skipped, {} failed",
            summary.details.stored, summary.details.skipped, summary.details.failed
        ),
    ];
    lines.extend(
        summary
            .failed_items
            .iter()
            .map(|f| format!("FAILED {} {}: {}", f.level, f.id, f.error)),
    );
    if summary.cancelled {
        lines.push("cancelled before completion".to_string());
    }
    lines
}

fn completeness_lines(report: &CompletenessReport, registry: &LeagueRegistry) -> Vec<String> {
    let tally_line = |label: String, tally: &Tally| {
        let mut line = format!(
            "{label}: {} match(es), {} complete ({}%)",
            tally.total_matches,
            tally.complete_matches,
            tally.completion_rate()
        );
        if !tally.missing.is_empty() {
            line.push_str(&format!(", missing {}", missing_summary(&tally.missing)));
        }
        if tally.unreadable_matches > 0 {
            line.push_str(&format!(", {} unreadable", tally.unreadable_matches));
        }
        line
    };

    let mut lines = vec![tally_line("overall".to_string(), &report.overall)];
    for (league_id, league) in &report.leagues {
        let name = registry.name(*league_id).unwrap_or("unknown league");
        lines.push(tally_line(format!("league {league_id} {name}"), &league.tally));
        for (season_id, season) in &league.seasons {
            lines.push(tally_line(format!("  season {season_id}"), &season.tally));
        }
    }
    lines
}

fn report_json(report: &ExportReport) -> serde_json::Value {
    json!({
        "files": report.files.iter().map(|f| json!({
            "path": f.path.display().to_string(),
            "rows_written": f.rows_written,
            "duplicates_skipped": f.duplicates_skipped,
        })).collect::<Vec<_>>(),
        "missing_basic": report.missing_basic,
        "failed": report.failed.iter().map(|(id, e)| json!({"match_id": id, "error": e})).collect::<Vec<_>>(),
    })
}

fn report_lines(report: &ExportReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .files
        .iter()
        .map(|f| {
            format!(
                "{} ({} rows, {} duplicates skipped)",
                f.path.display(),
                f.rows_written,
                f.duplicates_skipped
            )
        })
        .collect();
    if !report.missing_basic.is_empty() {
        lines.push(format!("{} match(es) without basic document", report.missing_basic.len()));
    }
    if !report.failed.is_empty() {
        lines.push(format!("{} item(s) could not be read", report.failed.len()));
    }
    lines
}
