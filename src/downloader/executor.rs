//! Hierarchy walker
//!
//! [`Harvester`] drives league → season → round → match → category fetches
//! through one shared [`RateLimitedClient`] and persists every document in
//! an [`EntityStore`]. Seasons and leagues run concurrently; rounds inside a
//! season are discovered strictly in order; a match's categories are fetched
//! concurrently and independently. Item failures are counted, never raised.
//!
//! A listing that was fetched and parsed but could not be written still
//! drives the walk: its failed write is counted and its children are visited.

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::job::{HarvestRequest, ItemStatus, Level, WorkItem};
use super::progress::{HarvestSummary, ProgressTracker};
use super::season::{mark_current, parse_seasons};
use super::HarvestError;
use crate::config::{ConfigError, HarvestConfig};
use crate::fetcher::{endpoints, FetchErrorKind, RateLimitedClient, Transport};
use crate::shutdown::CancellationToken;
use crate::store::{EntityStore, MatchLocation, StoreKey};
use crate::{DetailCategory, MatchStatus, MatchSummary, Season};

/// A fetched value and whether it came from the network or the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    /// `Stored` when fetched now, `Skipped` when read from the store,
    /// `Failed` when fetched but not written
    pub status: ItemStatus,
    /// The value
    pub value: T,
    /// Why the fetched document could not be written
    pub store_error: Option<String>,
}

/// Result of requesting one round.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    /// Round exists and its listing is stored
    Listed {
        /// `Stored` or `Skipped`
        status: ItemStatus,
        /// Matches selected for detail fetching
        matches: Vec<MatchSummary>,
    },
    /// Round exists but its listing could not be written
    Unsaved {
        /// Matches selected for detail fetching
        matches: Vec<MatchSummary>,
        /// Storage error
        error: String,
    },
    /// Round exists but held no selectable match and was not persisted
    Discarded {
        /// Events upstream listed for the round
        events: usize,
    },
    /// Upstream signalled that this round does not exist yet
    End,
}

#[derive(Debug, Deserialize)]
struct RoundPage {
    events: Vec<RawEvent>,
    #[serde(rename = "hasNextPage", default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: u64,
    #[serde(default)]
    status: MatchStatus,
}

/// Orchestrates fetching across the entity hierarchy.
#[derive(Clone)]
pub struct Harvester {
    config: Arc<HarvestConfig>,
    client: RateLimitedClient,
    store: EntityStore,
    cancel: CancellationToken,
    force: bool,
    today: Option<NaiveDate>,
}

impl Harvester {
    /// Build a harvester with its own gate over `transport`.
    pub fn new(config: HarvestConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = RateLimitedClient::from_config(transport, &config);
        let store = EntityStore::new(config.data_dir.clone());
        Ok(Self::from_parts(config, client, store))
    }

    /// Assemble from prebuilt parts (shared client, custom store).
    pub fn from_parts(config: HarvestConfig, client: RateLimitedClient, store: EntityStore) -> Self {
        Self {
            config: Arc::new(config),
            client,
            store,
            cancel: CancellationToken::new(),
            force: false,
            today: None,
        }
    }

    /// Re-fetch documents even when they are already stored.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Observe `cancel` here and in the client.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.client = self.client.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Pin the date used to pick the current season.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// The document store.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The shared client.
    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }

    /// The run configuration.
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Fetch (or read from cache) a league's season list, with the current season flagged.
    pub async fn fetch_seasons(&self, league_id: u64) -> Result<Fetched<Vec<Season>>, HarvestError> {
        let key = StoreKey::Seasons { league_id };
        let mut item = WorkItem::new(Level::Seasons, format!("league {league_id}"));

        let (document, fresh) = match self.cached(&key).map_err(|e| fail(&mut item, e))? {
            Some(doc) => {
                item.advance(ItemStatus::Skipped)?;
                (doc, false)
            }
            None => {
                item.advance(ItemStatus::Fetching)?;
                let path = endpoints::seasons(league_id);
                let document = self
                    .fetch_fresh(&key, &path)
                    .await
                    .map_err(|e| fail(&mut item, e))?;
                (document, true)
            }
        };

        let mut seasons = parse_seasons(league_id, &document)
            .map_err(|m| fail(&mut item, self.parse_failure(&key, &document, m)))?;
        let store_error = if fresh { self.persist(&key, &document, &mut item)? } else { None };
        mark_current(&mut seasons, self.today());

        debug!(league_id, seasons = seasons.len(), status = item.status().as_str(), "Season list ready");
        Ok(Fetched {
            status: item.status(),
            value: seasons,
            store_error,
        })
    }

    /// Request one round of a season.
    ///
    /// A 404 or an empty final page ends discovery ([`RoundOutcome::End`]) and
    /// is never persisted. A listing that parses but cannot be written comes
    /// back as [`RoundOutcome::Unsaved`] with its matches.
    pub async fn fetch_matches_for_round(
        &self,
        league_id: u64,
        season_id: u64,
        round: u32,
    ) -> Result<RoundOutcome, HarvestError> {
        let key = StoreKey::Round {
            league_id,
            season_id,
            round,
        };
        let mut item = WorkItem::new(Level::Rounds, round_id(league_id, season_id, round));

        if let Some(document) = self.cached(&key).map_err(|e| fail(&mut item, e))? {
            item.advance(ItemStatus::Skipped)?;
            let page = parse_round(&document).map_err(|m| self.parse_failure(&key, &document, m))?;
            return Ok(RoundOutcome::Listed {
                status: item.status(),
                matches: self.select_matches(league_id, season_id, round, page.events),
            });
        }

        item.advance(ItemStatus::Fetching)?;
        let path = endpoints::round_events(league_id, season_id, round);
        let document = match self.fetch_fresh(&key, &path).await {
            Ok(doc) => doc,
            Err(HarvestError::Fetch(e)) if e.kind == FetchErrorKind::NotFound => {
                debug!(league_id, season_id, round, "Round not found, discovery ends");
                return Ok(RoundOutcome::End);
            }
            Err(e) => return Err(fail(&mut item, e)),
        };

        let page = parse_round(&document)
            .map_err(|m| fail(&mut item, self.parse_failure(&key, &document, m)))?;
        if page.events.is_empty() && !page.has_next_page {
            debug!(league_id, season_id, round, "Empty final page, discovery ends");
            return Ok(RoundOutcome::End);
        }

        let events = page.events.len();
        let matches = self.select_matches(league_id, season_id, round, page.events);
        if matches.is_empty() && !self.config.save_empty_rounds {
            debug!(league_id, season_id, round, events, "No selectable matches, round not kept");
            return Ok(RoundOutcome::Discarded { events });
        }

        match self.persist(&key, &document, &mut item)? {
            None => Ok(RoundOutcome::Listed {
                status: item.status(),
                matches,
            }),
            Some(error) => Ok(RoundOutcome::Unsaved { matches, error }),
        }
    }

    /// Fetch one category of a match identified only by id.
    ///
    /// The match's league and season come from the store when any of its
    /// documents is cached, otherwise from its freshly fetched Basic document.
    pub async fn fetch_match_detail(
        &self,
        match_id: u64,
        category: DetailCategory,
    ) -> Result<ItemStatus, HarvestError> {
        if let Some(location) = self.store.locate_match(match_id)? {
            return self.fetch_detail_at(location, category).await;
        }

        // Diagnostics only; the real location is unknown until Basic arrives.
        let unplaced_key = MatchLocation::new(0, 0, match_id).key(DetailCategory::Basic);
        let basic = self
            .fetch_fresh(&unplaced_key, &endpoints::match_detail(match_id, DetailCategory::Basic))
            .await?;
        let location = locate_from_basic(match_id, &basic)
            .map_err(|m| self.parse_failure(&unplaced_key, &basic, m))?;
        self.store.write(&location.key(DetailCategory::Basic), &basic)?;
        info!(match_id, league_id = location.league_id, season_id = location.season_id, "Located match");

        if category == DetailCategory::Basic {
            return Ok(ItemStatus::Stored);
        }
        self.fetch_detail_at(location, category).await
    }

    /// Fetch one category of a match at a known location.
    pub async fn fetch_detail_at(
        &self,
        location: MatchLocation,
        category: DetailCategory,
    ) -> Result<ItemStatus, HarvestError> {
        let key = location.key(category);
        let mut item = WorkItem::new(Level::Details, detail_id(&location, category));

        if !self.force && self.store.exists(&key) {
            item.advance(ItemStatus::Skipped)?;
            return Ok(item.status());
        }

        item.advance(ItemStatus::Fetching)?;
        let document = self
            .fetch_fresh(&key, &endpoints::match_detail(location.match_id, category))
            .await
            .map_err(|e| fail(&mut item, e))?;
        validate_detail(category, &document)
            .map_err(|m| fail(&mut item, self.parse_failure(&key, &document, m)))?;
        self.store
            .write(&key, &document)
            .map_err(|e| fail(&mut item, e.into()))?;
        item.advance(ItemStatus::Stored)?;
        Ok(item.status())
    }

    /// Walk every requested league. Never fails; failures are in the summary.
    pub async fn harvest(&self, request: &HarvestRequest) -> HarvestSummary {
        let progress = Arc::new(ProgressTracker::new());
        let categories: Arc<[DetailCategory]> = request.categories.clone().into();

        info!(
            leagues = request.leagues.len(),
            max_concurrent = self.config.max_concurrent,
            force = self.force,
            "Starting harvest"
        );

        let leagues = request.leagues.iter().map(|&league_id| {
            self.harvest_league(league_id, request, categories.clone(), progress.clone())
                .instrument(info_span!("league", league_id))
        });
        join_all(leagues).await;

        let summary = progress.snapshot(self.cancel.is_cancelled());
        info!(
            seasons_stored = summary.seasons.stored,
            rounds_stored = summary.rounds.stored,
            rounds_skipped = summary.rounds.skipped,
            details_stored = summary.details.stored,
            details_skipped = summary.details.skipped,
            failed = summary.total_failed(),
            cancelled = summary.cancelled,
            "Harvest finished"
        );
        summary
    }

    async fn harvest_league(
        &self,
        league_id: u64,
        request: &HarvestRequest,
        categories: Arc<[DetailCategory]>,
        progress: Arc<ProgressTracker>,
    ) {
        if self.cancel.is_cancelled() {
            return;
        }

        let seasons = match self.fetch_seasons(league_id).await {
            Ok(fetched) => {
                match fetched.store_error {
                    Some(e) => progress.record_failure(Level::Seasons, format!("league {league_id}"), e),
                    None => progress.record(Level::Seasons, fetched.status),
                }
                fetched.value
            }
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                progress.record_failure(Level::Seasons, format!("league {league_id}"), e);
                return;
            }
        };

        let selected = request.seasons.select(&seasons);
        if selected.is_empty() {
            warn!(league_id, available = seasons.len(), "No season matches the selection");
        }

        let walks = selected.into_iter().map(|season| {
            self.harvest_season(league_id, season.id, categories.clone(), progress.clone())
                .instrument(info_span!("season", season_id = season.id, name = %season.name))
        });
        join_all(walks).await;
    }

    async fn harvest_season(
        &self,
        league_id: u64,
        season_id: u64,
        categories: Arc<[DetailCategory]>,
        progress: Arc<ProgressTracker>,
    ) {
        let mut details = JoinSet::new();
        let mut round = 1u32;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.fetch_matches_for_round(league_id, season_id, round).await {
                Ok(RoundOutcome::Listed { status, matches }) => {
                    progress.record(Level::Rounds, status);
                    debug!(round, matches = matches.len(), status = status.as_str(), "Round listed");
                    self.spawn_matches(&mut details, league_id, season_id, matches, &categories, &progress);
                }
                Ok(RoundOutcome::Unsaved { matches, error }) => {
                    progress.record_failure(Level::Rounds, round_id(league_id, season_id, round), error);
                    self.spawn_matches(&mut details, league_id, season_id, matches, &categories, &progress);
                }
                Ok(RoundOutcome::Discarded { .. }) => progress.record_empty(Level::Rounds),
                Ok(RoundOutcome::End) => break,
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    // Later rounds cannot be trusted without this one's listing.
                    progress.record_failure(Level::Rounds, round_id(league_id, season_id, round), e);
                    break;
                }
            }
            round += 1;
        }

        info!(rounds_requested = round, "Round discovery finished");
        while let Some(joined) = details.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Match task panicked or was aborted");
            }
        }
    }

    fn spawn_matches(
        &self,
        details: &mut JoinSet<()>,
        league_id: u64,
        season_id: u64,
        matches: Vec<MatchSummary>,
        categories: &Arc<[DetailCategory]>,
        progress: &Arc<ProgressTracker>,
    ) {
        for summary in matches {
            if self.cancel.is_cancelled() {
                break;
            }
            let location = MatchLocation::new(league_id, season_id, summary.id);
            let this = self.clone();
            let categories = categories.clone();
            let progress = progress.clone();
            details.spawn(
                async move { this.harvest_match(location, &categories, &progress).await }
                    .instrument(info_span!("match", match_id = summary.id)),
            );
        }
    }

    async fn harvest_match(
        &self,
        location: MatchLocation,
        categories: &[DetailCategory],
        progress: &ProgressTracker,
    ) {
        let fetches = categories.iter().map(|&category| async move {
            (category, self.fetch_detail_at(location, category).await)
        });
        for (category, result) in join_all(fetches).await {
            match result {
                Ok(status) => progress.record(Level::Details, status),
                Err(e) if e.is_cancelled() => {}
                Err(e) => progress.record_failure(Level::Details, detail_id(&location, category), e),
            }
        }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    fn cached(&self, key: &StoreKey) -> Result<Option<Value>, HarvestError> {
        if self.force || !self.store.exists(key) {
            return Ok(None);
        }
        Ok(self.store.read(key)?)
    }

    /// Write a freshly fetched listing. A storage failure marks `item` Failed
    /// and is handed back instead of raised, so the caller can still use the
    /// listing.
    fn persist(
        &self,
        key: &StoreKey,
        document: &Value,
        item: &mut WorkItem,
    ) -> Result<Option<String>, HarvestError> {
        match self.store.write(key, document) {
            Ok(()) => {
                item.advance(ItemStatus::Stored)?;
                Ok(None)
            }
            Err(e) => {
                item.advance(ItemStatus::Failed)?;
                error!(key = %key, error = %e, "Failed to store listing");
                Ok(Some(HarvestError::Store(e).to_string()))
            }
        }
    }

    async fn fetch_fresh(&self, key: &StoreKey, path: &str) -> Result<Value, HarvestError> {
        if self.cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }
        match self.client.fetch(path, &[]).await {
            Ok(document) => Ok(document),
            Err(e) if e.kind == FetchErrorKind::Cancelled => Err(HarvestError::Cancelled),
            Err(e) => {
                if let Some(raw) = e.raw_body.as_deref() {
                    if let Err(store_err) = self.store.preserve_raw(key, raw) {
                        error!(key = %key, error = %store_err, "Failed to preserve raw payload");
                    }
                }
                Err(HarvestError::Fetch(e))
            }
        }
    }

    fn parse_failure(&self, key: &StoreKey, document: &Value, message: String) -> HarvestError {
        if let Err(e) = self.store.preserve_raw(key, &document.to_string()) {
            error!(key = %key, error = %e, "Failed to preserve raw payload");
        }
        HarvestError::Parse {
            key: key.as_path(),
            message,
        }
    }

    fn select_matches(
        &self,
        league_id: u64,
        season_id: u64,
        round: u32,
        events: Vec<RawEvent>,
    ) -> Vec<MatchSummary> {
        events
            .into_iter()
            .filter(|event| !self.config.fetch_only_finished || event.status.is_finished())
            .map(|event| MatchSummary {
                id: event.id,
                league_id,
                season_id,
                round,
                status: event.status,
            })
            .collect()
    }
}

/// Mark `item` Failed unless `error` is a cancellation, passing the error on.
fn fail(item: &mut WorkItem, error: HarvestError) -> HarvestError {
    if !error.is_cancelled() && item.advance(ItemStatus::Failed).is_ok() {
        debug!(level = %item.level, id = %item.id, error = %error, "Item failed");
    }
    error
}

fn parse_round(document: &Value) -> Result<RoundPage, String> {
    RoundPage::deserialize(document).map_err(|e| e.to_string())
}

fn validate_detail(category: DetailCategory, document: &Value) -> Result<(), String> {
    if !document.is_object() {
        return Err(format!("{category} payload is not a JSON object"));
    }
    if category == DetailCategory::Basic && !document["event"].is_object() {
        return Err("basic payload has no event object".to_string());
    }
    Ok(())
}

fn locate_from_basic(match_id: u64, basic: &Value) -> Result<MatchLocation, String> {
    let event = &basic["event"];
    let league_id = event["tournament"]["uniqueTournament"]["id"]
        .as_u64()
        .ok_or("basic payload lacks tournament.uniqueTournament.id")?;
    let season_id = event["season"]["id"]
        .as_u64()
        .ok_or("basic payload lacks season.id")?;
    Ok(MatchLocation::new(league_id, season_id, match_id))
}

fn round_id(league_id: u64, season_id: u64, round: u32) -> String {
    format!("league {league_id} season {season_id} round {round}")
}

fn detail_id(location: &MatchLocation, category: DetailCategory) -> String {
    format!("match {} {}", location.match_id, category)
}
