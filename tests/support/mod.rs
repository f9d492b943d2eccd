//! Shared fixtures: a scripted in-memory transport and upstream payloads

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sports_data_harvester::config::HarvestConfig;
use sports_data_harvester::downloader::Harvester;
use sports_data_harvester::fetcher::{Transport, TransportError, TransportResponse};

/// Base URL the mock answers for
pub const BASE: &str = "http://mock.test/api/v1";

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// Status with JSON body
    Json(u16, Value),
    /// Status with a raw body
    Raw(u16, &'static str),
    /// Transport-level timeout
    Timeout,
    /// Connection reset
    Connection,
    /// Never answers within any sane deadline
    Hang,
}

/// Transport answering from per-path scripts.
///
/// Each path has a queue of replies; the last reply repeats once the queue
/// is down to one. Unscripted paths answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every request for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Script `replies` for `path` (relative to [`BASE`]).
    pub fn on(self, path: impl Into<String>, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(path.into(), replies.into_iter().collect());
        self
    }

    /// Answer `path` with 200 and `body`.
    pub fn ok(self, path: impl Into<String>, body: Value) -> Self {
        self.on(path, vec![Reply::Json(200, body)])
    }

    /// Every path requested, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests for `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == path).count()
    }

    /// Highest number of requests in progress at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_reply(&self, path: &str) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        url: &str,
        _query: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError> {
        let path = url.strip_prefix(BASE).unwrap_or(url).to_string();
        self.calls.lock().unwrap().push(path.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let reply = self.next_reply(&path);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            None => Ok(response(404, Bytes::from_static(b"{\"error\":{\"code\":404}}"))),
            Some(Reply::Json(status, body)) => Ok(response(status, Bytes::from(body.to_string()))),
            Some(Reply::Raw(status, body)) => Ok(response(status, Bytes::from_static(body.as_bytes()))),
            Some(Reply::Timeout) => Err(TransportError::Timeout("mock timeout".to_string())),
            Some(Reply::Connection) => Err(TransportError::Connection("mock reset".to_string())),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(response(200, Bytes::from_static(b"{}")))
            }
        }
    }
}

fn response(status: u16, body: Bytes) -> TransportResponse {
    TransportResponse { status, body }
}

/// Fast configuration rooted at `data_dir`: no pacing, millisecond backoff.
pub fn test_config(data_dir: &Path) -> HarvestConfig {
    HarvestConfig {
        base_url: BASE.to_string(),
        request_timeout: Duration::from_secs(2),
        max_retries: 2,
        max_concurrent: 4,
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        data_dir: data_dir.to_path_buf(),
        fetch_only_finished: true,
        save_empty_rounds: false,
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(5),
        proxy_url: None,
    }
}

/// Harvester over `mock` with [`test_config`].
pub fn harvester(mock: &Arc<MockTransport>, data_dir: &Path) -> Harvester {
    Harvester::new(test_config(data_dir), mock.clone()).unwrap()
}

pub fn seasons_path(league: u64) -> String {
    format!("/unique-tournament/{league}/seasons")
}

pub fn round_path(league: u64, season: u64, round: u32) -> String {
    format!("/unique-tournament/{league}/season/{season}/events/round/{round}")
}

pub fn event_path(id: u64, suffix: &str) -> String {
    format!("/event/{id}{suffix}")
}

pub fn seasons_body(ids_and_years: &[(u64, &str)]) -> Value {
    json!({"seasons": ids_and_years
        .iter()
        .map(|(id, year)| json!({"id": id, "name": format!("League {year}"), "year": year}))
        .collect::<Vec<_>>()})
}

/// A round page whose events all have `status_type`.
pub fn round_body(ids: &[u64], status_type: &str) -> Value {
    json!({
        "events": ids.iter().map(|id| json!({
            "id": id,
            "status": {"code": 100, "description": "Ended", "type": status_type}
        })).collect::<Vec<_>>(),
        "hasNextPage": false
    })
}

pub fn basic_body(id: u64, league: u64, season: u64) -> Value {
    json!({"event": {
        "id": id,
        "tournament": {"uniqueTournament": {"id": league, "name": "Premier League"}},
        "season": {"id": season, "name": "Premier League 24/25", "year": "24/25"},
        "roundInfo": {"round": 1},
        "status": {"code": 100, "description": "Ended", "type": "finished"},
        "startTimestamp": 1723834800,
        "homeTeam": {"id": 35, "name": "Manchester United"},
        "awayTeam": {"id": 36, "name": "Fulham"},
        "homeScore": {"period1": 0, "normaltime": 1},
        "awayScore": {"period1": 0, "normaltime": 0}
    }})
}

/// Script Basic for `id` and 404 for every other category.
pub fn with_basic_only(mock: MockTransport, id: u64, league: u64, season: u64) -> MockTransport {
    mock.ok(event_path(id, ""), basic_body(id, league, season))
}
