//! Observability metrics
//!
//! Counters and histograms are emitted through the `metrics` facade. They are
//! no-ops until [`init_metrics`] installs the Prometheus exporter, so library
//! code records unconditionally.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

static METRICS_INITIALIZED: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

/// Install the Prometheus exporter on `addr` (serving `/metrics`).
///
/// Idempotent: later calls are ignored.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    let mut initialized = METRICS_INITIALIZED.lock().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Requests sent upstream, labelled by status"
    );
    describe_counter!("http_retries_total", Unit::Count, "Retry attempts scheduled");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "Upstream request latency"
    );
    describe_counter!("store_writes_total", Unit::Count, "Documents written to the store");
    describe_counter!(
        "items_total",
        Unit::Count,
        "Orchestrated items by level and outcome"
    );

    *initialized = true;
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Whether the exporter has been installed.
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.lock().await
}

/// Record one upstream request. `status` is `None` for transport failures.
pub fn record_request(status: Option<u16>, elapsed: Duration) {
    let label = match status {
        Some(code) => code.to_string(),
        None => "network_error".to_string(),
    };
    counter!("http_requests_total", "status" => label).increment(1);
    histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());
}

/// Record a scheduled retry.
pub fn record_retry(kind: &'static str, delay: Duration) {
    counter!("http_retries_total", "kind" => kind).increment(1);
    debug!(kind, delay_ms = delay.as_millis() as u64, "Retry scheduled");
}

/// Record a successful store write.
pub fn record_store_write() {
    counter!("store_writes_total").increment(1);
}

/// Record an orchestrated item reaching a terminal state.
pub fn record_item(level: &'static str, outcome: &'static str) {
    counter!("items_total", "level" => level, "outcome" => outcome).increment(1);
}

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Exporter could not be installed (port in use, recorder already set)
    #[error("failed to install Prometheus exporter: {0}")]
    Install(String),
}
