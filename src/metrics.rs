//! Prometheus metrics for application observability.
//!
//! Metrics are emitted through the `metrics` facade and rendered by the
//! Prometheus recorder on `GET /metrics`.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `http_requests_total` - Requests (labels: method, path, status_code)
//! - `http_error_requests_total` - Requests with status >= 400 (same labels)
//! - `http_response_status_total` - Responses by status (label: status_code)
//! - `http_rate_limited_requests_total` - Requests rejected by the limiter
//! - `ip_lookup_errors_total` - Failed lookups (labels: backend, kind)
//!
//! ## Histograms
//! - `http_request_duration_seconds` - Request duration (labels: method, path, status_code)
//! - `ip_lookup_duration_seconds` - Provider lookup duration (label: backend)
//!
//! ## Gauges
//! - `http_requests_in_flight` - Requests currently being served
//!
//! Alongside the exported series, [`HttpMetrics`] keeps process-local atomic
//! aggregates so the request pipeline can be observed without a scraper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::lookup::BackendKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_ERROR_REQUESTS_TOTAL: &str = "http_error_requests_total";
    pub const HTTP_RESPONSE_STATUS_TOTAL: &str = "http_response_status_total";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";
    pub const HTTP_RATE_LIMITED_REQUESTS_TOTAL: &str = "http_rate_limited_requests_total";
    pub const IP_LOOKUP_DURATION_SECONDS: &str = "ip_lookup_duration_seconds";
    pub const IP_LOOKUP_ERRORS_TOTAL: &str = "ip_lookup_errors_total";
}

/// Histogram buckets (seconds) shared by request and lookup durations.
const DURATION_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Install the global Prometheus recorder and describe all metrics.
///
/// Call once at startup. The returned handle renders the exposition text.
///
/// # Errors
///
/// Returns [`BuildError`] if a recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )?
        .install_recorder()?;

    describe_histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_counter!(names::HTTP_REQUESTS_TOTAL, "Total number of HTTP requests");
    describe_counter!(
        names::HTTP_ERROR_REQUESTS_TOTAL,
        "Total number of HTTP error requests (4xx, 5xx)"
    );
    describe_counter!(
        names::HTTP_RESPONSE_STATUS_TOTAL,
        "Total number of HTTP responses by status code"
    );
    describe_gauge!(
        names::HTTP_REQUESTS_IN_FLIGHT,
        "Number of HTTP requests currently in flight"
    );
    describe_counter!(
        names::HTTP_RATE_LIMITED_REQUESTS_TOTAL,
        "Total number of HTTP requests that were rate limited"
    );
    describe_histogram!(
        names::IP_LOOKUP_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Duration of IP lookup in seconds"
    );
    describe_counter!(
        names::IP_LOOKUP_ERRORS_TOTAL,
        "Total number of IP lookup errors"
    );

    info!("Prometheus recorder installed");
    Ok(handle)
}

// =============================================================================
// Lookup Metrics
// =============================================================================

/// Record the duration of one provider lookup.
pub fn record_lookup(backend: BackendKind, duration_secs: f64) {
    histogram!(names::IP_LOOKUP_DURATION_SECONDS, "backend" => backend.as_str())
        .record(duration_secs);
}

/// Record a failed provider lookup.
pub fn record_lookup_error(backend: BackendKind, kind: &'static str) {
    counter!(names::IP_LOOKUP_ERRORS_TOTAL, "backend" => backend.as_str(), "kind" => kind)
        .increment(1);
}

// =============================================================================
// HTTP Metrics Collector
// =============================================================================

/// One finished request, as seen by the metrics stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSample {
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration: Duration,
}

impl RequestSample {
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

/// Aggregates for the HTTP pipeline.
///
/// Every update goes both to the exported series and to the local atomics.
#[derive(Debug, Default)]
pub struct HttpMetrics {
    in_flight: AtomicI64,
    requests_total: AtomicU64,
    error_requests: AtomicU64,
    rate_limited: AtomicU64,
    by_status: Mutex<HashMap<u16, u64>>,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a request as in flight until the returned guard is dropped.
    ///
    /// The guard also fires when the request future is cancelled, so the
    /// gauge cannot leak on client disconnects.
    pub fn start_request(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
        InFlightGuard {
            metrics: Arc::clone(self),
        }
    }

    /// Record a finished request.
    pub fn record(&self, sample: &RequestSample) {
        let method = sample.method.clone();
        let path = sample.path.clone();
        let status = sample.status_code.to_string();

        histogram!(
            names::HTTP_REQUEST_DURATION_SECONDS,
            "method" => method.clone(),
            "path" => path.clone(),
            "status_code" => status.clone()
        )
        .record(sample.duration.as_secs_f64());
        counter!(
            names::HTTP_REQUESTS_TOTAL,
            "method" => method.clone(),
            "path" => path.clone(),
            "status_code" => status.clone()
        )
        .increment(1);
        counter!(names::HTTP_RESPONSE_STATUS_TOTAL, "status_code" => status.clone()).increment(1);
        self.requests_total.fetch_add(1, Ordering::SeqCst);

        if sample.is_error() {
            counter!(
                names::HTTP_ERROR_REQUESTS_TOTAL,
                "method" => method,
                "path" => path,
                "status_code" => status
            )
            .increment(1);
            self.error_requests.fetch_add(1, Ordering::SeqCst);
        }

        let mut by_status = self.by_status.lock().unwrap_or_else(PoisonError::into_inner);
        *by_status.entry(sample.status_code).or_default() += 1;
    }

    /// Record a request rejected by admission control.
    pub fn record_rate_limited(&self) {
        counter!(names::HTTP_RATE_LIMITED_REQUESTS_TOTAL).increment(1);
        self.rate_limited.fetch_add(1, Ordering::SeqCst);
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::SeqCst)
    }

    pub fn error_requests(&self) -> u64 {
        self.error_requests.load(Ordering::SeqCst)
    }

    pub fn rate_limited(&self) -> u64 {
        self.rate_limited.load(Ordering::SeqCst)
    }

    /// Number of finished requests that ended with `status_code`.
    pub fn requests_with_status(&self, status_code: u16) -> u64 {
        self.by_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&status_code)
            .copied()
            .unwrap_or(0)
    }

    fn finish_request(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

/// Decrements the in-flight gauge on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    metrics: Arc<HttpMetrics>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics.finish_request();
    }
}
