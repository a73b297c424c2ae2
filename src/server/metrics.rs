//! Request instrumentation and the Prometheus text exposition served at `/metrics`.
//!
//! Every request passing through [`track`] is counted by handler, method and status class,
//! and its latency lands in a per-handler histogram. The middleware only observes; the
//! response it returns is the one the inner service produced.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

/// Handler label for requests that matched no route.
pub const UNMATCHED_HANDLER: &str = "none";

/// Method label for anything outside the standard HTTP methods.
pub const OTHER_METHOD: &str = "other";

/// Content type of the text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Upper bounds (seconds) of the latency buckets.
const LATENCY_BUCKETS: [f64; 12] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Latency histogram with fixed buckets.
#[derive(Debug)]
pub struct Histogram {
    buckets: [AtomicU64; LATENCY_BUCKETS.len()],
    sum_nanos: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Empty histogram over the standard latency buckets.
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_nanos: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Add one observation.
    pub fn observe(&self, value: Duration) {
        let seconds = value.as_secs_f64();

        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        self.sum_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (le, bucket) in LATENCY_BUCKETS.iter().zip(&self.buckets) {
            if seconds <= *le {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of all observations, in seconds.
    pub fn sum_seconds(&self) -> f64 {
        self.sum_nanos.load(Ordering::Relaxed) as f64 / 1_000_000_000.0
    }

    /// Cumulative count for the bucket bounded by `le`, if such a bucket exists.
    pub fn bucket_count(&self, le: f64) -> Option<u64> {
        LATENCY_BUCKETS
            .iter()
            .position(|b| (b - le).abs() < 1e-9)
            .map(|i| self.buckets[i].load(Ordering::Relaxed))
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Requests currently being handled.
#[derive(Debug, Default)]
pub struct InProgress(AtomicI64);

impl InProgress {
    /// Current value.
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Counts the request until the guard drops, including on early return or panic unwind.
    pub fn enter(&self) -> InProgressGuard<'_> {
        self.0.fetch_add(1, Ordering::Relaxed);
        InProgressGuard(self)
    }
}

/// Decrements [`InProgress`] on drop.
pub struct InProgressGuard<'a>(&'a InProgress);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        (self.0).0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RequestKey {
    handler: String,
    method: String,
    status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RouteKey {
    handler: String,
    method: String,
}

/// Registry for HTTP and prediction metrics.
#[derive(Debug, Default)]
pub struct HttpMetrics {
    requests: Mutex<BTreeMap<RequestKey, u64>>,
    durations: Mutex<BTreeMap<RouteKey, Arc<Histogram>>>,
    predictions: Mutex<BTreeMap<String, u64>>,
    /// Requests currently inside the middleware.
    pub in_progress: InProgress,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // Counters stay usable even if a panicking thread held the lock.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Status codes are grouped into classes to keep label cardinality bounded.
fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

const STANDARD_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "CONNECT", "TRACE",
];

/// Clients pick the method freely; only the standard ones get their own series.
fn method_label(method: &Method) -> &'static str {
    STANDARD_METHODS
        .into_iter()
        .find(|m| *m == method.as_str())
        .unwrap_or(OTHER_METHOD)
}

impl HttpMetrics {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished request.
    pub fn observe(&self, handler: &str, method: &str, status: StatusCode, elapsed: Duration) {
        let key = RequestKey {
            handler: handler.to_owned(),
            method: method.to_owned(),
            status: status_class(status),
        };
        *lock(&self.requests).entry(key).or_insert(0) += 1;

        let histogram = Arc::clone(
            lock(&self.durations)
                .entry(RouteKey {
                    handler: handler.to_owned(),
                    method: method.to_owned(),
                })
                .or_default(),
        );
        histogram.observe(elapsed);
    }

    /// Record the label of a prediction returned to a client.
    pub fn record_prediction(&self, label: &str) {
        *lock(&self.predictions).entry(label.to_owned()).or_insert(0) += 1;
    }

    /// Requests seen for `handler`/`method` with a status in `status`'s class.
    pub fn requests_total(&self, handler: &str, method: &str, status: StatusCode) -> u64 {
        let key = RequestKey {
            handler: handler.to_owned(),
            method: method.to_owned(),
            status: status_class(status),
        };
        lock(&self.requests).get(&key).copied().unwrap_or(0)
    }

    /// Predictions returned with `label`.
    pub fn predictions_total(&self, label: &str) -> u64 {
        lock(&self.predictions).get(label).copied().unwrap_or(0)
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP http_requests_total Total number of requests by method, status and handler.\n");
        output.push_str("# TYPE http_requests_total counter\n");
        for (key, count) in lock(&self.requests).iter() {
            let _ = writeln!(
                output,
                "http_requests_total{{handler=\"{}\",method=\"{}\",status=\"{}\"}} {}",
                escape_label(&key.handler),
                key.method,
                key.status,
                count
            );
        }

        output.push_str("# HELP http_request_duration_seconds Latency with only few buckets by handler.\n");
        output.push_str("# TYPE http_request_duration_seconds histogram\n");
        for (key, histogram) in lock(&self.durations).iter() {
            let labels = format!(
                "handler=\"{}\",method=\"{}\"",
                escape_label(&key.handler),
                key.method
            );
            for (le, bucket) in LATENCY_BUCKETS.iter().zip(&histogram.buckets) {
                let _ = writeln!(
                    output,
                    "http_request_duration_seconds_bucket{{{labels},le=\"{le}\"}} {}",
                    bucket.load(Ordering::Relaxed)
                );
            }
            let _ = writeln!(
                output,
                "http_request_duration_seconds_bucket{{{labels},le=\"+Inf\"}} {}",
                histogram.count()
            );
            let _ = writeln!(
                output,
                "http_request_duration_seconds_sum{{{labels}}} {}",
                histogram.sum_seconds()
            );
            let _ = writeln!(
                output,
                "http_request_duration_seconds_count{{{labels}}} {}",
                histogram.count()
            );
        }

        output.push_str("# HELP http_requests_inprogress Number of HTTP requests in progress.\n");
        output.push_str("# TYPE http_requests_inprogress gauge\n");
        let _ = writeln!(output, "http_requests_inprogress {}", self.in_progress.get());

        output.push_str("# HELP sentiment_predictions_total Predictions returned by label.\n");
        output.push_str("# TYPE sentiment_predictions_total counter\n");
        for (label, count) in lock(&self.predictions).iter() {
            let _ = writeln!(
                output,
                "sentiment_predictions_total{{label=\"{}\"}} {}",
                escape_label(label),
                count
            );
        }

        output
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Middleware recording count and latency of every request.
pub async fn track(State(metrics): State<Arc<HttpMetrics>>, req: Request, next: Next) -> Response {
    let handler = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_HANDLER.to_owned());
    let method = method_label(req.method());

    let start = Instant::now();
    let response = {
        let _in_progress = metrics.in_progress.enter();
        next.run(req).await
    };

    metrics.observe(&handler, method, response.status(), start.elapsed());
    response
}
