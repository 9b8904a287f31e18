//! Metrics collection and exposition.
//!
//! # Metrics
//! - `job_successes_total` (counter): jobs whose probe answered 2xx, by chain, endpoint
//! - `job_failures_total` (counter): jobs that failed after exhausting retries, by chain, endpoint
//! - `http_response_codes_total` (counter): every probe attempt, by chain, endpoint, code
//! - `response_duration_seconds` (histogram): probe latency, by chain, endpoint
//! - `job_submissions_dropped_total` (counter): jobs dropped by backpressure, by chain, reason
//!
//! # Design Decisions
//! - The recorder is owned by a `MetricsRegistry` value, never installed
//!   globally; pools record through it with a local recorder scope
//! - Registries are cheap to create, so every test gets its own
//! - Without a global install nothing drains histograms on its own, so the
//!   process runs `spawn_upkeep` alongside the pools

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const JOB_SUCCESSES: &str = "job_successes_total";
pub const JOB_FAILURES: &str = "job_failures_total";
pub const HTTP_RESPONSE_CODES: &str = "http_response_codes_total";
pub const RESPONSE_DURATION: &str = "response_duration_seconds";
pub const SUBMISSIONS_DROPPED: &str = "job_submissions_dropped_total";

/// Response-code label used when the probe got no HTTP response at all.
pub const NO_RESPONSE: &str = "no_response";

/// How often recorded histogram samples are folded into their buckets.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Histogram buckets tuned for RPC latencies.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Owns a Prometheus recorder and renders its exposition text.
pub struct MetricsRegistry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(RESPONSE_DURATION.to_string()),
                DURATION_BUCKETS,
            )?
            .build_recorder();
        let handle = recorder.handle();

        let registry = Self { recorder, handle };
        registry.scoped(|| {
            describe_counter!(JOB_SUCCESSES, "Jobs whose probe answered with a 2xx status");
            describe_counter!(JOB_FAILURES, "Jobs that failed after exhausting their retries");
            describe_counter!(HTTP_RESPONSE_CODES, "Probe attempts by HTTP status code");
            describe_histogram!(RESPONSE_DURATION, Unit::Seconds, "Probe response time");
            describe_counter!(SUBMISSIONS_DROPPED, "Job submissions dropped by backpressure");
        });
        Ok(registry)
    }

    /// Run `f` with this registry as the active recorder.
    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(&self.recorder, f)
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Fold pending histogram samples into their buckets.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }

    /// Run upkeep every `period` until `cancel` fires.
    pub fn spawn_upkeep(
        self: &Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => registry.run_upkeep(),
                }
            }
            tracing::debug!("Metrics upkeep stopped");
        })
    }

    /// Sum of all series of counter `name` whose labels include `labels`.
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let rendered = self.render();
        let prefix = format!("{}{{", name);
        let wanted: Vec<String> = labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect();

        rendered
            .lines()
            .filter(|line| line.starts_with(&prefix))
            .filter(|line| wanted.iter().all(|label| line.contains(label.as_str())))
            .filter_map(|line| line.rsplit(' ').next()?.parse::<f64>().ok())
            .reduce(|a, b| a + b)
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

/// Metrics binding of one pool: every series carries the pool's chain label.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    chain: String,
    registry: Arc<MetricsRegistry>,
}

impl PoolMetrics {
    pub fn new(chain: impl Into<String>, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            chain: chain.into(),
            registry,
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    pub fn record_success(&self, endpoint: &str) {
        self.registry.scoped(|| {
            counter!(JOB_SUCCESSES, "chain" => self.chain.clone(), "endpoint" => endpoint.to_string())
                .increment(1);
        });
    }

    pub fn record_failure(&self, endpoint: &str) {
        self.registry.scoped(|| {
            counter!(JOB_FAILURES, "chain" => self.chain.clone(), "endpoint" => endpoint.to_string())
                .increment(1);
        });
    }

    pub fn record_response_code(&self, endpoint: &str, code: &str) {
        self.registry.scoped(|| {
            counter!(
                HTTP_RESPONSE_CODES,
                "chain" => self.chain.clone(),
                "endpoint" => endpoint.to_string(),
                "code" => code.to_string()
            )
            .increment(1);
        });
    }

    pub fn record_duration(&self, endpoint: &str, elapsed: Duration) {
        self.registry.scoped(|| {
            histogram!(RESPONSE_DURATION, "chain" => self.chain.clone(), "endpoint" => endpoint.to_string())
                .record(elapsed.as_secs_f64());
        });
    }

    pub fn record_submission_dropped(&self, reason: &'static str) {
        self.registry.scoped(|| {
            counter!(SUBMISSIONS_DROPPED, "chain" => self.chain.clone(), "reason" => reason)
                .increment(1);
        });
    }

    /// Successful jobs recorded for `endpoint`.
    pub fn successes(&self, endpoint: &str) -> u64 {
        self.value(JOB_SUCCESSES, endpoint)
    }

    /// Terminally failed jobs recorded for `endpoint`.
    pub fn failures(&self, endpoint: &str) -> u64 {
        self.value(JOB_FAILURES, endpoint)
    }

    fn value(&self, name: &str, endpoint: &str) -> u64 {
        self.registry
            .counter_value(name, &[("chain", &self.chain), ("endpoint", endpoint)])
            .unwrap_or(0.0) as u64
    }
}
