//! Probe workers.
//!
//! # Per-job flow
//! ```text
//! queue.recv()
//!     → rate limiter (cancel abandons the job)
//!     → circuit breaker (open skips the job)
//!     → probe, record duration and response code
//!     → 2xx: success  |  otherwise: breaker failure, then retry or fail
//! ```
//!
//! # Design Decisions
//! - The retry backoff sleeps on the worker itself and ignores cancellation,
//!   so a backing-off worker takes no other jobs meanwhile
//! - A breaker skip is neither a success nor a failure
//! - A panic while handling a job counts as a failure and the worker survives

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::health::probe::{ProbeError, Prober};
use crate::observability::metrics::{PoolMetrics, NO_RESPONSE};
use crate::pool::job::{Job, JobQueue};
use crate::resilience::{quadratic_backoff, CircuitBreaker, RateLimiter};

/// Everything a worker needs, shared with the rest of its pool.
#[derive(Debug, Clone)]
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) queue: Arc<JobQueue>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) breaker: Arc<CircuitBreaker>,
    pub(crate) prober: Arc<dyn Prober>,
    pub(crate) metrics: PoolMetrics,
}

impl Worker {
    /// Consume jobs until `cancel` fires or the queue is closed and drained.
    pub(crate) async fn run(self, cancel: CancellationToken) {
        tracing::debug!(chain = %self.metrics.chain(), worker = self.id, "Worker started");

        loop {
            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                job = self.queue.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let endpoint = job.endpoint.name().to_string();
            let job_id = job.id;
            if AssertUnwindSafe(self.handle(job)).catch_unwind().await.is_err() {
                tracing::error!(
                    chain = %self.metrics.chain(),
                    worker = self.id,
                    endpoint = %endpoint,
                    job = %job_id,
                    "Job handling panicked; recorded as failure"
                );
                self.metrics.record_failure(&endpoint);
                self.breaker.record_failure();
            }
        }

        tracing::debug!(chain = %self.metrics.chain(), worker = self.id, "Worker stopped");
    }

    async fn handle(&self, mut job: Job) {
        let endpoint = job.endpoint.name().to_string();

        if self.limiter.wait(&job.cancel).await.is_err() {
            tracing::warn!(endpoint = %endpoint, job = %job.id, "Rate limiter wait cancelled, abandoning job");
            return;
        }

        if !self.breaker.allow() {
            tracing::debug!(endpoint = %endpoint, job = %job.id, "Circuit breaker open, skipping probe");
            return;
        }

        let started = Instant::now();
        let result = self.prober.check(&job.endpoint, &job.cancel).await;
        let elapsed = started.elapsed();

        let status = match result {
            Err(ProbeError::Cancelled) => {
                tracing::debug!(endpoint = %endpoint, job = %job.id, "Probe cancelled");
                return;
            }
            Ok(status) => {
                self.metrics.record_response_code(&endpoint, status.as_str());
                Some(status)
            }
            Err(e) => {
                self.metrics.record_response_code(&endpoint, NO_RESPONSE);
                tracing::warn!(endpoint = %endpoint, error = %e, duration = ?elapsed, "Probe error");
                None
            }
        };
        self.metrics.record_duration(&endpoint, elapsed);

        if let Some(status) = status.filter(|s| s.is_success()) {
            self.metrics.record_success(&endpoint);
            self.breaker.record_success();
            tracing::debug!(
                endpoint = %endpoint,
                status = status.as_u16(),
                duration = ?elapsed,
                retries = job.retries,
                "Probe succeeded"
            );
            return;
        }

        self.breaker.record_failure();

        if !job.can_retry() {
            self.metrics.record_failure(&endpoint);
            tracing::warn!(
                endpoint = %endpoint,
                status = ?status.map(|s| s.as_u16()),
                retries = job.retries,
                "Probe failed, retries exhausted"
            );
            return;
        }

        job.retries += 1;
        let backoff = quadratic_backoff(job.retries, job.backoff_base);
        tracing::info!(
            endpoint = %endpoint,
            status = ?status.map(|s| s.as_u16()),
            retry = job.retries,
            backoff = ?backoff,
            "Probe failed, retrying"
        );
        tokio::time::sleep(backoff).await;

        if let Err(e) = self.queue.try_submit(job) {
            self.metrics.record_submission_dropped(e.reason());
            tracing::warn!(endpoint = %endpoint, error = %e, "Dropped retry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use futures_util::future::BoxFuture;
    use reqwest::StatusCode;

    use crate::config::ProbeConfig;
    use crate::health::probe::HttpProber;
    use crate::observability::MetricsRegistry;
    use crate::pool::endpoint::Endpoint;
    use crate::resilience::BreakerState;

    fn worker(queue: Arc<JobQueue>, breaker: Arc<CircuitBreaker>) -> Worker {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        Worker {
            id: 0,
            queue,
            limiter: Arc::new(RateLimiter::new(Duration::from_millis(1), 10)),
            breaker,
            prober: Arc::new(HttpProber::new(&ProbeConfig::default()).unwrap()),
            metrics: PoolMetrics::new("test", registry),
        }
    }

    fn unreachable_endpoint() -> Endpoint {
        // Nothing listens on the discard port locally.
        Endpoint::new(
            "down",
            "http://127.0.0.1:9/".parse().unwrap(),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_open_breaker_skips_without_metrics() {
        let queue = Arc::new(JobQueue::new(1));
        let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(60)));
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        let worker = worker(queue, breaker.clone());
        let job = Job::new(
            unreachable_endpoint(),
            0,
            Duration::ZERO,
            CancellationToken::new(),
        );
        worker.handle(job).await;

        assert_eq!(worker.metrics.failures("down"), 0);
        assert_eq!(worker.metrics.successes("down"), 0);
        assert_eq!(breaker.snapshot().failures, 1);
    }

    #[tokio::test]
    async fn test_cancelled_job_is_abandoned() {
        let queue = Arc::new(JobQueue::new(1));
        let breaker = Arc::new(CircuitBreaker::new(5, Duration::from_secs(60)));
        let worker = worker(queue.clone(), breaker.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();
        worker
            .handle(Job::new(unreachable_endpoint(), 3, Duration::ZERO, cancel))
            .await;

        assert_eq!(worker.metrics.failures("down"), 0);
        assert_eq!(breaker.snapshot().failures, 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_failure_resubmits_until_exhausted() {
        let queue = Arc::new(JobQueue::new(1));
        let breaker = Arc::new(CircuitBreaker::new(10, Duration::from_secs(60)));
        let worker = worker(queue.clone(), breaker.clone());

        let job = Job::new(
            unreachable_endpoint(),
            1,
            Duration::from_millis(5),
            CancellationToken::new(),
        );
        worker.handle(job).await;

        // First failure goes back on the queue with one retry used.
        let retried = queue.recv().await.unwrap();
        assert_eq!(retried.retries, 1);
        assert_eq!(worker.metrics.failures("down"), 0);

        worker.handle(retried).await;
        assert!(queue.is_empty());
        assert_eq!(worker.metrics.failures("down"), 1);
        assert_eq!(breaker.snapshot().failures, 2);
    }

    /// Panics on its first check, answers 200 afterwards.
    #[derive(Debug, Default)]
    struct FlakyProber {
        calls: AtomicU32,
    }

    impl Prober for FlakyProber {
        fn check<'a>(
            &'a self,
            _endpoint: &'a Endpoint,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<StatusCode, ProbeError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if call == 0 {
                    panic!("unexpected failure");
                }
                Ok(StatusCode::OK)
            })
        }
    }

    #[tokio::test]
    async fn test_panicking_job_counts_as_failure() {
        let queue = Arc::new(JobQueue::new(2));
        let breaker = Arc::new(CircuitBreaker::new(5, Duration::from_secs(60)));
        let mut worker = worker(queue.clone(), breaker.clone());
        worker.prober = Arc::new(FlakyProber::default());
        let metrics = worker.metrics.clone();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        let job = |retries| {
            Job::new(
                unreachable_endpoint(),
                retries,
                Duration::ZERO,
                CancellationToken::new(),
            )
        };
        queue.try_submit(job(3)).unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while metrics.failures("down") == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(metrics.failures("down"), 1);
        assert_eq!(breaker.snapshot().failures, 1);
        // A panic is not retried.
        assert!(queue.is_empty());

        // The same worker keeps serving.
        queue.try_submit(job(0)).unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while metrics.successes("down") == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(metrics.successes("down"), 1);
        assert!(!handle.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_worker_stops_when_queue_closes() {
        let queue = Arc::new(JobQueue::new(1));
        let breaker = Arc::new(CircuitBreaker::new(5, Duration::from_secs(60)));
        let handle = tokio::spawn(worker(queue.clone(), breaker).run(CancellationToken::new()));

        queue.close();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
