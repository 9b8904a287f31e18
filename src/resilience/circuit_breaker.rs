//! Circuit breaker guarding whether probes are attempted.
//!
//! # States
//! - Closed: normal operation, probes pass through
//! - Open: endpoint set assumed down, probes are skipped
//! - Half-Open: probes resume to test whether the endpoints recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures >= failure_limit
//! Open → Half-Open: retry_duration after opening (timer task owned by the breaker)
//! Half-Open → Closed: a probe succeeds
//! Half-Open → Open: a probe fails
//! ```
//!
//! # Design Decisions
//! - One breaker per pool, shared by all of its workers
//! - The open → half-open timer is tagged with a generation; a timer from an
//!   earlier opening never flips a breaker that has since moved on
//! - Must be driven from inside a Tokio runtime (the timer is a spawned task)

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Read-only view of the breaker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub failures: u32,
    pub successes: u64,
    pub state: BreakerState,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failures: u32,
    successes: u64,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl BreakerInner {
    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

/// Three-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Arc<RwLock<BreakerInner>>,
    failure_limit: u32,
    retry_duration: Duration,
}

impl CircuitBreaker {
    /// Create a closed breaker. A zero `failure_limit` is raised to one.
    pub fn new(failure_limit: u32, retry_duration: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BreakerInner {
                state: BreakerState::Closed,
                failures: 0,
                successes: 0,
                generation: 0,
                pending: None,
            })),
            failure_limit: failure_limit.max(1),
            retry_duration,
        }
    }

    pub fn failure_limit(&self) -> u32 {
        self.failure_limit
    }

    pub fn retry_duration(&self) -> Duration {
        self.retry_duration
    }

    /// Whether a probe may be attempted right now.
    pub fn allow(&self) -> bool {
        self.read().state != BreakerState::Open
    }

    pub fn state(&self) -> BreakerState {
        self.read().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.read();
        BreakerSnapshot {
            failures: inner.failures,
            successes: inner.successes,
            state: inner.state,
        }
    }

    /// Report a successful probe.
    pub fn record_success(&self) {
        let mut inner = self.write();
        inner.successes += 1;
        inner.failures = 0;

        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Closed;
            inner.cancel_pending();
            tracing::info!(successes = inner.successes, "Circuit breaker closed");
        }
    }

    /// Report a failed probe.
    pub fn record_failure(&self) {
        let mut inner = self.write();
        inner.failures = inner.failures.saturating_add(1);

        let state = inner.state;
        match state {
            BreakerState::Closed if inner.failures >= self.failure_limit => {
                self.open(&mut inner);
            }
            BreakerState::HalfOpen => {
                // Any failure while probing recovery reopens.
                self.open(&mut inner);
            }
            _ => {}
        }
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = BreakerState::Open;
        inner.generation += 1;
        inner.cancel_pending();
        inner.pending = self.schedule_half_open(inner.generation);

        tracing::warn!(
            failures = inner.failures,
            retry_after = ?self.retry_duration,
            "Circuit breaker opened"
        );
    }

    fn schedule_half_open(&self, generation: u64) -> Option<JoinHandle<()>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::error!("Circuit breaker opened outside a Tokio runtime; it will not recover on its own");
                return None;
            }
        };

        let inner: Weak<RwLock<BreakerInner>> = Arc::downgrade(&self.inner);
        let delay = self.retry_duration;

        Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut inner = write_lock(&inner);
            if inner.state == BreakerState::Open && inner.generation == generation {
                inner.state = BreakerState::HalfOpen;
                inner.pending = None;
                tracing::info!(failures = inner.failures, "Circuit breaker half-open");
            }
        }))
    }

    fn read(&self) -> RwLockReadGuard<'_, BreakerInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BreakerInner> {
        write_lock(&self.inner)
    }
}

fn write_lock(lock: &RwLock<BreakerInner>) -> RwLockWriteGuard<'_, BreakerInner> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        self.write().cancel_pending();
    }
}
