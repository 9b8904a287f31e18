//! Endpoint pool subsystem.
//!
//! # Data Flow
//! ```text
//! PoolFactory (factory.rs) validates a chain and builds an EndpointPool
//!     → producer tick: round_robin.rs picks the next endpoint
//!     → job.rs: non-blocking enqueue (full queue skips the tick)
//!     → worker.rs: rate limiter → circuit breaker → probe → metrics
//!         → failure: backoff, resubmit until the retry budget is spent
//! ```
//!
//! # Design Decisions
//! - One queue, breaker and rate limiter per chain
//! - The producer never blocks; backpressure drops the newest job
//! - Rotation state is replaced atomically on reload

pub mod endpoint;
pub mod error;
pub mod factory;
pub mod job;
pub mod registry;
pub mod round_robin;
pub mod strategy;
mod worker;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{validate_chain, ChainConfig, GlobalSettings, ValidationError};
use crate::health::probe::HttpProber;
use crate::observability::PoolMetrics;
use crate::resilience::{BreakerSnapshot, CircuitBreaker, RateLimiter};

pub use endpoint::Endpoint;
pub use error::{PoolError, SubmitError};
pub use factory::{PoolFactory, PoolSet};
pub use job::{Job, JobQueue};
pub use registry::PoolRegistry;
pub use round_robin::RoundRobin;
pub use strategy::{Dispatched, PoolingStrategy};

use worker::Worker;

/// Fallbacks for values a chain may leave unset.
#[derive(Debug, Clone, Copy)]
struct ChainDefaults {
    retry_count: u32,
    retry_backoff: Duration,
    timeout: Duration,
}

/// State swapped as a whole by `reload_config`.
#[derive(Debug)]
struct PoolState {
    rotation: RoundRobin,
    strategy: PoolingStrategy,
    retry_count: u32,
    retry_backoff: Duration,
}

impl PoolState {
    fn resolve(chain: &ChainConfig, defaults: ChainDefaults) -> Result<Self, Vec<ValidationError>> {
        validate_chain(chain)?;

        let mut errors = Vec::new();
        let mut endpoints = Vec::with_capacity(chain.endpoints.len());
        for config in &chain.endpoints {
            match Endpoint::from_config(config, defaults.timeout) {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(e) => errors.push(e),
            }
        }
        let strategy = match chain.pooling_strategy.parse() {
            Ok(strategy) => strategy,
            Err(e) => {
                errors.push(e);
                PoolingStrategy::default()
            }
        };
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            rotation: RoundRobin::new(endpoints),
            strategy,
            retry_count: chain.retry_count.unwrap_or(defaults.retry_count),
            retry_backoff: chain
                .retry_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
        })
    }
}

/// Per-chain polling engine.
#[derive(Debug)]
pub struct EndpointPool {
    network: String,
    chain_id: u64,
    defaults: ChainDefaults,
    state: Mutex<PoolState>,
    /// Rotation for on-demand round-robin dispatch, apart from the producer cursor.
    dispatch_index: AtomicUsize,
    queue: Arc<JobQueue>,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
    prober: Arc<HttpProber>,
    metrics: PoolMetrics,
    tick_interval: Duration,
    snapshot_interval: Duration,
}

impl EndpointPool {
    /// Build a pool for `chain`. Prefer `PoolFactory::create_pool`.
    pub fn new(
        chain: &ChainConfig,
        settings: &GlobalSettings,
        prober: Arc<HttpProber>,
        metrics: PoolMetrics,
    ) -> Result<Self, PoolError> {
        let defaults = ChainDefaults {
            retry_count: settings.max_retries,
            retry_backoff: settings.retry_backoff(),
            timeout: settings.request_timeout(),
        };
        let state = PoolState::resolve(chain, defaults).map_err(|errors| {
            PoolError::InvalidChain {
                network: chain.network.clone(),
                errors,
            }
        })?;

        let breaker = &settings.circuit_breaker;
        let rate_limit = &settings.rate_limit;

        Ok(Self {
            network: chain.network.trim().to_string(),
            chain_id: chain.chain_id,
            defaults,
            queue: Arc::new(JobQueue::new(state.rotation.len())),
            breaker: Arc::new(CircuitBreaker::new(
                breaker.failure_limit,
                Duration::from_secs(breaker.retry_duration_secs),
            )),
            limiter: Arc::new(RateLimiter::new(
                Duration::from_millis(rate_limit.interval_ms),
                rate_limit.burst_size,
            )),
            state: Mutex::new(state),
            dispatch_index: AtomicUsize::new(0),
            prober,
            metrics,
            tick_interval: settings.tick_interval(),
            snapshot_interval: settings.snapshot_interval(),
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn strategy(&self) -> PoolingStrategy {
        self.lock_state().strategy
    }

    pub fn retry_count(&self) -> u32 {
        self.lock_state().retry_count
    }

    pub fn retry_backoff(&self) -> Duration {
        self.lock_state().retry_backoff
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    /// Current endpoint sequence, in rotation order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.lock_state().rotation.endpoints().to_vec()
    }

    pub fn cursor(&self) -> usize {
        self.lock_state().rotation.cursor()
    }

    /// Return the endpoint under the cursor and advance it.
    pub fn next_endpoint(&self) -> Option<Endpoint> {
        self.lock_state().rotation.next_endpoint()
    }

    /// A fresh job for `endpoint` using the current retry settings.
    pub fn new_job(&self, endpoint: Endpoint, cancel: CancellationToken) -> Job {
        let state = self.lock_state();
        Job::new(endpoint, state.retry_count, state.retry_backoff, cancel)
    }

    pub fn try_submit(&self, job: Job) -> Result<(), SubmitError> {
        self.queue.try_submit(job)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Stop accepting jobs; workers drain the rest and exit.
    pub fn close_queue(&self) {
        self.queue.close();
    }

    /// Validate `chain` and swap it in, rewinding the rotation.
    /// Nothing changes when validation fails or `chain` names another
    /// network or chain id.
    pub fn reload_config(&self, chain: &ChainConfig) -> Result<(), PoolError> {
        if chain.network.trim() != self.network || chain.chain_id != self.chain_id {
            return Err(PoolError::IdentityMismatch {
                network: self.network.clone(),
                chain_id: self.chain_id,
                found_network: chain.network.trim().to_string(),
                found_chain_id: chain.chain_id,
            });
        }

        let next = PoolState::resolve(chain, self.defaults).map_err(|errors| {
            PoolError::InvalidChain {
                network: chain.network.clone(),
                errors,
            }
        })?;

        let endpoints = next.rotation.len();
        *self.lock_state() = next;
        tracing::info!(network = %self.network, endpoints, "Pool configuration reloaded");
        Ok(())
    }

    /// Spawn `count` workers consuming this pool's queue.
    pub fn spawn_workers(&self, cancel: &CancellationToken, count: usize) -> JoinSet<()> {
        let mut workers = JoinSet::new();
        for id in 0..count {
            let worker = Worker {
                id,
                queue: self.queue.clone(),
                limiter: self.limiter.clone(),
                breaker: self.breaker.clone(),
                prober: self.prober.clone(),
                metrics: self.metrics.clone(),
            };
            workers.spawn(worker.run(cancel.clone()));
        }
        workers
    }

    /// Run the producer until `cancel` fires.
    ///
    /// Starts the workers and the breaker snapshot logger, then enqueues one
    /// job per tick. Returns the running tasks; the caller closes the queue
    /// and awaits them.
    pub async fn process_endpoints(
        &self,
        cancel: CancellationToken,
        worker_count: usize,
    ) -> JoinSet<()> {
        let mut tasks = self.spawn_workers(&cancel, worker_count);
        self.spawn_snapshot_logger(&mut tasks, cancel.clone());

        tracing::info!(
            network = %self.network,
            chain_id = self.chain_id,
            workers = worker_count,
            tick = ?self.tick_interval,
            "Pool started"
        );

        let mut ticker = time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick(&cancel),
            }
        }

        tracing::info!(network = %self.network, "Pool producer stopped");
        tasks
    }

    /// Spawn `process_endpoints` on the runtime.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken, worker_count: usize) -> PoolTask {
        let pool = self.clone();
        let producer_cancel = cancel.clone();
        let producer =
            tokio::spawn(async move { pool.process_endpoints(producer_cancel, worker_count).await });

        PoolTask {
            pool: self.clone(),
            cancel,
            producer,
        }
    }

    /// Send one on-demand request following the pool's strategy.
    /// The producer cursor is left where it is.
    pub async fn dispatch(&self, body: Option<&str>) -> Result<Dispatched, PoolError> {
        if !self.breaker.allow() {
            return Err(PoolError::BreakerOpen);
        }

        let (strategy, candidates) = {
            let state = self.lock_state();
            let endpoints = state.rotation.endpoints();
            let candidates: Vec<Endpoint> = match state.strategy {
                PoolingStrategy::RoundRobin if !endpoints.is_empty() => {
                    let index = self.dispatch_index.fetch_add(1, Ordering::Relaxed);
                    vec![endpoints[index % endpoints.len()].clone()]
                }
                _ => endpoints.to_vec(),
            };
            (state.strategy, candidates)
        };

        let result =
            strategy::dispatch(strategy, &self.prober, &self.metrics, &candidates, body).await;
        match &result {
            Ok(outcome) => {
                self.breaker.record_success();
                tracing::debug!(network = %self.network, endpoint = %outcome.endpoint, "Dispatch succeeded");
            }
            Err(e) => {
                self.breaker.record_failure();
                tracing::warn!(network = %self.network, strategy = %strategy, error = %e, "Dispatch failed");
            }
        }
        result
    }

    /// Serializable view for the admin surface.
    pub fn status(&self) -> PoolStatus {
        let (strategy, retry_count, endpoints) = {
            let state = self.lock_state();
            (
                state.strategy,
                state.retry_count,
                state.rotation.endpoints().to_vec(),
            )
        };

        PoolStatus {
            network: self.network.clone(),
            chain_id: self.chain_id,
            strategy,
            retry_count,
            queue_len: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            breaker: self.breaker.snapshot(),
            endpoints: endpoints
                .iter()
                .map(|e| EndpointStatus {
                    name: e.name().to_string(),
                    url: e.address().to_string(),
                    timeout_ms: e.timeout().as_millis() as u64,
                    successes: self.metrics.successes(e.name()),
                    failures: self.metrics.failures(e.name()),
                })
                .collect(),
        }
    }

    /// Enqueue a job for the endpoint under the cursor.
    /// The cursor only moves when the job was accepted.
    fn tick(&self, cancel: &CancellationToken) {
        let mut state = self.lock_state();
        let Some(endpoint) = state.rotation.peek().cloned() else {
            return;
        };
        let name = endpoint.name().to_string();
        let job = Job::new(endpoint, state.retry_count, state.retry_backoff, cancel.clone());

        match self.queue.try_submit(job) {
            Ok(()) => state.rotation.advance(),
            Err(e) => {
                drop(state);
                self.metrics.record_submission_dropped(e.reason());
                tracing::warn!(network = %self.network, endpoint = %name, error = %e, "Skipping tick");
            }
        }
    }

    fn spawn_snapshot_logger(&self, tasks: &mut JoinSet<()>, cancel: CancellationToken) {
        let breaker = self.breaker.clone();
        let network = self.network.clone();
        let period = self.snapshot_interval;
        if period.is_zero() {
            return;
        }

        tasks.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = breaker.snapshot();
                        tracing::info!(
                            network = %network,
                            failures = snapshot.failures,
                            successes = snapshot.successes,
                            state = %snapshot.state,
                            "Circuit breaker snapshot"
                        );
                    }
                }
            }
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Handle to a pool started with [`EndpointPool::start`].
#[derive(Debug)]
pub struct PoolTask {
    pool: Arc<EndpointPool>,
    cancel: CancellationToken,
    producer: JoinHandle<JoinSet<()>>,
}

impl PoolTask {
    pub fn pool(&self) -> &Arc<EndpointPool> {
        &self.pool
    }

    /// Cancel the producer, close the queue and wait for every worker.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        let mut tasks = match self.producer.await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::error!(network = %self.pool.network(), error = %e, "Pool producer failed");
                self.pool.close_queue();
                return;
            }
        };
        self.pool.close_queue();

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(network = %self.pool.network(), error = %e, "Pool worker failed");
            }
        }
        tracing::info!(network = %self.pool.network(), "Pool stopped");
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub network: String,
    pub chain_id: u64,
    pub strategy: PoolingStrategy,
    pub retry_count: u32,
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub breaker: BreakerSnapshot,
    pub endpoints: Vec<EndpointStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    pub name: String,
    pub url: String,
    pub timeout_ms: u64,
    pub successes: u64,
    pub failures: u64,
}
