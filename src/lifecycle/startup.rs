//! Startup orchestration.
//!
//! # Responsibilities
//! - Track startup and readiness for the health endpoints
//! - Register and start every pool
//!
//! # Design Decisions
//! - Started means every pool was launched; ready means at least one runs
//! - The admin server binds before pools start, so probes see 503 first

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::pool::{EndpointPool, PoolRegistry, PoolTask};

/// Startup and readiness flags shared with the admin surface.
#[derive(Debug, Default)]
pub struct Readiness {
    started: AtomicBool,
    running_pools: AtomicUsize,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn set_running_pools(&self, count: usize) {
        self.running_pools.store(count, Ordering::Release);
    }

    pub fn running_pools(&self) -> usize {
        self.running_pools.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.running_pools() > 0
    }
}

/// Register `pools` and start each with `worker_count` workers.
pub fn start_pools(
    pools: Vec<Arc<EndpointPool>>,
    registry: &PoolRegistry,
    readiness: &Readiness,
    cancel: &CancellationToken,
    worker_count: usize,
) -> Vec<PoolTask> {
    let tasks: Vec<PoolTask> = pools
        .into_iter()
        .map(|pool| {
            registry.insert(pool.clone());
            pool.start(cancel.child_token(), worker_count)
        })
        .collect();

    readiness.set_running_pools(tasks.len());
    readiness.mark_started();
    tracing::info!(pools = tasks.len(), workers = worker_count, "Startup complete");
    tasks
}
