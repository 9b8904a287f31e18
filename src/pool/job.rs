//! Jobs and the bounded queue carrying them.
//!
//! # Design Decisions
//! - Submission never blocks: a full queue rejects the job
//! - Closing drops the only sender, so workers drain what is left and stop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::pool::endpoint::Endpoint;
use crate::pool::error::SubmitError;

/// One scheduled probe attempt, possibly resubmitted on failure.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub endpoint: Endpoint,
    /// Attempts already retried.
    pub retries: u32,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub cancel: CancellationToken,
}

impl Job {
    pub fn new(
        endpoint: Endpoint,
        max_retries: u32,
        backoff_base: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint,
            retries: 0,
            max_retries,
            backoff_base,
            cancel,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retries < self.max_retries
    }
}

/// Bounded multi-consumer job queue.
#[derive(Debug)]
pub struct JobQueue {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Job>>,
    capacity: usize,
    pending: AtomicUsize,
}

impl JobQueue {
    /// A zero `capacity` is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            capacity,
            pending: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs waiting to be picked up.
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.sender().is_none()
    }

    /// Enqueue without waiting.
    pub fn try_submit(&self, job: Job) -> Result<(), SubmitError> {
        let guard = self.sender();
        let tx = guard.as_ref().ok_or(SubmitError::Closed)?;

        // Counted before sending so a fast receiver never sees it go negative.
        self.pending.fetch_add(1, Ordering::AcqRel);
        let result = match tx.try_send(job) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(_)) => Err(SubmitError::Full),
            Err(TrySendError::Closed(_)) => Err(SubmitError::Closed),
        };
        self.pending.fetch_sub(1, Ordering::AcqRel);
        result
    }

    /// Next job, or `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<Job> {
        let job = self.rx.lock().await.recv().await?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Some(job)
    }

    /// Stop accepting jobs. Idempotent.
    pub fn close(&self) {
        if self.sender().take().is_some() {
            tracing::debug!("Job queue closed");
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::Sender<Job>>> {
        match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str) -> Job {
        let endpoint = Endpoint::new(
            name,
            "http://127.0.0.1:8545".parse().unwrap(),
            Duration::from_secs(1),
        );
        Job::new(endpoint, 2, Duration::from_millis(10), CancellationToken::new())
    }

    #[test]
    fn test_job_retry_budget() {
        let mut job = job("a");
        assert!(job.can_retry());
        job.retries = 2;
        assert!(!job.can_retry());
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let queue = JobQueue::new(2);
        queue.try_submit(job("a")).unwrap();
        queue.try_submit(job("b")).unwrap();
        assert_eq!(queue.try_submit(job("c")), Err(SubmitError::Full));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.recv().await.unwrap().endpoint.name(), "a");
        assert_eq!(queue.len(), 1);
        queue.try_submit(job("c")).unwrap();
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = JobQueue::new(4);
        queue.try_submit(job("a")).unwrap();
        queue.close();
        queue.close();

        assert!(queue.is_closed());
        assert_eq!(queue.try_submit(job("b")), Err(SubmitError::Closed));
        assert_eq!(queue.recv().await.unwrap().endpoint.name(), "a");
        assert!(queue.recv().await.is_none());
    }

    #[test]
    fn test_zero_capacity_raised() {
        assert_eq!(JobQueue::new(0).capacity(), 1);
    }
}
