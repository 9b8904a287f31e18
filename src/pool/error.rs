//! Pool error types.

use thiserror::Error;

use crate::config::loader::join_errors;
use crate::config::ValidationError;

/// Why a job could not be put on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("job queue is full")]
    Full,

    #[error("job queue is closed")]
    Closed,
}

impl SubmitError {
    /// Label used for `job_submissions_dropped_total`.
    pub fn reason(&self) -> &'static str {
        match self {
            SubmitError::Full => "queue_full",
            SubmitError::Closed => "queue_closed",
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid configuration for chain '{network}': {}", join_errors(.errors))]
    InvalidChain {
        network: String,
        errors: Vec<ValidationError>,
    },

    #[error("duplicate network '{0}'")]
    DuplicateNetwork(String),

    #[error("reload for '{found_network}' (chain id {found_chain_id}) does not match pool '{network}' (chain id {chain_id})")]
    IdentityMismatch {
        network: String,
        chain_id: u64,
        found_network: String,
        found_chain_id: u64,
    },

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("circuit breaker is open")]
    BreakerOpen,

    #[error("all {attempted} endpoint(s) failed")]
    AllEndpointsFailed { attempted: usize },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
