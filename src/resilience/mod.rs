//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Job taken by a worker:
//!     → rate_limiter.rs (wait for a token, or give up on cancellation)
//!     → circuit_breaker.rs (skip the probe while open)
//!     → probe
//!     → On failure: backoff.rs (sleep retries² × base, then resubmit)
//! ```
//!
//! # Design Decisions
//! - Every probe has a deadline (the endpoint timeout)
//! - Limiter and breaker are per pool, shared by its workers
//! - Circuit breaker prevents hammering a failing endpoint set

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limiter;

pub use backoff::quadratic_backoff;
pub use circuit_breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use rate_limiter::{RateLimitError, RateLimiter};
