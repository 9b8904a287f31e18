//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Worker takes a job
//!     → probe.rs sends one bounded request to the endpoint
//!     → status code / timeout / transport error back to the worker
//!     → worker updates the circuit breaker and metrics
//! ```
//!
//! # Design Decisions
//! - One HTTP client shared by every pool
//! - Health is judged per pool (breaker), counted per endpoint (metrics)

pub mod probe;

pub use probe::{HttpProber, ProbeError, Prober};
