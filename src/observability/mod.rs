//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pools and workers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → /healthz/metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are owned values handed to pools, not global statics

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogLevelHandle, LoggingError};
pub use metrics::{MetricsRegistry, PoolMetrics};
