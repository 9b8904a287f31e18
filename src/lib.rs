//! chain-view: multi-chain RPC endpoint poller.
//!
//! # Architecture Overview
//!
//! ```text
//!   config ──▶ PoolFactory ──▶ EndpointPool (one per chain)
//!                                 │
//!                 tick ──▶ JobQueue ──▶ Workers ──▶ RateLimiter ──▶ CircuitBreaker ──▶ probe
//!                                 ▲                                                      │
//!                                 └──────────── retry with backoff ◀─────────────────────┘
//!
//!   observability: tracing logs, Prometheus metrics
//!   admin: /healthz/{health,ready,start,level,metrics,pools}
//! ```

// Core subsystems
pub mod config;
pub mod health;
pub mod pool;

// Surfaces
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::MonitorConfig;
pub use http::AdminServer;
pub use lifecycle::Shutdown;
pub use pool::{EndpointPool, PoolFactory, PoolRegistry};
