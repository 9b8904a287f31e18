//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Build pools → Serve admin → Start pools → Mark started
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Cancel producers → Close queues → Await workers → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Zero usable pools is fatal at startup
//! - Shutdown has a grace period: stragglers are abandoned after it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start_pools, Readiness};
