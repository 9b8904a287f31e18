//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace and timeout layers)
//!     → admin routes (health, readiness, metrics, pools)
//!     → Send to client
//! ```

pub mod server;

pub use server::{AdminServer, AppState};
