//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, validate global settings)
//!     → MonitorConfig
//!     → pool factory validates each chain (validation.rs) and builds pools
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → each running pool reloads its chain in place
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - A malformed chain is rejected on its own; the rest keep running

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ChainConfig, CircuitBreakerConfig, EndpointConfig, GlobalSettings, LogFormat, LoggingConfig,
    MonitorConfig, ProbeConfig, ProbeMethod, RateLimitConfig, ServerConfig,
};
pub use validation::{validate_chain, ValidationError};
