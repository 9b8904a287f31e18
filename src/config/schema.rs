//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the monitor.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the endpoint monitor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// Admin/health server settings.
    pub server: ServerConfig,

    /// Chains to monitor, one endpoint pool each.
    pub chains: Vec<ChainConfig>,

    /// Settings shared by every pool.
    pub global_settings: GlobalSettings,
}

/// Admin server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the health/metrics server.
    pub bind_address: String,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Seconds to wait for pools to drain on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            logging: LoggingConfig::default(),
            shutdown_grace_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// A single chain and the endpoints serving it.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ChainConfig {
    /// Numeric chain identifier (must be non-zero).
    pub chain_id: u64,

    /// Network name, used as the `chain` metric label.
    pub network: String,

    /// Pooling strategy tag: `round_robin`, `fastest` or `retry_with_next`.
    /// Empty means `round_robin`.
    pub pooling_strategy: String,

    /// Max re-attempts per job. Falls back to `global_settings.max_retries`.
    pub retry_count: Option<u32>,

    /// Backoff base in milliseconds. Falls back to `global_settings.retry_backoff_ms`.
    pub retry_backoff_ms: Option<u64>,

    /// Endpoints in round-robin order.
    pub endpoints: Vec<EndpointConfig>,
}

/// Endpoint definition.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EndpointConfig {
    /// Unique name within the chain, used as the `endpoint` metric label.
    pub name: String,

    /// Absolute http(s) URL of the endpoint.
    #[serde(alias = "address")]
    pub url: String,

    /// Per-probe timeout in milliseconds. Falls back to `global_settings.request_timeout_ms`.
    pub timeout_ms: Option<u64>,
}

/// Settings shared by all pools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Default probe timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Default max re-attempts per job.
    pub max_retries: u32,

    /// Workers per pool.
    pub max_workers: usize,

    /// Default backoff base in milliseconds.
    pub retry_backoff_ms: u64,

    /// Producer tick interval in milliseconds.
    pub tick_interval_ms: u64,

    /// Interval between circuit breaker snapshot log lines, in seconds.
    pub snapshot_interval_secs: u64,

    /// Per-pool rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Per-pool circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Shape of the outbound probe request.
    pub probe: ProbeConfig,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            max_retries: 3,
            max_workers: 4,
            retry_backoff_ms: 1_000,
            tick_interval_ms: 1_000,
            snapshot_interval_secs: 30,
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl GlobalSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Milliseconds between token refills (one token per interval).
    pub interval_ms: u64,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            burst_size: 5,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_limit: u32,

    /// Seconds the breaker stays open before going half-open.
    pub retry_duration_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_limit: 5,
            retry_duration_secs: 30,
        }
    }
}

/// HTTP method used for probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    #[default]
    Get,
    Post,
}

/// Probe request configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProbeConfig {
    pub method: ProbeMethod,

    /// JSON body sent with POST probes.
    pub body: Option<String>,
}
