//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Global settings are checked when the file is loaded
//! - Chains are checked one at a time, so a bad chain never takes the others down
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: config → Result<(), Vec<ValidationError>>

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{ChainConfig, MonitorConfig};
use crate::pool::strategy::PoolingStrategy;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("network name is empty")]
    EmptyNetwork,

    #[error("chain_id must be non-zero")]
    ZeroChainId,

    #[error("chain has no endpoints")]
    NoEndpoints,

    #[error("endpoint #{index} has no name")]
    MissingEndpointName { index: usize },

    #[error("endpoint '{name}' has no url")]
    MissingEndpointAddress { name: String },

    #[error("endpoint '{name}' has invalid url '{url}': {reason}")]
    InvalidEndpointAddress {
        name: String,
        url: String,
        reason: String,
    },

    #[error("endpoint name '{0}' is used more than once")]
    DuplicateEndpointName(String),

    #[error("endpoint '{0}' has a zero timeout")]
    ZeroTimeout(String),

    #[error("unknown pooling strategy '{0}'")]
    UnknownStrategy(String),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// Validate the process-wide settings. Chains are validated separately.
pub fn validate_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let global = &config.global_settings;

    if global.max_workers == 0 {
        errors.push(ValidationError::NotPositive("global_settings.max_workers"));
    }
    if global.request_timeout_ms == 0 {
        errors.push(ValidationError::NotPositive("global_settings.request_timeout_ms"));
    }
    if global.tick_interval_ms == 0 {
        errors.push(ValidationError::NotPositive("global_settings.tick_interval_ms"));
    }
    if global.snapshot_interval_secs == 0 {
        errors.push(ValidationError::NotPositive("global_settings.snapshot_interval_secs"));
    }
    if global.rate_limit.interval_ms == 0 {
        errors.push(ValidationError::NotPositive("global_settings.rate_limit.interval_ms"));
    }
    if global.rate_limit.burst_size == 0 {
        errors.push(ValidationError::NotPositive("global_settings.rate_limit.burst_size"));
    }
    if global.circuit_breaker.failure_limit == 0 {
        errors.push(ValidationError::NotPositive(
            "global_settings.circuit_breaker.failure_limit",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one chain definition.
pub fn validate_chain(chain: &ChainConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if chain.network.trim().is_empty() {
        errors.push(ValidationError::EmptyNetwork);
    }
    if chain.chain_id == 0 {
        errors.push(ValidationError::ZeroChainId);
    }
    if let Err(e) = chain.pooling_strategy.parse::<PoolingStrategy>() {
        errors.push(e);
    }
    if chain.endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }

    let mut seen = HashSet::new();
    for (index, endpoint) in chain.endpoints.iter().enumerate() {
        let name = endpoint.name.trim();
        if name.is_empty() {
            errors.push(ValidationError::MissingEndpointName { index });
        } else if !seen.insert(name) {
            errors.push(ValidationError::DuplicateEndpointName(name.to_string()));
        }

        if endpoint.url.trim().is_empty() {
            errors.push(ValidationError::MissingEndpointAddress {
                name: endpoint.name.clone(),
            });
        } else if let Err(reason) = check_url(&endpoint.url) {
            errors.push(ValidationError::InvalidEndpointAddress {
                name: endpoint.name.clone(),
                url: endpoint.url.clone(),
                reason,
            });
        }

        if endpoint.timeout_ms == Some(0) {
            errors.push(ValidationError::ZeroTimeout(endpoint.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::EndpointConfig;

    fn endpoint(name: &str, url: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.to_string(),
            url: url.to_string(),
            timeout_ms: None,
        }
    }

    fn chain() -> ChainConfig {
        ChainConfig {
            chain_id: 1,
            network: "ethereum".to_string(),
            endpoints: vec![endpoint("a", "http://127.0.0.1:8545")],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_chain() {
        assert!(validate_chain(&chain()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let bad = ChainConfig {
            chain_id: 0,
            network: " ".to_string(),
            pooling_strategy: "weighted".to_string(),
            endpoints: Vec::new(),
            ..Default::default()
        };

        let errors = validate_chain(&bad).unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyNetwork));
        assert!(errors.contains(&ValidationError::ZeroChainId));
        assert!(errors.contains(&ValidationError::NoEndpoints));
        assert!(errors.contains(&ValidationError::UnknownStrategy("weighted".into())));
    }

    #[test]
    fn test_endpoint_checks() {
        let mut c = chain();
        c.endpoints = vec![
            endpoint("", "http://a"),
            endpoint("b", ""),
            endpoint("c", "ws://node:8546"),
            endpoint("c", "http://node:8545"),
        ];

        let errors = validate_chain(&c).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingEndpointName { index: 0 }));
        assert!(errors.contains(&ValidationError::MissingEndpointAddress { name: "b".into() }));
        assert!(errors.contains(&ValidationError::DuplicateEndpointName("c".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidEndpointAddress { name, .. } if name == "c")));
    }

    #[test]
    fn test_global_settings() {
        let mut config = MonitorConfig::default();
        assert!(validate_config(&config).is_ok());

        config.global_settings.max_workers = 0;
        config.global_settings.rate_limit.burst_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0].to_string(),
            "global_settings.max_workers must be greater than zero"
        );
    }
}
