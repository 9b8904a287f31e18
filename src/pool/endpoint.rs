//! Endpoint abstraction.

use std::time::Duration;

use url::Url;

use crate::config::{EndpointConfig, ValidationError};

/// A single RPC endpoint. Immutable; reconfiguration replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    address: Url,
    timeout: Duration,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, address: Url, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            address,
            timeout,
        }
    }

    /// Build from configuration, using `default_timeout` when none is set.
    pub fn from_config(
        config: &EndpointConfig,
        default_timeout: Duration,
    ) -> Result<Self, ValidationError> {
        let address =
            Url::parse(config.url.trim()).map_err(|e| ValidationError::InvalidEndpointAddress {
                name: config.name.clone(),
                url: config.url.clone(),
                reason: e.to_string(),
            })?;
        let timeout = config
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(default_timeout);

        Ok(Self::new(config.name.trim(), address, timeout))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Max duration of one probe.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_defaults_timeout() {
        let config = EndpointConfig {
            name: " primary ".to_string(),
            url: "http://127.0.0.1:8545".to_string(),
            timeout_ms: None,
        };
        let endpoint = Endpoint::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(endpoint.name(), "primary");
        assert_eq!(endpoint.timeout(), Duration::from_secs(5));
        assert_eq!(endpoint.address().port(), Some(8545));

        let config = EndpointConfig {
            timeout_ms: Some(250),
            ..config
        };
        let endpoint = Endpoint::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(endpoint.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_from_config_bad_url() {
        let config = EndpointConfig {
            name: "broken".to_string(),
            url: "not a url".to_string(),
            timeout_ms: None,
        };
        let err = Endpoint::from_config(&config, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidEndpointAddress { .. }));
    }
}
