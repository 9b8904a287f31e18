//! Running pools keyed by network name.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::ChainConfig;
use crate::pool::{EndpointPool, PoolError};

/// Shared by the admin surface and config hot reload.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: DashMap<String, Arc<EndpointPool>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pool`, replacing any pool with the same network.
    pub fn insert(&self, pool: Arc<EndpointPool>) -> Option<Arc<EndpointPool>> {
        self.pools.insert(pool.network().to_string(), pool)
    }

    pub fn get(&self, network: &str) -> Option<Arc<EndpointPool>> {
        self.pools.get(network).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, network: &str) -> Option<Arc<EndpointPool>> {
        self.pools.remove(network).map(|(_, pool)| pool)
    }

    /// All pools, sorted by network.
    pub fn pools(&self) -> Vec<Arc<EndpointPool>> {
        let mut pools: Vec<_> = self.pools.iter().map(|e| e.value().clone()).collect();
        pools.sort_by(|a, b| a.network().cmp(b.network()));
        pools
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Reload every registered pool from `chains`.
    ///
    /// Chains without a running pool are ignored; adding a chain needs a restart.
    /// Returns the reloads that failed.
    pub fn reload(&self, chains: &[ChainConfig]) -> Vec<PoolError> {
        let mut errors = Vec::new();

        for chain in chains {
            let network = chain.network.trim();
            let Some(pool) = self.get(network) else {
                tracing::warn!(network = %network, "No running pool for chain; restart to add it");
                continue;
            };
            if let Err(e) = pool.reload_config(chain) {
                tracing::error!(network = %network, error = %e, "Reload rejected, keeping previous configuration");
                errors.push(e);
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, GlobalSettings};
    use crate::observability::MetricsRegistry;
    use crate::pool::PoolFactory;

    fn chain(network: &str, endpoints: &[&str]) -> ChainConfig {
        ChainConfig {
            chain_id: 1,
            network: network.to_string(),
            endpoints: endpoints
                .iter()
                .map(|name| EndpointConfig {
                    name: name.to_string(),
                    url: "http://127.0.0.1:8545".to_string(),
                    timeout_ms: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn registry_with(networks: &[&str]) -> PoolRegistry {
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let factory = PoolFactory::new(GlobalSettings::default(), metrics).unwrap();
        let registry = PoolRegistry::new();
        for network in networks {
            let pool = factory.create_pool(&chain(network, &["a"])).unwrap();
            registry.insert(Arc::new(pool));
        }
        registry
    }

    #[test]
    fn test_lookup_and_order() {
        let registry = registry_with(&["polygon", "ethereum"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("ethereum").is_some());
        assert!(registry.get("solana").is_none());

        let networks: Vec<String> = registry
            .pools()
            .iter()
            .map(|p| p.network().to_string())
            .collect();
        assert_eq!(networks, ["ethereum", "polygon"]);

        assert!(registry.remove("polygon").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reload_routes_by_network() {
        let registry = registry_with(&["ethereum"]);

        let errors = registry.reload(&[chain("ethereum", &["x", "y"]), chain("solana", &["z"])]);
        assert!(errors.is_empty());

        let pool = registry.get("ethereum").unwrap();
        assert_eq!(pool.endpoints().len(), 2);
        assert!(registry.get("solana").is_none());

        let errors = registry.reload(&[chain("ethereum", &[])]);
        assert_eq!(errors.len(), 1);
        assert_eq!(pool.endpoints().len(), 2);
    }
}
