//! Pool construction.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{ChainConfig, GlobalSettings};
use crate::health::probe::HttpProber;
use crate::observability::{MetricsRegistry, PoolMetrics};
use crate::pool::{EndpointPool, PoolError};

/// Pools built from a set of chains, plus the chains that were rejected.
#[derive(Debug, Default)]
pub struct PoolSet {
    pub pools: Vec<Arc<EndpointPool>>,
    pub errors: Vec<PoolError>,
}

/// Builds pools that share one HTTP client and one metrics registry.
#[derive(Debug, Clone)]
pub struct PoolFactory {
    settings: GlobalSettings,
    registry: Arc<MetricsRegistry>,
    prober: Arc<HttpProber>,
}

impl PoolFactory {
    pub fn new(settings: GlobalSettings, registry: Arc<MetricsRegistry>) -> Result<Self, PoolError> {
        let prober = Arc::new(HttpProber::new(&settings.probe)?);
        Ok(Self {
            settings,
            registry,
            prober,
        })
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    /// Validate `chain` and build its pool with metrics bound to the network name.
    pub fn create_pool(&self, chain: &ChainConfig) -> Result<EndpointPool, PoolError> {
        let metrics = PoolMetrics::new(chain.network.trim(), self.registry.clone());
        EndpointPool::new(chain, &self.settings, self.prober.clone(), metrics)
    }

    /// Build one pool per chain. A bad chain is reported and skipped.
    pub fn create_pools(&self, chains: &[ChainConfig]) -> PoolSet {
        let mut set = PoolSet::default();
        let mut networks = HashSet::new();

        for chain in chains {
            let network = chain.network.trim();
            if !network.is_empty() && !networks.insert(network.to_string()) {
                tracing::error!(network = %network, "Duplicate network, chain skipped");
                set.errors.push(PoolError::DuplicateNetwork(network.to_string()));
                continue;
            }

            match self.create_pool(chain) {
                Ok(pool) => {
                    tracing::info!(
                        network = %pool.network(),
                        chain_id = pool.chain_id(),
                        strategy = %pool.strategy(),
                        endpoints = pool.endpoints().len(),
                        "Pool created"
                    );
                    set.pools.push(Arc::new(pool));
                }
                Err(e) => {
                    tracing::error!(network = %network, error = %e, "Failed to create pool");
                    set.errors.push(e);
                }
            }
        }

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;

    fn chain(network: &str, chain_id: u64) -> ChainConfig {
        ChainConfig {
            chain_id,
            network: network.to_string(),
            endpoints: vec![EndpointConfig {
                name: "primary".to_string(),
                url: "http://127.0.0.1:8545".to_string(),
                timeout_ms: None,
            }],
            ..Default::default()
        }
    }

    fn factory() -> PoolFactory {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        PoolFactory::new(GlobalSettings::default(), registry).unwrap()
    }

    #[test]
    fn test_bad_chain_does_not_abort_others() {
        let set = factory().create_pools(&[
            chain("ethereum", 1),
            chain("broken", 0),
            chain("polygon", 137),
        ]);

        let networks: Vec<&str> = set.pools.iter().map(|p| p.network()).collect();
        assert_eq!(networks, ["ethereum", "polygon"]);
        assert_eq!(set.errors.len(), 1);
        assert!(matches!(
            &set.errors[0],
            PoolError::InvalidChain { network, .. } if network == "broken"
        ));
    }

    #[test]
    fn test_duplicate_network_rejected() {
        let set = factory().create_pools(&[chain("ethereum", 1), chain("ethereum", 1)]);
        assert_eq!(set.pools.len(), 1);
        assert!(matches!(&set.errors[0], PoolError::DuplicateNetwork(n) if n == "ethereum"));
    }

    #[test]
    fn test_no_valid_chains() {
        let set = factory().create_pools(&[chain("", 1)]);
        assert!(set.pools.is_empty());
        assert_eq!(set.errors.len(), 1);
    }

    #[test]
    fn test_pools_share_registry() {
        let factory = factory();
        let eth = factory.create_pool(&chain("ethereum", 1)).unwrap();
        let poly = factory.create_pool(&chain("polygon", 137)).unwrap();

        eth.metrics().record_success("primary");
        assert_eq!(eth.metrics().successes("primary"), 1);
        assert_eq!(poly.metrics().successes("primary"), 0);
        assert!(Arc::ptr_eq(eth.metrics().registry(), factory.registry()));
    }
}
