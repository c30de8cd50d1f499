//! Chain registry.
//!
//! Built once at startup from validated configuration and shared read-only
//! behind an `Arc` for the lifetime of the process.

use super::{ChainConfig, ChainName, ConfigError};
use std::collections::HashMap;
use tracing::info;

/// Registered chains indexed by name and chain id.
#[derive(Debug, Default)]
pub struct ChainRegistry {
    chains: HashMap<ChainName, ChainConfig>,
    by_id: HashMap<u64, ChainName>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chain. Name and chain id must both be new.
    pub fn register(&mut self, config: ChainConfig) -> Result<(), ConfigError> {
        if self.chains.contains_key(&config.name) {
            return Err(ConfigError::DuplicateChain(config.name.to_string()));
        }
        if let Some(existing) = self.by_id.get(&config.chain_id) {
            return Err(ConfigError::DuplicateChainId {
                chain_id: config.chain_id,
                existing: existing.to_string(),
            });
        }

        info!(
            chain = %config.name,
            chain_id = config.chain_id,
            transport = %config.transport_expr,
            endpoints = config.transport_expr.endpoint_count(),
            contracts = config.contracts.len(),
            "Registered chain"
        );
        self.by_id.insert(config.chain_id, config.name);
        self.chains.insert(config.name, config);
        Ok(())
    }

    pub fn get(&self, name: ChainName) -> Option<&ChainConfig> {
        self.chains.get(&name)
    }

    pub fn by_chain_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.by_id.get(&chain_id).and_then(|name| self.chains.get(name))
    }

    /// All chains ordered by name.
    pub fn all(&self) -> Vec<&ChainConfig> {
        let mut chains: Vec<&ChainConfig> = self.chains.values().collect();
        chains.sort_by_key(|c| c.name);
        chains
    }

    pub fn supported_names(&self) -> Vec<&'static str> {
        self.all().into_iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::config::ServiceConfig;

    /// Registry over the deployed default contracts, pointing at a local node.
    pub fn registry(names: &[ChainName]) -> ChainRegistry {
        let selected = names.iter().map(ChainName::as_str).collect::<Vec<_>>().join(",");
        let env = move |name: &str| match name {
            "SELECTED_CHAINS" => Some(selected.clone()),
            n if n.starts_with("PONDER_RPC_URL_") => Some("http://127.0.0.1:8545".to_string()),
            _ => None,
        };
        ServiceConfig::from_sources(None, "test", &env).unwrap().registry
    }

    pub fn chain_config(name: ChainName) -> ChainConfig {
        registry(&[name]).get(name).unwrap().clone()
    }
}
