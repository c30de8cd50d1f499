//! Supported chains and their contract watches.

use super::ConfigError;
use alloy::primitives::{address, Address};
use indexer_chain::{
    ContractKind, FactoryRef, FactorySource, StaticWatch, Transport, TransportExpr, WatchSet,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default interval between log polls.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(10_000);

/// Closed set of chains the service can index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainName {
    RiseTestnet,
    LocalDocker,
}

impl ChainName {
    pub const ALL: [ChainName; 2] = [Self::RiseTestnet, Self::LocalDocker];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RiseTestnet => "riseTestnet",
            Self::LocalDocker => "localDocker",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Self::RiseTestnet => 11_155_931,
            Self::LocalDocker => 1337,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.chain_id() == chain_id)
    }

    /// Environment variable holding this chain's transport expression.
    pub fn rpc_env_var(&self) -> String {
        format!("PONDER_RPC_URL_{}", self.chain_id())
    }

    /// Deployed contract addresses and start blocks.
    pub fn default_contracts(&self) -> [(ContractKind, Address, u64); 4] {
        const MORPHO: Address = address!("BBBBBbbBBb9cC5e90e3b3Af64bdAF62C37EEFFCb");
        const META_MORPHO_FACTORY: Address = address!("d2c9068aD68c4c9F1A4fE1Ea650BdFE13DC5EaF1");
        const ADAPTIVE_CURVE_IRM: Address = address!("BADb1809ecF658F36e31CcC980F72de029e1cE46");
        const PRE_LIQUIDATION_FACTORY: Address = address!("09d7629E82DdD80890495672201fe5FE1f909B0b");

        match self {
            Self::RiseTestnet => [
                (ContractKind::Morpho, MORPHO, 0),
                (ContractKind::MetaMorphoFactory, META_MORPHO_FACTORY, 14_812_082),
                (ContractKind::AdaptiveCurveIrm, ADAPTIVE_CURVE_IRM, 14_640_172),
                (ContractKind::PreLiquidationFactory, PRE_LIQUIDATION_FACTORY, 14_812_316),
            ],
            Self::LocalDocker => [
                (ContractKind::Morpho, MORPHO, 0),
                (ContractKind::MetaMorphoFactory, META_MORPHO_FACTORY, 0),
                (ContractKind::AdaptiveCurveIrm, ADAPTIVE_CURVE_IRM, 0),
                (ContractKind::PreLiquidationFactory, PRE_LIQUIDATION_FACTORY, 0),
            ],
        }
    }
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainName {
    type Err = ConfigError;

    /// Accepts `riseTestnet`, `rise-testnet` and `RISE_TESTNET` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        Self::ALL
            .into_iter()
            .find(|name| name.as_str().to_lowercase() == normalized)
            .ok_or_else(|| ConfigError::UnknownChain(s.trim().to_string()))
    }
}

/// Where a watched contract's address comes from.
#[derive(Debug, Clone)]
pub enum AddressSource {
    Literal(Address),
    Factory(FactoryRef),
}

/// One contract kind watched on a chain.
#[derive(Debug, Clone)]
pub struct ContractWatch {
    pub kind: ContractKind,
    pub address: AddressSource,
    pub start_block: u64,
}

/// Validated chain configuration.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub name: ChainName,
    pub chain_id: u64,
    /// Parsed transport expression (logged at startup)
    pub transport_expr: TransportExpr,
    pub transport: Transport,
    pub polling_interval: Duration,
    /// One entry per watched contract kind
    pub contracts: Vec<ContractWatch>,
}

impl ChainConfig {
    pub fn contract(&self, kind: ContractKind) -> Option<&ContractWatch> {
        self.contracts.iter().find(|watch| watch.kind == kind)
    }

    /// Literal address configured for `kind`.
    pub fn address_of(&self, kind: ContractKind) -> Option<Address> {
        match self.contract(kind)?.address {
            AddressSource::Literal(address) => Some(address),
            AddressSource::Factory(_) => None,
        }
    }

    /// Factory-derived watches as discovery sources.
    pub fn factory_sources(&self) -> Vec<FactorySource> {
        self.contracts
            .iter()
            .filter_map(|watch| match &watch.address {
                AddressSource::Factory(factory) => Some(FactorySource {
                    kind: watch.kind,
                    factory: factory.clone(),
                    start_block: watch.start_block,
                }),
                AddressSource::Literal(_) => None,
            })
            .collect()
    }

    /// Fresh watch set seeded with this chain's literal contracts.
    pub fn watch_set(&self) -> WatchSet {
        WatchSet::new(
            self.contracts
                .iter()
                .filter_map(|watch| match watch.address {
                    AddressSource::Literal(address) => Some(StaticWatch {
                        kind: watch.kind,
                        address,
                        start_block: watch.start_block,
                    }),
                    AddressSource::Factory(_) => None,
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_name_parsing() {
        assert_eq!("riseTestnet".parse::<ChainName>().unwrap(), ChainName::RiseTestnet);
        assert_eq!("rise-testnet".parse::<ChainName>().unwrap(), ChainName::RiseTestnet);
        assert_eq!("LOCAL_DOCKER".parse::<ChainName>().unwrap(), ChainName::LocalDocker);
        assert!(matches!(
            "mainnet".parse::<ChainName>(),
            Err(ConfigError::UnknownChain(name)) if name == "mainnet"
        ));
    }

    #[test]
    fn test_chain_ids() {
        assert_eq!(ChainName::from_chain_id(1337), Some(ChainName::LocalDocker));
        assert_eq!(ChainName::from_chain_id(11_155_931), Some(ChainName::RiseTestnet));
        assert_eq!(ChainName::from_chain_id(1), None);
        assert_eq!(ChainName::LocalDocker.rpc_env_var(), "PONDER_RPC_URL_1337");
    }
}
