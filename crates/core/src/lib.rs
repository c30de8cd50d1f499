//! Indexer query core.
//!
//! This crate provides the read side of the Morpho indexer:
//! - Configuration and the chain registry
//! - Storage interface over indexed rows (Postgres or in-memory)
//! - Market and vault queries
//! - Liquidation and pre-liquidation candidates from live reads
//! - `eth_getLogs` emulation over indexed logs
//!
//! Supports Morpho Blue deployments on multiple EVM chains.

pub mod config;
pub mod liquidation;
pub mod math;
pub mod query;
pub mod rpc;
pub mod store;
pub mod wide;

pub use config::{ChainConfig, ChainName, ChainRegistry, ConfigError, EngineConfig, ServerConfig, ServiceConfig};
pub use liquidation::{
    CandidateReport, EngineError, LiquidationCandidate, LiquidationEngine, PreLiquidationCandidate, Unevaluated,
};
pub use query::{MarketView, QueryService, VaultView};
pub use rpc::{LogEmulator, RpcError};
pub use store::{IndexStore, MemoryStore, PgStore, StoreError};
