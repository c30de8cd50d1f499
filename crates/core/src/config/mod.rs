//! Service configuration.
//!
//! This module provides:
//! - The closed set of supported chains and their contract watches
//! - TOML + environment loading with `${VAR}` expansion and eager validation
//! - The chain registry shared by every component

mod chain;
mod loader;
mod registry;

pub use chain::{AddressSource, ChainConfig, ChainName, ContractWatch, DEFAULT_POLLING_INTERVAL};
pub use loader::{EngineConfig, ServerConfig, ServiceConfig, DEFAULT_CONFIG_PATH};
pub use registry::ChainRegistry;

#[cfg(test)]
pub(crate) use registry::fixtures;

use indexer_chain::{ExprError, FactoryError};
use thiserror::Error;

/// Startup configuration error. Always names the offending variable or key.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} env var is not set")]
    MissingEnv(String),

    #[error("{name} is not a valid Ethereum address: `{value}`")]
    InvalidAddress { name: String, value: String },

    #[error("{name} must be a positive integer, got `{value}`")]
    InvalidStartBlock { name: String, value: String },

    #[error("{name} must be a number, got `{value}`")]
    InvalidNumber { name: String, value: String },

    #[error("{name} is not a valid transport expression: {source}")]
    InvalidTransport {
        name: String,
        #[source]
        source: ExprError,
    },

    #[error("{name} has an invalid factory reference: {source}")]
    InvalidFactory {
        name: String,
        #[source]
        source: FactoryError,
    },

    #[error("{name} is not a configurable contract")]
    UnknownContract { name: String },

    #[error("unknown chain `{0}`")]
    UnknownChain(String),

    #[error("chain `{0}` is registered twice")]
    DuplicateChain(String),

    #[error("chains.{first} and chains.{second} both configure `{chain}`")]
    DuplicateChainKey {
        chain: String,
        first: String,
        second: String,
    },

    #[error("chain id {chain_id} is already registered by `{existing}`")]
    DuplicateChainId { chain_id: u64, existing: String },

    #[error("no chains selected")]
    NoChains,

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
