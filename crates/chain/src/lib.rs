//! Chain interaction layer for the Morpho indexer.
//!
//! This crate provides:
//! - Composable JSON-RPC transports (`fallback(...)`, `loadbalance(...)`)
//! - An alloy provider-backed chain client over those transports
//! - Morpho Blue, oracle and IRM bindings, and live reads for the liquidation engine
//! - Factory-driven discovery of MetaMorpho vaults and pre-liquidation contracts

mod client;
pub mod contracts;
pub mod discovery;
mod log;
mod reader;
pub mod transport;

pub use client::{BlockRef, ChainClient, ClientError};
pub use contracts::ContractKind;
pub use discovery::{
    DecodeError, DiscoveredAddress, Discovery, FactoryError, FactoryRef, FactorySource, LogPoller,
    StaticWatch, WatchSet,
};
pub use log::{hex_lower, ChainLog};
pub use reader::{LiveReader, MarketState, MorphoReader};
pub use transport::{ExprError, Transport, TransportError, TransportExpr, TransportOptions};
