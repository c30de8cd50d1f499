//! Factory-driven contract discovery.
//!
//! Children created at runtime by a factory (MetaMorpho vaults, pre-liquidation
//! contracts) are learnt from the factory's creation events. Logs must be fed
//! in block order; each recorded child is watched from its discovery block on.

mod poller;
mod watch_set;

pub use poller::{LogPoller, PollError, DEFAULT_BLOCK_RANGE};
pub use watch_set::{StaticWatch, WatchSet};

use crate::contracts::ContractKind;
use crate::log::ChainLog;
use alloy::dyn_abi::{DynSolValue, EventExt};
use alloy::json_abi::Event;
use alloy::primitives::{Address, B256};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Invalid factory reference (rejected at startup).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("invalid event signature `{signature}`: {message}")]
    InvalidEvent { signature: String, message: String },

    #[error("event `{event}` has no parameter named `{parameter}`")]
    MissingParameter { event: String, parameter: String },

    #[error("parameter `{parameter}` of `{event}` is `{ty}`, expected `address`")]
    NotAnAddress {
        event: String,
        parameter: String,
        ty: String,
    },
}

/// Failure to decode a factory creation log. Halts discovery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("cannot decode `{event}` log at block {block} index {log_index}: {message}")]
    Undecodable {
        event: String,
        block: u64,
        log_index: u64,
        message: String,
    },

    #[error("`{event}` log at block {block} index {log_index} lacks address parameter `{parameter}`")]
    MissingParameter {
        event: String,
        parameter: String,
        block: u64,
        log_index: u64,
    },

    #[error("discovery halted after an earlier decode failure")]
    Halted,
}

/// Factory address + creation event + name of the parameter holding the child address.
#[derive(Debug, Clone)]
pub struct FactoryRef {
    pub address: Address,
    event: Event,
    parameter: String,
}

impl FactoryRef {
    /// Build a reference from a human-readable event declaration.
    pub fn new(address: Address, signature: &str, parameter: &str) -> Result<Self, FactoryError> {
        let event = Event::parse(signature).map_err(|e| FactoryError::InvalidEvent {
            signature: signature.to_string(),
            message: e.to_string(),
        })?;

        let input = event
            .inputs
            .iter()
            .find(|input| input.name == parameter)
            .ok_or_else(|| FactoryError::MissingParameter {
                event: event.name.clone(),
                parameter: parameter.to_string(),
            })?;
        if input.ty != "address" {
            return Err(FactoryError::NotAnAddress {
                event: event.name.clone(),
                parameter: parameter.to_string(),
                ty: input.ty.clone(),
            });
        }

        Ok(Self {
            address,
            parameter: parameter.to_string(),
            event,
        })
    }

    pub fn selector(&self) -> B256 {
        self.event.selector()
    }

    pub fn event_name(&self) -> &str {
        &self.event.name
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// Extract the child address from a creation log.
    pub fn decode_child(&self, log: &ChainLog) -> Result<Address, DecodeError> {
        let decoded = self
            .event
            .decode_log_parts(log.topics.iter().copied(), &log.data, true)
            .map_err(|e| DecodeError::Undecodable {
                event: self.event.name.clone(),
                block: log.block_number,
                log_index: log.log_index,
                message: e.to_string(),
            })?;

        let mut indexed = decoded.indexed.iter();
        let mut body = decoded.body.iter();
        let mut found: Option<&DynSolValue> = None;
        for input in &self.event.inputs {
            let value = if input.indexed { indexed.next() } else { body.next() };
            if input.name == self.parameter {
                found = value;
                break;
            }
        }

        found
            .and_then(DynSolValue::as_address)
            .ok_or_else(|| DecodeError::MissingParameter {
                event: self.event.name.clone(),
                parameter: self.parameter.clone(),
                block: log.block_number,
                log_index: log.log_index,
            })
    }
}

/// A factory whose children are watched as `kind`.
#[derive(Debug, Clone)]
pub struct FactorySource {
    pub kind: ContractKind,
    pub factory: FactoryRef,
    pub start_block: u64,
}

/// A child contract learnt from a creation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredAddress {
    pub kind: ContractKind,
    pub factory: Address,
    pub address: Address,
    pub block_number: u64,
}

/// Single-writer discovery state machine for one chain.
///
/// Its progress and halt state live on the shared [`WatchSet`], so readers
/// holding the same `Arc` see both.
#[derive(Debug)]
pub struct Discovery {
    sources: Vec<FactorySource>,
    watch_set: Arc<WatchSet>,
}

impl Discovery {
    pub fn new(sources: Vec<FactorySource>, watch_set: Arc<WatchSet>) -> Self {
        Self { sources, watch_set }
    }

    pub fn sources(&self) -> &[FactorySource] {
        &self.sources
    }

    pub fn watch_set(&self) -> &Arc<WatchSet> {
        &self.watch_set
    }

    pub fn is_halted(&self) -> bool {
        self.watch_set.is_halted()
    }

    /// Process the logs of one block, returning newly recorded children.
    ///
    /// Re-processing a block is a no-op. Any decode failure halts discovery
    /// for good and every later call returns [`DecodeError::Halted`].
    pub fn process_block(
        &mut self,
        block: u64,
        logs: &[ChainLog],
    ) -> Result<Vec<DiscoveredAddress>, DecodeError> {
        if self.watch_set.is_halted() {
            return Err(DecodeError::Halted);
        }

        let mut created = Vec::new();
        for log in logs.iter().filter(|log| log.block_number == block) {
            let Some(source) = self.match_source(log) else {
                continue;
            };

            let address = match source.factory.decode_child(log) {
                Ok(address) => address,
                Err(e) => {
                    error!(block, log_index = log.log_index, error = %e, "Factory log decode failed, halting discovery");
                    self.watch_set.mark_halted();
                    return Err(e);
                }
            };

            let discovered = DiscoveredAddress {
                kind: source.kind,
                factory: source.factory.address,
                address,
                block_number: block,
            };
            if self.watch_set.record(discovered.clone()) {
                info!(kind = %discovered.kind, address = %address, block, "Discovered contract");
                created.push(discovered);
            }
        }

        self.watch_set.mark_processed(block);
        Ok(created)
    }

    /// Record that every block up to `block` has been seen.
    pub fn advance(&self, block: u64) {
        self.watch_set.mark_processed(block);
    }

    fn match_source(&self, log: &ChainLog) -> Option<&FactorySource> {
        let selector = log.selector()?;
        self.sources.iter().find(|source| {
            source.factory.address == log.address
                && source.factory.selector() == selector
                && log.block_number >= source.start_block
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::contracts::{CREATE_META_MORPHO_EVENT, CREATE_META_MORPHO_PARAMETER};
    use alloy::primitives::{address, Bytes, U256};
    use alloy::sol_types::SolValue;

    pub const FACTORY: Address = address!("d2c9068aD68c4c9F1A4fE1Ea650BdFE13DC5EaF1");

    pub fn meta_morpho_factory() -> FactoryRef {
        FactoryRef::new(FACTORY, CREATE_META_MORPHO_EVENT, CREATE_META_MORPHO_PARAMETER).unwrap()
    }

    pub fn meta_morpho_source(start_block: u64) -> FactorySource {
        FactorySource {
            kind: ContractKind::MetaMorpho,
            factory: meta_morpho_factory(),
            start_block,
        }
    }

    /// A well-formed `CreateMetaMorpho` log creating `vault`.
    pub fn create_vault_log(vault: Address, block: u64, log_index: u64) -> ChainLog {
        let data = (
            Address::repeat_byte(0x0a),
            U256::from(86_400u64),
            "Vault".to_string(),
            "VLT".to_string(),
            B256::ZERO,
        )
            .abi_encode_params();

        ChainLog {
            block_number: block,
            block_hash: B256::repeat_byte(block as u8),
            transaction_hash: B256::repeat_byte(0x77),
            transaction_index: 0,
            log_index,
            address: FACTORY,
            topics: [
                meta_morpho_factory().selector(),
                vault.into_word(),
                Address::repeat_byte(0x0c).into_word(),
                Address::repeat_byte(0x0e).into_word(),
            ]
            .into_iter()
            .collect(),
            data: Bytes::from(data),
        }
    }
}
