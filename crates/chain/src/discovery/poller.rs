//! Polls factory creation logs and feeds them to discovery in block order.

use super::{DecodeError, DiscoveredAddress, Discovery};
use crate::client::{ChainClient, ClientError};
use crate::log::ChainLog;
use alloy::primitives::{Address, B256};
use alloy::rpc::types::Filter;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Blocks requested per `eth_getLogs` call.
pub const DEFAULT_BLOCK_RANGE: u64 = 2_000;

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Discovery driver for one chain.
pub struct LogPoller {
    chain: String,
    client: ChainClient,
    discovery: Discovery,
    interval: Duration,
    block_range: u64,
    next_block: u64,
}

impl LogPoller {
    pub fn new(chain: impl Into<String>, client: ChainClient, discovery: Discovery, interval: Duration) -> Self {
        let next_block = discovery
            .sources()
            .iter()
            .map(|source| source.start_block)
            .min()
            .unwrap_or(0);

        Self {
            chain: chain.into(),
            client,
            discovery,
            interval,
            block_range: DEFAULT_BLOCK_RANGE,
            next_block,
        }
    }

    pub fn with_block_range(mut self, block_range: u64) -> Self {
        self.block_range = block_range.max(1);
        self
    }

    /// Poll until a decode failure halts discovery. Transport errors are retried.
    pub async fn run(mut self) -> Result<(), DecodeError> {
        info!(
            chain = %self.chain,
            factories = self.discovery.sources().len(),
            from_block = self.next_block,
            "Starting factory log poller"
        );

        if self.discovery.sources().is_empty() {
            return Ok(());
        }

        loop {
            match self.poll_once().await {
                // Caught up with the head
                Ok(None) => tokio::time::sleep(self.interval).await,
                Ok(Some(_)) => {}
                Err(PollError::Client(e)) => {
                    warn!(chain = %self.chain, error = %e, "Log poll failed, retrying");
                    tokio::time::sleep(self.interval).await;
                }
                Err(PollError::Decode(e)) => {
                    error!(chain = %self.chain, error = %e, "Factory discovery halted");
                    return Err(e);
                }
            }
        }
    }

    /// Fetch and process one block range.
    ///
    /// Returns `None` when already at the head, otherwise the children discovered.
    pub async fn poll_once(&mut self) -> Result<Option<Vec<DiscoveredAddress>>, PollError> {
        let head = self.client.block_number().await?;
        if self.next_block > head {
            return Ok(None);
        }
        let to_block = head.min(self.next_block.saturating_add(self.block_range - 1));

        let (addresses, selectors): (Vec<Address>, Vec<B256>) = self
            .discovery
            .sources()
            .iter()
            .map(|source| (source.factory.address, source.factory.selector()))
            .unzip();
        let filter = Filter::new()
            .address(addresses)
            .event_signature(selectors)
            .from_block(self.next_block)
            .to_block(to_block);

        let logs = self.client.get_logs(&filter).await?;
        debug!(
            chain = %self.chain,
            from_block = self.next_block,
            to_block,
            logs = logs.len(),
            "Fetched factory logs"
        );

        let mut discovered = Vec::new();
        for (block, logs) in group_by_block(logs) {
            discovered.extend(self.discovery.process_block(block, &logs)?);
        }
        self.discovery.advance(to_block);
        self.next_block = to_block + 1;

        Ok(Some(discovered))
    }
}

/// Group logs by block, each block's logs ordered by log index.
fn group_by_block(logs: Vec<ChainLog>) -> BTreeMap<u64, Vec<ChainLog>> {
    let mut blocks: BTreeMap<u64, Vec<ChainLog>> = BTreeMap::new();
    for log in logs {
        blocks.entry(log.block_number).or_default().push(log);
    }
    for logs in blocks.values_mut() {
        logs.sort_by_key(|log| log.log_index);
    }
    blocks
}
