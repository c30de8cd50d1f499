//! Chain client: an alloy provider over a composed [`Transport`].

use crate::log::ChainLog;
use crate::transport::{Transport, TransportError};
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::B256;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::Filter;
use std::future::IntoFuture;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Error from a typed chain call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Contract(#[from] alloy::contract::Error),

    #[error("{method} did not complete within {timeout:?}")]
    Timeout { method: &'static str, timeout: Duration },

    #[error("unexpected {method} response: {message}")]
    Response { method: String, message: String },
}

/// Head block summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub number: u64,
    pub timestamp: u64,
    pub hash: B256,
}

/// Chain client bound to a single chain's transport.
#[derive(Debug, Clone)]
pub struct ChainClient {
    provider: RootProvider,
    timeout: Duration,
}

impl ChainClient {
    /// Create a client. `timeout` bounds each call including fallback retries.
    pub fn new(transport: Transport, timeout: Duration) -> Self {
        let client = RpcClient::new(transport, false);
        Self {
            provider: ProviderBuilder::default().on_client(client),
            timeout,
        }
    }

    pub fn provider(&self) -> &RootProvider {
        &self.provider
    }

    /// Await `call` within the client timeout.
    pub(crate) async fn timed<T, E, F>(&self, method: &'static str, call: F) -> Result<T, ClientError>
    where
        F: IntoFuture<Output = Result<T, E>>,
        ClientError: From<E>,
    {
        trace!(method, "chain request");
        tokio::time::timeout(self.timeout, call.into_future())
            .await
            .map_err(|_| ClientError::Timeout {
                method,
                timeout: self.timeout,
            })?
            .map_err(ClientError::from)
    }

    pub async fn chain_id(&self) -> Result<u64, ClientError> {
        self.timed("eth_chainId", self.provider.get_chain_id()).await
    }

    pub async fn block_number(&self) -> Result<u64, ClientError> {
        self.timed("eth_blockNumber", self.provider.get_block_number()).await
    }

    /// Latest block header summary.
    pub async fn latest_block(&self) -> Result<BlockRef, ClientError> {
        let block = self
            .timed(
                "eth_getBlockByNumber",
                self.provider.get_block_by_number(BlockNumberOrTag::Latest),
            )
            .await?
            .ok_or_else(|| ClientError::Response {
                method: "eth_getBlockByNumber".to_string(),
                message: "node returned no latest block".to_string(),
            })?;

        Ok(BlockRef {
            number: block.header.number,
            timestamp: block.header.timestamp,
            hash: block.header.hash,
        })
    }

    /// Logs matching `filter`. Pending logs are rejected.
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<ChainLog>, ClientError> {
        let logs = self.timed("eth_getLogs", self.provider.get_logs(filter)).await?;

        logs.into_iter()
            .map(|log| {
                ChainLog::try_from(log).map_err(|message| ClientError::Response {
                    method: "eth_getLogs".to_string(),
                    message,
                })
            })
            .collect()
    }
}
