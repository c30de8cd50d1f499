//! Read-only access to indexed state.
//!
//! [`IndexStore`] is the seam between query logic and storage:
//! - [`PgStore`] reads the indexer's Postgres tables
//! - [`MemoryStore`] keeps rows in memory (tests, local runs without a database)

mod memory;
mod models;
mod postgres;

pub use memory::MemoryStore;
pub use models::{
    AuthorizationRow, MarketRow, PositionRow, PreLiquidationContractRow, VaultConfigRow, VaultRow,
    WithdrawQueueItemRow,
};
pub use postgres::PgStore;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use indexer_chain::ChainLog;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage query failed: {0}")]
    Query(String),

    #[error("storage {operation} did not complete within {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("malformed {column} value `{value}`")]
    Corrupt { column: &'static str, value: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

/// Bound a storage call by `timeout`.
pub async fn timed<T, F>(operation: &'static str, timeout: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| StoreError::Timeout { operation, timeout })?
}

/// `eth_getLogs`-style selection over indexed logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub from_block: u64,
    pub to_block: u64,
    /// Restrict to a single block by hash
    pub block_hash: Option<B256>,
    /// Emitting contracts; empty matches any
    pub addresses: Vec<Address>,
    /// Positional topic filters; `None` is a wildcard, a set matches any member
    pub topics: Vec<Option<Vec<B256>>>,
    /// Maximum number of logs to return
    pub limit: usize,
}

impl LogQuery {
    pub fn matches(&self, log: &ChainLog) -> bool {
        if log.block_number < self.from_block || log.block_number > self.to_block {
            return false;
        }
        if self.block_hash.is_some_and(|hash| hash != log.block_hash) {
            return false;
        }
        if !self.addresses.is_empty() && !self.addresses.contains(&log.address) {
            return false;
        }
        self.topics.iter().enumerate().all(|(i, filter)| match filter {
            None => true,
            Some(any_of) => log.topics.get(i).is_some_and(|topic| any_of.contains(topic)),
        })
    }
}

/// Read-only queries over indexed rows of one or more chains.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn market(&self, chain_id: u64, id: B256) -> Result<Option<MarketRow>, StoreError>;

    async fn markets(&self, chain_id: u64, ids: &[B256]) -> Result<Vec<MarketRow>, StoreError>;

    /// Positions in the given markets.
    async fn positions(
        &self,
        chain_id: u64,
        market_ids: &[B256],
    ) -> Result<Vec<PositionRow>, StoreError>;

    async fn vault(&self, chain_id: u64, address: Address) -> Result<Option<VaultRow>, StoreError>;

    async fn vaults(&self, chain_id: u64, addresses: &[Address]) -> Result<Vec<VaultRow>, StoreError>;

    async fn vault_configs(
        &self,
        chain_id: u64,
        vault: Address,
    ) -> Result<Vec<VaultConfigRow>, StoreError>;

    /// Withdraw queue slots of the given vaults, empty slots included.
    async fn withdraw_queue_items(
        &self,
        chain_id: u64,
        vaults: &[Address],
    ) -> Result<Vec<WithdrawQueueItemRow>, StoreError>;

    /// Withdraw queue slots referencing a market.
    async fn withdraw_queue_items_for_market(
        &self,
        chain_id: u64,
        market_id: B256,
    ) -> Result<Vec<WithdrawQueueItemRow>, StoreError>;

    async fn pre_liquidation_contracts(
        &self,
        chain_id: u64,
        market_ids: &[B256],
    ) -> Result<Vec<PreLiquidationContractRow>, StoreError>;

    /// Authorizations granted to any of `authorizees`.
    async fn authorizations(
        &self,
        chain_id: u64,
        authorizees: &[Address],
    ) -> Result<Vec<AuthorizationRow>, StoreError>;

    /// Highest block whose events are all indexed.
    async fn latest_indexed_block(&self, chain_id: u64) -> Result<Option<u64>, StoreError>;

    /// Matching logs ordered by (block number, log index), at most `query.limit`.
    async fn logs(&self, chain_id: u64, query: &LogQuery) -> Result<Vec<ChainLog>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Bytes;

    fn log(block: u64, address: Address, topics: &[B256]) -> ChainLog {
        ChainLog {
            block_number: block,
            block_hash: B256::repeat_byte(block as u8),
            transaction_hash: B256::ZERO,
            transaction_index: 0,
            log_index: 0,
            address,
            topics: topics.iter().copied().collect(),
            data: Bytes::new(),
        }
    }

    #[test]
    fn test_log_query_matching() {
        let a = Address::repeat_byte(0xaa);
        let t0 = B256::repeat_byte(0x01);
        let t1 = B256::repeat_byte(0x02);
        let entry = log(5, a, &[t0, t1]);

        let mut query = LogQuery {
            from_block: 0,
            to_block: 10,
            limit: 10,
            ..Default::default()
        };
        assert!(query.matches(&entry));

        query.addresses = vec![Address::repeat_byte(0xbb)];
        assert!(!query.matches(&entry));
        query.addresses = vec![Address::repeat_byte(0xbb), a];
        assert!(query.matches(&entry));

        query.topics = vec![None, Some(vec![t0, t1])];
        assert!(query.matches(&entry));
        query.topics = vec![Some(vec![t1])];
        assert!(!query.matches(&entry));
        query.topics = vec![None, None, Some(vec![t0])];
        assert!(!query.matches(&entry));

        query.topics.clear();
        query.to_block = 4;
        assert!(!query.matches(&entry));

        query.to_block = 10;
        query.block_hash = Some(B256::repeat_byte(6));
        assert!(!query.matches(&entry));
    }

    #[tokio::test]
    async fn test_timed_reports_timeout() {
        let err = timed("market", Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, StoreError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Timeout { operation: "market", .. }));
    }
}
