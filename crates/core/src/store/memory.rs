//! In-memory [`IndexStore`].

use super::{
    AuthorizationRow, IndexStore, LogQuery, MarketRow, PositionRow, PreLiquidationContractRow,
    StoreError, VaultConfigRow, VaultRow, WithdrawQueueItemRow,
};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use indexer_chain::ChainLog;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Tables {
    markets: Vec<MarketRow>,
    positions: Vec<PositionRow>,
    vaults: Vec<VaultRow>,
    vault_configs: Vec<VaultConfigRow>,
    withdraw_queue: Vec<WithdrawQueueItemRow>,
    pre_liquidations: Vec<PreLiquidationContractRow>,
    authorizations: Vec<AuthorizationRow>,
    logs: Vec<(u64, ChainLog)>,
    latest_block: HashMap<u64, u64>,
}

/// Rows held in memory, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_market(&self, row: MarketRow) {
        self.tables.write().markets.push(row);
    }

    pub fn insert_position(&self, row: PositionRow) {
        self.tables.write().positions.push(row);
    }

    pub fn insert_vault(&self, row: VaultRow) {
        self.tables.write().vaults.push(row);
    }

    pub fn insert_vault_config(&self, row: VaultConfigRow) {
        self.tables.write().vault_configs.push(row);
    }

    pub fn insert_withdraw_queue_item(&self, row: WithdrawQueueItemRow) {
        self.tables.write().withdraw_queue.push(row);
    }

    pub fn insert_pre_liquidation_contract(&self, row: PreLiquidationContractRow) {
        self.tables.write().pre_liquidations.push(row);
    }

    /// Insert or replace the authorization for (authorizer, authorizee).
    pub fn upsert_authorization(&self, row: AuthorizationRow) {
        let mut tables = self.tables.write();
        tables.authorizations.retain(|a| {
            !(a.chain_id == row.chain_id
                && a.authorizer == row.authorizer
                && a.authorizee == row.authorizee)
        });
        tables.authorizations.push(row);
    }

    pub fn insert_log(&self, chain_id: u64, log: ChainLog) {
        self.tables.write().logs.push((chain_id, log));
    }

    pub fn set_latest_indexed_block(&self, chain_id: u64, block: u64) {
        self.tables.write().latest_block.insert(chain_id, block);
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn market(&self, chain_id: u64, id: B256) -> Result<Option<MarketRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .markets
            .iter()
            .find(|m| m.chain_id == chain_id && m.id == id)
            .cloned())
    }

    async fn markets(&self, chain_id: u64, ids: &[B256]) -> Result<Vec<MarketRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .markets
            .iter()
            .filter(|m| m.chain_id == chain_id && ids.contains(&m.id))
            .cloned()
            .collect())
    }

    async fn positions(
        &self,
        chain_id: u64,
        market_ids: &[B256],
    ) -> Result<Vec<PositionRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .positions
            .iter()
            .filter(|p| p.chain_id == chain_id && market_ids.contains(&p.market_id))
            .cloned()
            .collect())
    }

    async fn vault(&self, chain_id: u64, address: Address) -> Result<Option<VaultRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .vaults
            .iter()
            .find(|v| v.chain_id == chain_id && v.address == address)
            .cloned())
    }

    async fn vaults(&self, chain_id: u64, addresses: &[Address]) -> Result<Vec<VaultRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .vaults
            .iter()
            .filter(|v| v.chain_id == chain_id && addresses.contains(&v.address))
            .cloned()
            .collect())
    }

    async fn vault_configs(
        &self,
        chain_id: u64,
        vault: Address,
    ) -> Result<Vec<VaultConfigRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .vault_configs
            .iter()
            .filter(|c| c.chain_id == chain_id && c.address == vault)
            .cloned()
            .collect())
    }

    async fn withdraw_queue_items(
        &self,
        chain_id: u64,
        vaults: &[Address],
    ) -> Result<Vec<WithdrawQueueItemRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .withdraw_queue
            .iter()
            .filter(|item| item.chain_id == chain_id && vaults.contains(&item.address))
            .cloned()
            .collect())
    }

    async fn withdraw_queue_items_for_market(
        &self,
        chain_id: u64,
        market_id: B256,
    ) -> Result<Vec<WithdrawQueueItemRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .withdraw_queue
            .iter()
            .filter(|item| item.chain_id == chain_id && item.market_id == Some(market_id))
            .cloned()
            .collect())
    }

    async fn pre_liquidation_contracts(
        &self,
        chain_id: u64,
        market_ids: &[B256],
    ) -> Result<Vec<PreLiquidationContractRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .pre_liquidations
            .iter()
            .filter(|p| p.chain_id == chain_id && market_ids.contains(&p.market_id))
            .cloned()
            .collect())
    }

    async fn authorizations(
        &self,
        chain_id: u64,
        authorizees: &[Address],
    ) -> Result<Vec<AuthorizationRow>, StoreError> {
        Ok(self
            .tables
            .read()
            .authorizations
            .iter()
            .filter(|a| a.chain_id == chain_id && authorizees.contains(&a.authorizee))
            .cloned()
            .collect())
    }

    async fn latest_indexed_block(&self, chain_id: u64) -> Result<Option<u64>, StoreError> {
        Ok(self.tables.read().latest_block.get(&chain_id).copied())
    }

    async fn logs(&self, chain_id: u64, query: &LogQuery) -> Result<Vec<ChainLog>, StoreError> {
        let tables = self.tables.read();
        let mut logs: Vec<ChainLog> = tables
            .logs
            .iter()
            .filter(|(chain, log)| *chain == chain_id && query.matches(log))
            .map(|(_, log)| log.clone())
            .collect();
        logs.sort_by_key(ChainLog::position);
        logs.truncate(query.limit);
        Ok(logs)
    }
}
