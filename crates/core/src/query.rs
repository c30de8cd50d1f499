//! Domain queries over indexed markets and vaults.

use crate::store::{
    timed, IndexStore, MarketRow, PositionRow, StoreError, VaultConfigRow, VaultRow,
    WithdrawQueueItemRow,
};
use alloy::primitives::{Address, B256};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// A withdraw-queue slot referencing a market, joined with its vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultQueueRef {
    #[serde(flatten)]
    pub item: WithdrawQueueItemRow,
    pub vault: Option<VaultRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketView {
    #[serde(flatten)]
    pub market: MarketRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<PositionRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_vault_withdraw_queues: Option<Vec<VaultQueueRef>>,
}

/// A non-empty withdraw-queue slot joined with its market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    #[serde(flatten)]
    pub item: WithdrawQueueItemRow,
    pub market: Option<MarketRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultView {
    #[serde(flatten)]
    pub vault: VaultRow,
    pub config: Vec<VaultConfigRow>,
    pub withdraw_queue: Vec<QueueEntry>,
}

/// Read-side service behind the market and vault endpoints.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn IndexStore>,
    store_timeout: Duration,
}

impl QueryService {
    pub fn new(store: Arc<dyn IndexStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// Market row, optionally with its positions and the vault queues that
    /// reference it. `None` when the market is not indexed.
    #[instrument(skip(self), fields(market = %market_id))]
    pub async fn market(
        &self,
        chain_id: u64,
        market_id: B256,
        with_positions: bool,
        with_vaults: bool,
    ) -> Result<Option<MarketView>, StoreError> {
        let t = self.store_timeout;
        let Some(market) = timed("market", t, self.store.market(chain_id, market_id)).await? else {
            return Ok(None);
        };

        let positions = if with_positions {
            Some(timed("positions", t, self.store.positions(chain_id, &[market_id])).await?)
        } else {
            None
        };

        let related_vault_withdraw_queues = if with_vaults {
            let items = timed(
                "withdraw_queue_items_for_market",
                t,
                self.store.withdraw_queue_items_for_market(chain_id, market_id),
            )
            .await?;
            let addresses = unique(items.iter().map(|item| item.address));
            let vaults: HashMap<Address, VaultRow> =
                timed("vaults", t, self.store.vaults(chain_id, &addresses))
                    .await?
                    .into_iter()
                    .map(|vault| (vault.address, vault))
                    .collect();
            Some(
                items
                    .into_iter()
                    .map(|item| VaultQueueRef {
                        vault: vaults.get(&item.address).cloned(),
                        item,
                    })
                    .collect(),
            )
        } else {
            None
        };

        Ok(Some(MarketView {
            market,
            positions,
            related_vault_withdraw_queues,
        }))
    }

    /// Market ids of a vault's withdraw queue in queue order, empty slots skipped.
    #[instrument(skip(self))]
    pub async fn vault_withdraw_queue(
        &self,
        chain_id: u64,
        vault: Address,
    ) -> Result<Vec<B256>, StoreError> {
        let mut items = timed(
            "withdraw_queue_items",
            self.store_timeout,
            self.store.withdraw_queue_items(chain_id, &[vault]),
        )
        .await?;
        items.sort_by_key(|item| item.ordinal);
        Ok(items.into_iter().filter_map(|item| item.market_id).collect())
    }

    /// Union of the markets in the given vaults' withdraw queues. Order is
    /// first appearance, walking vaults in input order and each queue by ordinal.
    #[instrument(skip(self, vaults), fields(vaults = vaults.len()))]
    pub async fn withdraw_queue_market_set(
        &self,
        chain_id: u64,
        vaults: &[Address],
    ) -> Result<Vec<B256>, StoreError> {
        let vaults = unique(vaults.iter().copied());
        let items = timed(
            "withdraw_queue_items",
            self.store_timeout,
            self.store.withdraw_queue_items(chain_id, &vaults),
        )
        .await?;

        let mut by_vault: HashMap<Address, Vec<WithdrawQueueItemRow>> = HashMap::new();
        for item in items {
            by_vault.entry(item.address).or_default().push(item);
        }

        let mut market_ids = Vec::new();
        for vault in &vaults {
            let Some(queue) = by_vault.get_mut(vault) else {
                continue;
            };
            queue.sort_by_key(|item| item.ordinal);
            market_ids.extend(queue.iter().filter_map(|item| item.market_id));
        }
        let market_ids = unique(market_ids);
        debug!(markets = market_ids.len(), "Reconstructed withdraw queue market set");
        Ok(market_ids)
    }

    /// Vault row with its market configs and withdraw queue. `None` when the
    /// vault is not indexed.
    #[instrument(skip(self))]
    pub async fn vault(&self, chain_id: u64, address: Address) -> Result<Option<VaultView>, StoreError> {
        let t = self.store_timeout;
        let Some(vault) = timed("vault", t, self.store.vault(chain_id, address)).await? else {
            return Ok(None);
        };
        let config = timed("vault_configs", t, self.store.vault_configs(chain_id, address)).await?;

        let mut items: Vec<WithdrawQueueItemRow> = timed(
            "withdraw_queue_items",
            t,
            self.store.withdraw_queue_items(chain_id, &[address]),
        )
        .await?
        .into_iter()
        .filter(|item| item.market_id.is_some())
        .collect();
        items.sort_by_key(|item| item.ordinal);

        let market_ids = unique(items.iter().filter_map(|item| item.market_id));
        let markets: HashMap<B256, MarketRow> =
            timed("markets", t, self.store.markets(chain_id, &market_ids))
                .await?
                .into_iter()
                .map(|market| (market.id, market))
                .collect();

        let withdraw_queue = items
            .into_iter()
            .map(|item| QueueEntry {
                market: item.market_id.and_then(|id| markets.get(&id).cloned()),
                item,
            })
            .collect();

        Ok(Some(VaultView {
            vault,
            config,
            withdraw_queue,
        }))
    }
}

/// Deduplicate, keeping first appearances in order.
pub(crate) fn unique<T: Copy + Eq + std::hash::Hash>(values: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    values.into_iter().filter(|value| seen.insert(*value)).collect()
}
