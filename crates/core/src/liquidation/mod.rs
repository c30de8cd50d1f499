//! Liquidation and pre-liquidation candidate engine.
//!
//! Positions come from the index; market totals, parameters, oracle prices and
//! IRM rates are read live at the head block, and interest is accrued to that
//! block's timestamp before any health check. A market whose live reads fail
//! is reported as unevaluated rather than silently treated as healthy.

mod candidate;
mod preliquidation;

pub use candidate::{accrue_interest, LiquidationCandidate};
pub use preliquidation::PreLiquidationCandidate;

use crate::config::EngineConfig;
use crate::query::unique;
use crate::store::{timed, IndexStore, PositionRow, PreLiquidationContractRow, StoreError};
use alloy::primitives::{Address, B256, U256};
use futures::stream::{self, StreamExt};
use indexer_chain::contracts::MarketParams;
use indexer_chain::{BlockRef, ClientError, LiveReader, MarketState, WatchSet};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("live read `{operation}` did not complete within {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("market is not created at block {0}")]
    MissingMarket(u64),

    #[error("arithmetic overflow while evaluating {0}")]
    Overflow(&'static str),
}

/// A market that could not be evaluated, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unevaluated {
    pub market_id: B256,
    pub error: String,
}

/// Engine output at one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReport<C> {
    #[serde(with = "crate::wide")]
    pub block_number: u64,
    pub candidates: Vec<C>,
    pub unevaluated: Vec<Unevaluated>,
}

/// Live market view at the evaluated block, interest accrued.
#[derive(Debug, Clone)]
struct MarketSnapshot {
    params: MarketParams,
    state: MarketState,
}

pub struct LiquidationEngine {
    store: Arc<dyn IndexStore>,
    config: EngineConfig,
}

impl LiquidationEngine {
    pub fn new(store: Arc<dyn IndexStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    async fn live<T, F>(&self, operation: &'static str, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        let timeout = self.config.rpc_timeout;
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| EngineError::Timeout { operation, timeout })?
            .map_err(EngineError::from)
    }

    async fn head(&self, reader: &dyn LiveReader) -> Result<BlockRef, EngineError> {
        self.live("latest_block", reader.latest_block()).await
    }

    /// Market params and accrued totals at `head`.
    async fn snapshot(
        &self,
        reader: &dyn LiveReader,
        market_id: B256,
        head: BlockRef,
    ) -> Result<MarketSnapshot, EngineError> {
        let (params, state) = tokio::try_join!(
            self.live("market_params", reader.market_params(market_id, head.number)),
            self.live("market_state", reader.market_state(market_id, head.number)),
        )?;
        if state.last_update == 0 {
            return Err(EngineError::MissingMarket(head.number));
        }

        let rate = self
            .live("borrow_rate", reader.borrow_rate(&params, &state, head.number))
            .await?;
        let state = accrue_interest(state, rate, head.timestamp)
            .ok_or(EngineError::Overflow("interest accrual"))?;
        Ok(MarketSnapshot { params, state })
    }

    async fn positions_by_market(
        &self,
        chain_id: u64,
        market_ids: &[B256],
    ) -> Result<HashMap<B256, Vec<PositionRow>>, EngineError> {
        let rows = timed(
            "positions",
            self.config.store_timeout,
            self.store.positions(chain_id, market_ids),
        )
        .await?;
        let mut by_market: HashMap<B256, Vec<PositionRow>> = HashMap::new();
        for row in rows.into_iter().filter(|p| !p.borrow_shares.is_zero()) {
            by_market.entry(row.market_id).or_default().push(row);
        }
        Ok(by_market)
    }

    /// Positions Morpho would let anyone liquidate at the head block.
    #[instrument(skip(self, reader, market_ids), fields(markets = market_ids.len()))]
    pub async fn liquidatable(
        &self,
        chain_id: u64,
        reader: &dyn LiveReader,
        market_ids: &[B256],
    ) -> Result<CandidateReport<LiquidationCandidate>, EngineError> {
        let market_ids = unique(market_ids.iter().copied());
        let head = self.head(reader).await?;
        let positions = self.positions_by_market(chain_id, &market_ids).await?;

        let results: Vec<(B256, Result<Vec<LiquidationCandidate>, EngineError>)> =
            stream::iter(market_ids.iter().copied())
                .map(|market_id| {
                    let positions = positions.get(&market_id).map(Vec::as_slice).unwrap_or(&[]);
                    async move {
                        let result = self.liquidatable_in(reader, market_id, head, positions).await;
                        (market_id, result)
                    }
                })
                .buffer_unordered(self.config.max_concurrent_reads.max(1))
                .collect()
                .await;

        let report = into_report(head.number, results, |c| (c.market_id, c.borrower, Address::ZERO));
        info!(
            block = head.number,
            candidates = report.candidates.len(),
            unevaluated = report.unevaluated.len(),
            "Liquidatable positions computed"
        );
        Ok(report)
    }

    async fn liquidatable_in(
        &self,
        reader: &dyn LiveReader,
        market_id: B256,
        head: BlockRef,
        positions: &[PositionRow],
    ) -> Result<Vec<LiquidationCandidate>, EngineError> {
        let snapshot = self.snapshot(reader, market_id, head).await?;
        let price = self
            .live("oracle_price", reader.oracle_price(snapshot.params.oracle, head.number))
            .await?;

        let mut candidates = Vec::new();
        for position in positions {
            let result = candidate::evaluate(market_id, &snapshot.params, &snapshot.state, price, position)
                .ok_or(EngineError::Overflow("position health"))?;
            candidates.extend(result);
        }
        debug!(market = %market_id, positions = positions.len(), candidates = candidates.len(), "Market evaluated");
        Ok(candidates)
    }

    /// Positions an authorized pre-liquidation contract may act on at the head block.
    ///
    /// With a `discovery` watch set, indexed contracts the factory never
    /// created are skipped (see [`Self::discovered_only`]).
    #[instrument(skip(self, reader, market_ids, discovery), fields(markets = market_ids.len()))]
    pub async fn preliquidatable(
        &self,
        chain_id: u64,
        reader: &dyn LiveReader,
        market_ids: &[B256],
        discovery: Option<&WatchSet>,
    ) -> Result<CandidateReport<PreLiquidationCandidate>, EngineError> {
        let market_ids = unique(market_ids.iter().copied());
        let head = self.head(reader).await?;
        let t = self.config.store_timeout;

        let contracts = timed(
            "pre_liquidation_contracts",
            t,
            self.store.pre_liquidation_contracts(chain_id, &market_ids),
        )
        .await?;
        let contracts = self.discovered_only(chain_id, contracts, discovery).await?;
        let contract_addresses = unique(contracts.iter().map(|c| c.address));
        let authorized: HashSet<(Address, Address)> = timed(
            "authorizations",
            t,
            self.store.authorizations(chain_id, &contract_addresses),
        )
        .await?
        .into_iter()
        .filter(|a| a.is_authorized)
        .map(|a| (a.authorizer, a.authorizee))
        .collect();

        let mut contracts_by_market: HashMap<B256, Vec<PreLiquidationContractRow>> = HashMap::new();
        for contract in contracts {
            contracts_by_market.entry(contract.market_id).or_default().push(contract);
        }
        // Markets without a pre-liquidation contract have nothing to evaluate
        let active: Vec<B256> = market_ids
            .iter()
            .copied()
            .filter(|id| contracts_by_market.contains_key(id))
            .collect();
        let positions = self.positions_by_market(chain_id, &active).await?;

        let results: Vec<(B256, Result<Vec<PreLiquidationCandidate>, EngineError>)> =
            stream::iter(active.iter().copied())
                .map(|market_id| {
                    let contracts = contracts_by_market.get(&market_id).map(Vec::as_slice).unwrap_or(&[]);
                    let positions = positions.get(&market_id).map(Vec::as_slice).unwrap_or(&[]);
                    let authorized = &authorized;
                    async move {
                        let result = self
                            .preliquidatable_in(reader, market_id, head, contracts, positions, authorized)
                            .await;
                        (market_id, result)
                    }
                })
                .buffer_unordered(self.config.max_concurrent_reads.max(1))
                .collect()
                .await;

        let report = into_report(head.number, results, |c| (c.market_id, c.borrower, c.pre_liquidation));
        info!(
            block = head.number,
            candidates = report.candidates.len(),
            unevaluated = report.unevaluated.len(),
            "Pre-liquidatable positions computed"
        );
        Ok(report)
    }

    /// Keep the contracts factory discovery has seen.
    ///
    /// Discovery only vouches for blocks it has processed. Until it has caught
    /// up with the last indexed block every row is kept; after that a row whose
    /// address is not watched did not come from a configured factory.
    async fn discovered_only(
        &self,
        chain_id: u64,
        contracts: Vec<PreLiquidationContractRow>,
        discovery: Option<&WatchSet>,
    ) -> Result<Vec<PreLiquidationContractRow>, EngineError> {
        let Some((watch_set, processed)) =
            discovery.and_then(|set| set.processed_through().map(|block| (set, block)))
        else {
            return Ok(contracts);
        };

        let indexed = timed(
            "latest_indexed_block",
            self.config.store_timeout,
            self.store.latest_indexed_block(chain_id),
        )
        .await?;
        if indexed.map_or(true, |indexed| processed < indexed) {
            debug!(chain_id, processed, ?indexed, "Discovery behind the index, keeping every contract");
            return Ok(contracts);
        }

        let (kept, skipped): (Vec<_>, Vec<_>) = contracts
            .into_iter()
            .partition(|contract| watch_set.is_watched(contract.address, processed));
        for contract in &skipped {
            warn!(chain_id, address = %contract.address, "Pre-liquidation contract was not discovered from a factory, skipped");
        }
        Ok(kept)
    }

    async fn preliquidatable_in(
        &self,
        reader: &dyn LiveReader,
        market_id: B256,
        head: BlockRef,
        contracts: &[PreLiquidationContractRow],
        positions: &[PositionRow],
        authorized: &HashSet<(Address, Address)>,
    ) -> Result<Vec<PreLiquidationCandidate>, EngineError> {
        let snapshot = self.snapshot(reader, market_id, head).await?;

        let oracles = unique(contracts.iter().map(|c| c.pre_liquidation_oracle));
        let mut prices: HashMap<Address, U256> = HashMap::with_capacity(oracles.len());
        for oracle in oracles {
            let price = self
                .live("oracle_price", reader.oracle_price(oracle, head.number))
                .await?;
            prices.insert(oracle, price);
        }

        let mut candidates = Vec::new();
        for contract in contracts {
            let Some(&price) = prices.get(&contract.pre_liquidation_oracle) else {
                continue;
            };
            for position in positions {
                if !authorized.contains(&(position.user, contract.address)) {
                    continue;
                }
                let result =
                    preliquidation::evaluate(&snapshot.params, &snapshot.state, contract, price, position)
                        .ok_or(EngineError::Overflow("pre-liquidation ltv"))?;
                candidates.extend(result);
            }
        }
        Ok(candidates)
    }
}

/// Split per-market results into a sorted report.
fn into_report<C, K: Ord>(
    block_number: u64,
    results: Vec<(B256, Result<Vec<C>, EngineError>)>,
    key: impl Fn(&C) -> K,
) -> CandidateReport<C> {
    let mut candidates = Vec::new();
    let mut unevaluated = Vec::new();
    for (market_id, result) in results {
        match result {
            Ok(found) => candidates.extend(found),
            Err(e) => {
                warn!(market = %market_id, error = %e, "Market not evaluated");
                unevaluated.push(Unevaluated {
                    market_id,
                    error: e.to_string(),
                });
            }
        }
    }
    candidates.sort_by_key(|c| key(c));
    unevaluated.sort_by_key(|u| u.market_id);
    CandidateReport {
        block_number,
        candidates,
        unevaluated,
    }
}
