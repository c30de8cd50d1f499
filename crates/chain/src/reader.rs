//! Live contract reads used by the liquidation engine.

use crate::client::{BlockRef, ChainClient, ClientError};
use crate::contracts::{IIrm, IMorpho, IOracle, Market, MarketParams};
use alloy::eips::BlockId;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use tracing::debug;

/// Market totals as returned by Morpho `market(id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarketState {
    pub total_supply_assets: U256,
    pub total_supply_shares: U256,
    pub total_borrow_assets: U256,
    pub total_borrow_shares: U256,
    /// Timestamp of the last interest accrual
    pub last_update: u64,
    pub fee: U256,
}

impl MarketState {
    fn to_abi(self) -> Market {
        Market {
            totalSupplyAssets: self.total_supply_assets.saturating_to(),
            totalSupplyShares: self.total_supply_shares.saturating_to(),
            totalBorrowAssets: self.total_borrow_assets.saturating_to(),
            totalBorrowShares: self.total_borrow_shares.saturating_to(),
            lastUpdate: self.last_update as u128,
            fee: self.fee.saturating_to(),
        }
    }
}

impl From<IMorpho::marketReturn> for MarketState {
    fn from(ret: IMorpho::marketReturn) -> Self {
        Self {
            total_supply_assets: U256::from(ret.totalSupplyAssets),
            total_supply_shares: U256::from(ret.totalSupplyShares),
            total_borrow_assets: U256::from(ret.totalBorrowAssets),
            total_borrow_shares: U256::from(ret.totalBorrowShares),
            last_update: u64::try_from(ret.lastUpdate).unwrap_or(u64::MAX),
            fee: U256::from(ret.fee),
        }
    }
}

/// Reads block-current protocol values.
#[async_trait]
pub trait LiveReader: Send + Sync {
    async fn latest_block(&self) -> Result<BlockRef, ClientError>;

    async fn market_params(&self, id: B256, block: u64) -> Result<MarketParams, ClientError>;

    async fn market_state(&self, id: B256, block: u64) -> Result<MarketState, ClientError>;

    /// Oracle price of one collateral unit in loan units, scaled by 1e36.
    async fn oracle_price(&self, oracle: Address, block: u64) -> Result<U256, ClientError>;

    /// Per-second borrow rate (WAD) the IRM would apply to `state`.
    async fn borrow_rate(
        &self,
        params: &MarketParams,
        state: &MarketState,
        block: u64,
    ) -> Result<U256, ClientError>;
}

/// [`LiveReader`] backed by a Morpho Blue deployment.
#[derive(Debug, Clone)]
pub struct MorphoReader {
    client: ChainClient,
    morpho: Address,
}

impl MorphoReader {
    pub fn new(client: ChainClient, morpho: Address) -> Self {
        Self { client, morpho }
    }

    pub fn morpho(&self) -> Address {
        self.morpho
    }
}

#[async_trait]
impl LiveReader for MorphoReader {
    async fn latest_block(&self) -> Result<BlockRef, ClientError> {
        self.client.latest_block().await
    }

    async fn market_params(&self, id: B256, block: u64) -> Result<MarketParams, ClientError> {
        let morpho = IMorpho::new(self.morpho, self.client.provider());
        let ret = self
            .client
            .timed(
                "idToMarketParams",
                morpho.idToMarketParams(id).block(BlockId::number(block)).call(),
            )
            .await?;

        Ok(MarketParams {
            loanToken: ret.loanToken,
            collateralToken: ret.collateralToken,
            oracle: ret.oracle,
            irm: ret.irm,
            lltv: ret.lltv,
        })
    }

    async fn market_state(&self, id: B256, block: u64) -> Result<MarketState, ClientError> {
        let morpho = IMorpho::new(self.morpho, self.client.provider());
        let ret = self
            .client
            .timed("market", morpho.market(id).block(BlockId::number(block)).call())
            .await?;
        Ok(ret.into())
    }

    async fn oracle_price(&self, oracle: Address, block: u64) -> Result<U256, ClientError> {
        let instance = IOracle::new(oracle, self.client.provider());
        let ret = self
            .client
            .timed("price", instance.price().block(BlockId::number(block)).call())
            .await?;
        debug!(%oracle, block, price = %ret._0, "oracle price");
        Ok(ret._0)
    }

    async fn borrow_rate(
        &self,
        params: &MarketParams,
        state: &MarketState,
        block: u64,
    ) -> Result<U256, ClientError> {
        // Markets without an IRM accrue no interest
        if params.irm == Address::ZERO {
            return Ok(U256::ZERO);
        }

        let irm = IIrm::new(params.irm, self.client.provider());
        let ret = self
            .client
            .timed(
                "borrowRateView",
                irm.borrowRateView(params.clone(), state.to_abi())
                    .block(BlockId::number(block))
                    .call(),
            )
            .await?;
        Ok(ret._0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockEndpoint, Reply};
    use alloy::primitives::{address, Bytes};
    use alloy::sol_types::SolValue;
    use serde_json::json;
    use std::time::Duration;

    const MORPHO: Address = address!("BBBBBbbBBb9cC5e90e3b3Af64bdAF62C37EEFFCb");

    fn reader(endpoint: &MockEndpoint, morpho: Address) -> MorphoReader {
        MorphoReader::new(ChainClient::new(endpoint.transport(), Duration::from_secs(1)), morpho)
    }

    fn params(irm: Address) -> MarketParams {
        MarketParams {
            loanToken: Address::ZERO,
            collateralToken: Address::ZERO,
            oracle: Address::ZERO,
            irm,
            lltv: U256::ZERO,
        }
    }

    #[tokio::test]
    async fn test_market_state_decodes() {
        let words = (
            1_000u128, 1_000_000_000u128, 800u128, 800_000_000u128, 1_700_000_000u128, 0u128,
        );
        let endpoint = MockEndpoint::always(
            "node",
            Reply::Result(json!(Bytes::from(words.abi_encode_params()))),
        );

        let state = reader(&endpoint, MORPHO).market_state(B256::ZERO, 1).await.unwrap();
        assert_eq!(state.total_borrow_assets, U256::from(800));
        assert_eq!(state.total_borrow_shares, U256::from(800_000_000u64));
        assert_eq!(state.last_update, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_oracle_price_decodes() {
        let price = U256::from(10u64).pow(U256::from(36u64));
        let endpoint = MockEndpoint::always("node", Reply::Result(json!(Bytes::from(price.abi_encode()))));

        let read = reader(&endpoint, MORPHO)
            .oracle_price(address!("0000000000000000000000000000000000000001"), 7)
            .await
            .unwrap();
        assert_eq!(read, price);
    }

    #[tokio::test]
    async fn test_reverted_call_is_contract_error() {
        let endpoint = MockEndpoint::always("node", Reply::rpc_error(3, "execution reverted"));
        let err = reader(&endpoint, MORPHO)
            .borrow_rate(&params(Address::repeat_byte(0x40)), &MarketState::default(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Contract(_)));
        assert!(err.to_string().contains("execution reverted"));
    }

    #[tokio::test]
    async fn test_zero_irm_skips_call() {
        let endpoint = MockEndpoint::always("node", Reply::Result(json!("0x")));
        let rate = reader(&endpoint, Address::ZERO)
            .borrow_rate(&params(Address::ZERO), &MarketState::default(), 1)
            .await
            .unwrap();
        assert_eq!(rate, U256::ZERO);
        assert_eq!(endpoint.call_count(), 0);
    }
}
