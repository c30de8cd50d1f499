//! Indexed rows, as read from the indexer's tables.

use alloy::primitives::{Address, B256, U256};
use serde::Serialize;

/// Morpho Blue market: parameters and totals at the last indexed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRow {
    pub chain_id: u64,
    pub id: B256,
    pub loan_token: Address,
    pub collateral_token: Address,
    pub oracle: Address,
    pub irm: Address,
    #[serde(with = "crate::wide")]
    pub lltv: U256,
    #[serde(with = "crate::wide")]
    pub total_supply_assets: U256,
    #[serde(with = "crate::wide")]
    pub total_supply_shares: U256,
    #[serde(with = "crate::wide")]
    pub total_borrow_assets: U256,
    #[serde(with = "crate::wide")]
    pub total_borrow_shares: U256,
    #[serde(with = "crate::wide")]
    pub last_update: U256,
    #[serde(with = "crate::wide")]
    pub fee: U256,
    /// Adaptive curve IRM rate at target, once the IRM has been touched
    #[serde(with = "crate::wide::option")]
    pub rate_at_target: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRow {
    pub chain_id: u64,
    pub market_id: B256,
    pub user: Address,
    #[serde(with = "crate::wide")]
    pub supply_shares: U256,
    #[serde(with = "crate::wide")]
    pub borrow_shares: U256,
    #[serde(with = "crate::wide")]
    pub collateral: U256,
}

/// MetaMorpho vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRow {
    pub chain_id: u64,
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub asset: Address,
    pub owner: Address,
    pub curator: Address,
    pub guardian: Address,
    #[serde(with = "crate::wide")]
    pub timelock: U256,
    #[serde(with = "crate::wide")]
    pub fee: U256,
    pub fee_recipient: Address,
    pub skim_recipient: Address,
}

/// Per-market configuration of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfigRow {
    pub chain_id: u64,
    /// Vault address
    pub address: Address,
    pub market_id: B256,
    #[serde(with = "crate::wide")]
    pub cap: U256,
    #[serde(with = "crate::wide")]
    pub pending_cap: U256,
    #[serde(with = "crate::wide")]
    pub removable_at: U256,
    pub enabled: bool,
}

/// Slot of a vault's withdraw queue. `market_id` is `None` for an emptied slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawQueueItemRow {
    pub chain_id: u64,
    /// Vault address
    pub address: Address,
    pub ordinal: u32,
    pub market_id: Option<B256>,
}

/// Pre-liquidation contract created by the PreLiquidation factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreLiquidationContractRow {
    pub chain_id: u64,
    pub market_id: B256,
    pub address: Address,
    #[serde(with = "crate::wide")]
    pub pre_lltv: U256,
    #[serde(rename = "preLCF1", with = "crate::wide")]
    pub pre_lcf1: U256,
    #[serde(rename = "preLCF2", with = "crate::wide")]
    pub pre_lcf2: U256,
    #[serde(rename = "preLIF1", with = "crate::wide")]
    pub pre_lif1: U256,
    #[serde(rename = "preLIF2", with = "crate::wide")]
    pub pre_lif2: U256,
    pub pre_liquidation_oracle: Address,
}

/// Morpho `setAuthorization` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRow {
    pub chain_id: u64,
    pub authorizer: Address,
    pub authorizee: Address,
    pub is_authorized: bool,
}
