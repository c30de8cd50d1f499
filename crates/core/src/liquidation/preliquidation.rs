//! Pre-liquidation check for a position against one pre-liquidation contract.

use super::candidate::borrowed_assets;
use crate::math::{mul_div_down, to_assets_up, w_div_down, w_div_up, w_mul_down, ORACLE_PRICE_SCALE};
use crate::store::{PositionRow, PreLiquidationContractRow};
use alloy::primitives::{Address, B256, U256};
use indexer_chain::contracts::MarketParams;
use indexer_chain::MarketState;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreLiquidationCandidate {
    pub market_id: B256,
    pub borrower: Address,
    /// Pre-liquidation contract allowed to act on the position
    pub pre_liquidation: Address,
    #[serde(with = "crate::wide")]
    pub ltv: U256,
    #[serde(rename = "preLCF", with = "crate::wide")]
    pub pre_lcf: U256,
    #[serde(rename = "preLIF", with = "crate::wide")]
    pub pre_lif: U256,
    #[serde(with = "crate::wide")]
    pub borrow_shares: U256,
    #[serde(with = "crate::wide")]
    pub collateral: U256,
    #[serde(with = "crate::wide")]
    pub borrowed_assets: U256,
    /// Borrow shares the contract may repay in one call
    #[serde(with = "crate::wide")]
    pub repayable_shares: U256,
    #[serde(with = "crate::wide")]
    pub seizable_collateral: U256,
}

/// Linear interpolation between `low` and `high` as `ltv` moves from
/// `pre_lltv` to `lltv`.
fn interpolate(quotient: U256, low: U256, high: U256) -> Option<U256> {
    let value = w_mul_down(quotient, high.checked_sub(low)?)?.checked_add(low)?;
    Some(value.min(high))
}

/// Evaluate one position against `contract`, priced by the contract's own
/// oracle. The borrower's authorization is checked by the caller. As with the
/// base check, an outer `None` is an arithmetic failure.
pub fn evaluate(
    params: &MarketParams,
    state: &MarketState,
    contract: &PreLiquidationContractRow,
    pre_price: U256,
    position: &PositionRow,
) -> Option<Option<PreLiquidationCandidate>> {
    if position.borrow_shares.is_zero() {
        return Some(None);
    }

    let borrowed = borrowed_assets(position.borrow_shares, state)?;
    let collateral_quoted = mul_div_down(position.collateral, pre_price, ORACLE_PRICE_SCALE)?;
    // No collateral value: past the liquidation threshold, not a pre-liquidation
    if collateral_quoted.is_zero() {
        return Some(None);
    }
    let ltv = w_div_up(borrowed, collateral_quoted)?;

    if ltv <= contract.pre_lltv || ltv > params.lltv {
        return Some(None);
    }

    let quotient = w_div_down(
        ltv.checked_sub(contract.pre_lltv)?,
        params.lltv.checked_sub(contract.pre_lltv)?,
    )?;
    let pre_lcf = interpolate(quotient, contract.pre_lcf1, contract.pre_lcf2)?;
    let pre_lif = interpolate(quotient, contract.pre_lif1, contract.pre_lif2)?;

    let repayable_shares = w_mul_down(position.borrow_shares, pre_lcf)?;
    let repaid_assets = to_assets_up(
        repayable_shares,
        state.total_borrow_assets,
        state.total_borrow_shares,
    )?;
    let seizable_collateral = mul_div_down(
        w_mul_down(repaid_assets, pre_lif)?,
        ORACLE_PRICE_SCALE,
        pre_price,
    )?
    .min(position.collateral);

    Some(Some(PreLiquidationCandidate {
        market_id: contract.market_id,
        borrower: position.user,
        pre_liquidation: contract.address,
        ltv,
        pre_lcf,
        pre_lif,
        borrow_shares: position.borrow_shares,
        collateral: position.collateral,
        borrowed_assets: borrowed,
        repayable_shares,
        seizable_collateral,
    }))
}
