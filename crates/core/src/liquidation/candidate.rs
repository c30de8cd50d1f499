//! Base liquidation check for a single position.

use crate::math::{
    liquidation_incentive_factor, mul_div_down, to_assets_up, to_shares_down, w_mul_down,
    w_taylor_compounded, ORACLE_PRICE_SCALE,
};
use crate::store::PositionRow;
use alloy::primitives::{Address, B256, U256};
use indexer_chain::contracts::MarketParams;
use indexer_chain::MarketState;
use serde::Serialize;

/// A position Morpho would let anyone liquidate at the evaluated block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationCandidate {
    pub market_id: B256,
    pub borrower: Address,
    #[serde(with = "crate::wide")]
    pub borrow_shares: U256,
    #[serde(with = "crate::wide")]
    pub collateral: U256,
    /// Debt with interest accrued to the evaluated block
    #[serde(with = "crate::wide")]
    pub borrowed_assets: U256,
    #[serde(with = "crate::wide")]
    pub max_borrow: U256,
    /// Collateral seized by repaying the whole debt, capped at the position's collateral
    #[serde(with = "crate::wide")]
    pub seizable_collateral: U256,
}

/// Market totals with interest accrued up to `timestamp`.
///
/// Follows Morpho's `_accrueInterest`: interest is added to both borrow and
/// supply assets and the fee is minted as supply shares.
pub fn accrue_interest(state: MarketState, borrow_rate: U256, timestamp: u64) -> Option<MarketState> {
    let elapsed = timestamp.saturating_sub(state.last_update);
    if elapsed == 0 {
        return Some(state);
    }

    let growth = w_taylor_compounded(borrow_rate, U256::from(elapsed))?;
    let interest = w_mul_down(state.total_borrow_assets, growth)?;

    let mut accrued = state;
    accrued.total_borrow_assets = state.total_borrow_assets.checked_add(interest)?;
    accrued.total_supply_assets = state.total_supply_assets.checked_add(interest)?;
    accrued.last_update = timestamp;

    if !state.fee.is_zero() {
        let fee_amount = w_mul_down(interest, state.fee)?;
        let fee_shares = to_shares_down(
            fee_amount,
            accrued.total_supply_assets.checked_sub(fee_amount)?,
            accrued.total_supply_shares,
        )?;
        accrued.total_supply_shares = accrued.total_supply_shares.checked_add(fee_shares)?;
    }
    Some(accrued)
}

/// Debt of `borrow_shares` against accrued totals, rounded up.
pub fn borrowed_assets(borrow_shares: U256, state: &MarketState) -> Option<U256> {
    to_assets_up(borrow_shares, state.total_borrow_assets, state.total_borrow_shares)
}

/// Evaluate one position. `None` from the outer option means the arithmetic
/// overflowed; `Some(None)` is a healthy position.
pub fn evaluate(
    market_id: B256,
    params: &MarketParams,
    state: &MarketState,
    price: U256,
    position: &PositionRow,
) -> Option<Option<LiquidationCandidate>> {
    if position.borrow_shares.is_zero() {
        return Some(None);
    }

    let borrowed = borrowed_assets(position.borrow_shares, state)?;
    let collateral_quoted = mul_div_down(position.collateral, price, ORACLE_PRICE_SCALE)?;
    let max_borrow = w_mul_down(collateral_quoted, params.lltv)?;

    if borrowed <= max_borrow {
        return Some(None);
    }

    Some(Some(LiquidationCandidate {
        market_id,
        borrower: position.user,
        borrow_shares: position.borrow_shares,
        collateral: position.collateral,
        borrowed_assets: borrowed,
        max_borrow,
        seizable_collateral: seizable_collateral(borrowed, price, params.lltv, position.collateral),
    }))
}

/// Collateral seized when repaying `repaid` assets: `repaid * LIF / price`.
/// Zero price (nothing to seize against) yields the whole collateral.
fn seizable_collateral(repaid: U256, price: U256, lltv: U256, collateral: U256) -> U256 {
    let seized = liquidation_incentive_factor(lltv)
        .and_then(|lif| w_mul_down(repaid, lif))
        .and_then(|incentivized| mul_div_down(incentivized, ORACLE_PRICE_SCALE, price));
    match seized {
        Some(seized) => seized.min(collateral),
        None => collateral,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const LLTV_80: u64 = 800_000_000_000_000_000;

    pub fn params(lltv: u64) -> MarketParams {
        MarketParams {
            loanToken: Address::repeat_byte(0x10),
            collateralToken: Address::repeat_byte(0x20),
            oracle: Address::repeat_byte(0x30),
            irm: Address::ZERO,
            lltv: U256::from(lltv),
        }
    }

    /// 999 assets over 999e6 shares: 1e6 shares per asset once virtual amounts are added.
    pub fn state() -> MarketState {
        MarketState {
            total_supply_assets: U256::from(2_000),
            total_supply_shares: U256::from(2_000_000_000u64),
            total_borrow_assets: U256::from(999),
            total_borrow_shares: U256::from(999_000_000u64),
            last_update: 1_000,
            fee: U256::ZERO,
        }
    }

    pub fn position(borrower: u8, borrow_shares: u64, collateral: u64) -> PositionRow {
        PositionRow {
            chain_id: 1337,
            market_id: B256::repeat_byte(0xaa),
            user: Address::repeat_byte(borrower),
            supply_shares: U256::ZERO,
            borrow_shares: U256::from(borrow_shares),
            collateral: U256::from(collateral),
        }
    }
}
