//! Morpho Blue fixed-point arithmetic on U256.
//!
//! Mirrors the protocol's `MathLib`/`SharesMathLib` rounding exactly, so that
//! locally computed borrow amounts match what the contracts would compute.
//! Every operation is checked: `None` means overflow or division by zero and
//! callers treat the value as not evaluable.

use alloy::primitives::U256;

const fn u256(value: u128) -> U256 {
    U256::from_limbs([value as u64, (value >> 64) as u64, 0, 0])
}

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = u256(1_000_000_000_000_000_000);

/// Scale of Morpho oracle prices (1e36)
pub const ORACLE_PRICE_SCALE: U256 = u256(10u128.pow(36));

/// Virtual shares added to total shares in share/asset conversions
pub const VIRTUAL_SHARES: U256 = u256(1_000_000);

/// Virtual assets added to total assets in share/asset conversions
pub const VIRTUAL_ASSETS: U256 = u256(1);

/// Cap on the liquidation incentive factor (1.15 WAD)
pub const MAX_LIQUIDATION_INCENTIVE_FACTOR: U256 = u256(1_150_000_000_000_000_000);

/// Liquidation cursor (0.3 WAD)
pub const LIQUIDATION_CURSOR: U256 = u256(300_000_000_000_000_000);

/// (x * y) / d rounded down.
#[inline(always)]
pub fn mul_div_down(x: U256, y: U256, d: U256) -> Option<U256> {
    x.checked_mul(y)?.checked_div(d)
}

/// (x * y) / d rounded up.
#[inline(always)]
pub fn mul_div_up(x: U256, y: U256, d: U256) -> Option<U256> {
    if d.is_zero() {
        return None;
    }
    x.checked_mul(y)?.checked_add(d - U256::from(1))?.checked_div(d)
}

/// x * y / WAD rounded down.
///
/// Example: w_mul_down(2e18, 0.5e18) = 1e18
#[inline(always)]
pub fn w_mul_down(x: U256, y: U256) -> Option<U256> {
    mul_div_down(x, y, WAD)
}

/// x * WAD / y rounded down.
#[inline(always)]
pub fn w_div_down(x: U256, y: U256) -> Option<U256> {
    mul_div_down(x, WAD, y)
}

/// x * WAD / y rounded up.
#[inline(always)]
pub fn w_div_up(x: U256, y: U256) -> Option<U256> {
    mul_div_up(x, WAD, y)
}

/// Third-order Taylor approximation of `e^(x * n) - 1`, the compounded
/// growth of a per-second rate `x` over `n` seconds.
pub fn w_taylor_compounded(x: U256, n: U256) -> Option<U256> {
    let first = x.checked_mul(n)?;
    let second = mul_div_down(first, first, WAD.checked_mul(U256::from(2))?)?;
    let third = mul_div_down(second, first, WAD.checked_mul(U256::from(3))?)?;
    first.checked_add(second)?.checked_add(third)
}

/// Shares to assets, rounded down.
#[inline(always)]
pub fn to_assets_down(shares: U256, total_assets: U256, total_shares: U256) -> Option<U256> {
    mul_div_down(
        shares,
        total_assets.checked_add(VIRTUAL_ASSETS)?,
        total_shares.checked_add(VIRTUAL_SHARES)?,
    )
}

/// Shares to assets, rounded up (the amount a borrower owes).
#[inline(always)]
pub fn to_assets_up(shares: U256, total_assets: U256, total_shares: U256) -> Option<U256> {
    mul_div_up(
        shares,
        total_assets.checked_add(VIRTUAL_ASSETS)?,
        total_shares.checked_add(VIRTUAL_SHARES)?,
    )
}

/// Assets to shares, rounded down.
#[inline(always)]
pub fn to_shares_down(assets: U256, total_assets: U256, total_shares: U256) -> Option<U256> {
    mul_div_down(
        assets,
        total_shares.checked_add(VIRTUAL_SHARES)?,
        total_assets.checked_add(VIRTUAL_ASSETS)?,
    )
}

/// Liquidation incentive factor for a market:
/// `min(MAX_LIF, WAD / (WAD - CURSOR * (WAD - lltv)))`.
pub fn liquidation_incentive_factor(lltv: U256) -> Option<U256> {
    let discount = w_mul_down(LIQUIDATION_CURSOR, WAD.checked_sub(lltv)?)?;
    let factor = w_div_down(WAD, WAD.checked_sub(discount)?)?;
    Some(factor.min(MAX_LIQUIDATION_INCENTIVE_FACTOR))
}

/// Convert WAD (18 decimals) to f64.
/// Use only for display/logging, not for computation.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        f64::INFINITY
    }
}
