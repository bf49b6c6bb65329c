//! Wei/gwei/ether conversions and basis-point arithmetic on U256.
//!
//! Metrics are exported in gwei as `f64`; on-chain amounts stay in wei.

use alloy::primitives::U256;

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10_000u64, 0, 0, 0]);

/// 1 gwei in wei
pub const GWEI: U256 = U256::from_limbs([1_000_000_000u64, 0, 0, 0]);

/// 1 ether in wei
pub const ONE_ETHER: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// `value * bps / 10000`, rounding down.
#[inline]
pub fn apply_bps(value: U256, bps: u32) -> U256 {
    value.saturating_mul(U256::from(bps)) / BPS_DENOMINATOR
}

/// Whole ether to wei.
#[inline]
pub fn eth_to_wei(eth: u64) -> U256 {
    U256::from(eth).saturating_mul(ONE_ETHER)
}

/// Wei to whole gwei, rounding down and saturating at `u64::MAX`.
#[inline]
pub fn wei_to_gwei(wei: U256) -> u64 {
    let gwei = wei / GWEI;
    if gwei > U256::from(u64::MAX) {
        u64::MAX
    } else {
        gwei.to::<u64>()
    }
}

/// Gwei to wei.
#[inline]
pub fn gwei_to_wei(gwei: u64) -> U256 {
    U256::from(gwei).saturating_mul(GWEI)
}

/// Wei to gwei as `f64`, for metrics. Sub-gwei precision is dropped.
#[inline]
pub fn wei_to_gwei_f64(wei: U256) -> f64 {
    let gwei = wei / GWEI;
    if gwei <= U256::from(u128::MAX) {
        gwei.to::<u128>() as f64
    } else {
        f64::MAX
    }
}
