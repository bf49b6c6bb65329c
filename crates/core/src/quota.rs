//! Rolling-window quota on STAKE rebalances.
//!
//! Caps how much surplus can be moved to the yield provider over the last
//! `window_size` cycles, as a share of the total system balance.

use alloy::primitives::{Address, U256};
use native_yield_chain::units::{apply_bps, wei_to_gwei_f64};
use native_yield_chain::{RebalanceDirection, RebalancePolicy, RebalanceRequirement};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::metrics::NativeYieldMetricsUpdater;

#[derive(Debug)]
pub struct RebalanceQuotaService {
    quota_bps: u32,
    window_size: usize,
    /// Requests below this are treated as noise and granted 0
    tolerance_amount: U256,
    /// Most recent grant at the back
    window: Mutex<VecDeque<U256>>,
    metrics: NativeYieldMetricsUpdater,
}

impl RebalanceQuotaService {
    pub fn new(
        quota_bps: u32,
        window_size: u32,
        tolerance_amount: U256,
        metrics: NativeYieldMetricsUpdater,
    ) -> Self {
        Self {
            quota_bps,
            window_size: window_size as usize,
            tolerance_amount,
            window: Mutex::new(VecDeque::with_capacity(window_size as usize)),
            metrics,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.quota_bps > 0 && self.window_size > 0
    }

    fn push(window: &mut VecDeque<U256>, amount: U256, size: usize) {
        window.push_back(amount);
        while window.len() > size {
            window.pop_front();
        }
    }

    /// Amount of `requested` that may be staked this cycle.
    pub fn staking_rebalance_amount_with_quota(
        &self,
        vault: Address,
        total_system_balance: U256,
        requested: U256,
    ) -> U256 {
        if !self.is_enabled() {
            return requested;
        }

        let mut window = self.window.lock();
        if requested < self.tolerance_amount {
            debug!(requested = %requested, tolerance = %self.tolerance_amount, "Stake request below tolerance");
            Self::push(&mut window, U256::ZERO, self.window_size);
            return U256::ZERO;
        }

        let quota = apply_bps(total_system_balance, self.quota_bps);
        let skip = window.len().saturating_sub(self.window_size - 1);
        let previous: U256 = window
            .iter()
            .skip(skip)
            .fold(U256::ZERO, |acc, v| acc.saturating_add(*v));
        let remaining = quota.saturating_sub(previous);
        let granted = requested.min(remaining);

        Self::push(&mut window, granted, self.window_size);
        drop(window);

        if granted < requested {
            info!(
                vault = %vault,
                requested = %requested,
                granted = %granted,
                quota = %quota,
                used = %previous,
                "Staking rebalance quota exceeded"
            );
            self.metrics.increment_staking_deposit_quota_exceeded(vault);
        }
        granted
    }
}

impl RebalancePolicy for RebalanceQuotaService {
    fn apply(
        &self,
        vault: Address,
        total_system_balance: U256,
        requirement: RebalanceRequirement,
    ) -> RebalanceRequirement {
        if !self.is_enabled() {
            return requirement;
        }

        self.metrics.set_actual_rebalance_requirement(
            vault,
            wei_to_gwei_f64(requirement.amount()),
            requirement.direction(),
        );

        let reported = match requirement.direction() {
            RebalanceDirection::Stake => RebalanceRequirement::stake(
                self.staking_rebalance_amount_with_quota(
                    vault,
                    total_system_balance,
                    requirement.amount(),
                ),
            ),
            _ => requirement,
        };

        self.metrics.set_reported_rebalance_requirement(
            vault,
            wei_to_gwei_f64(reported.amount()),
            reported.direction(),
        );
        reported
    }
}
