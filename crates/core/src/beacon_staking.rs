//! Validator partial-withdrawal requests for the staking vault.

use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use native_yield_api::{
    filter_withdrawal_eligible, join_validators_with_pending_withdrawals, ValidatorWithdrawable,
};
use native_yield_chain::units::{GWEI, wei_to_gwei};
use native_yield_chain::{BeaconStakingClient, TxReceipt, WithdrawalRequests, YieldManager};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::metrics::NativeYieldMetricsUpdater;
use crate::sources::{BeaconStateSource, ValidatorSource};

#[derive(Debug)]
pub struct BeaconChainStakingService {
    yield_manager: Arc<dyn YieldManager>,
    validators: Arc<dyn ValidatorSource>,
    beacon: Arc<dyn BeaconStateSource>,
    metrics: NativeYieldMetricsUpdater,
    yield_provider: Address,
    /// 0 disables withdrawal requests
    max_requests_per_tx: usize,
}

impl BeaconChainStakingService {
    pub fn new(
        yield_manager: Arc<dyn YieldManager>,
        validators: Arc<dyn ValidatorSource>,
        beacon: Arc<dyn BeaconStateSource>,
        metrics: NativeYieldMetricsUpdater,
        yield_provider: Address,
        max_requests_per_tx: u32,
    ) -> Self {
        Self {
            yield_manager,
            validators,
            beacon,
            metrics,
            yield_provider,
            max_requests_per_tx: max_requests_per_tx as usize,
        }
    }

    /// Eligible validators with something to withdraw, largest first.
    async fn withdrawable_validators(&self) -> Result<Vec<ValidatorWithdrawable>> {
        let (validators, pending) = tokio::try_join!(
            self.validators.get_active_validators(),
            self.beacon.get_pending_partial_withdrawals(),
        )?;
        let mut joined = join_validators_with_pending_withdrawals(&validators, &pending);

        match self.beacon.get_current_epoch().await {
            Ok(epoch) => joined = filter_withdrawal_eligible(joined, epoch),
            Err(e) => warn!(error = %e, "Current epoch unavailable, skipping eligibility filter"),
        }

        joined.retain(|v| v.withdrawable_amount > 0);
        joined.sort_by(|a, b| b.withdrawable_amount.cmp(&a.withdrawable_amount));
        Ok(joined)
    }

    async fn submit(&self, requests: WithdrawalRequests) -> Result<Option<TxReceipt>> {
        if requests.is_empty() {
            info!("No validator has withdrawable balance");
            return Ok(None);
        }

        let receipt = self.yield_manager.unstake(self.yield_provider, &requests).await?;
        for (pubkey, amount) in requests.pubkeys.iter().zip(&requests.amounts_gwei) {
            self.metrics
                .add_validator_partial_unstake_amount(&pubkey.to_string(), *amount as f64);
        }
        info!(
            tx_hash = %receipt.tx_hash,
            requests = requests.len(),
            total_gwei = requests.amounts_gwei.iter().sum::<u64>(),
            "Validator withdrawal requests submitted"
        );
        Ok(Some(receipt))
    }
}

/// Greedy selection: largest withdrawable first until `target_gwei` is covered.
fn select_for_amount(
    validators: &[ValidatorWithdrawable],
    target_gwei: u64,
    max_requests: usize,
) -> WithdrawalRequests {
    let mut requests = WithdrawalRequests::default();
    let mut remaining = target_gwei;
    for v in validators.iter().take(max_requests) {
        if remaining == 0 {
            break;
        }
        let amount = v.withdrawable_amount.min(remaining);
        requests.push(v.public_key.clone(), amount);
        remaining -= amount;
    }
    requests
}

fn select_max(validators: &[ValidatorWithdrawable], max_requests: usize) -> WithdrawalRequests {
    let mut requests = WithdrawalRequests::default();
    for v in validators.iter().take(max_requests) {
        requests.push(v.public_key.clone(), v.withdrawable_amount);
    }
    requests
}

#[async_trait]
impl BeaconStakingClient for BeaconChainStakingService {
    #[instrument(skip(self))]
    async fn submit_withdrawal_requests_to_fulfil_amount(
        &self,
        amount: U256,
    ) -> Result<Option<TxReceipt>> {
        if self.max_requests_per_tx == 0 {
            info!("Validator withdrawal requests disabled");
            return Ok(None);
        }
        // round up so the deficit is fully covered
        let mut target_gwei = wei_to_gwei(amount);
        if amount % GWEI != U256::ZERO {
            target_gwei = target_gwei.saturating_add(1);
        }
        if target_gwei == 0 {
            return Ok(None);
        }

        let validators = self.withdrawable_validators().await?;
        let requests = select_for_amount(&validators, target_gwei, self.max_requests_per_tx);
        self.submit(requests).await
    }

    #[instrument(skip(self))]
    async fn submit_max_available_withdrawal_requests(&self) -> Result<Option<TxReceipt>> {
        if self.max_requests_per_tx == 0 {
            info!("Validator withdrawal requests disabled");
            return Ok(None);
        }
        let validators = self.withdrawable_validators().await?;
        let requests = select_max(&validators, self.max_requests_per_tx);
        self.submit(requests).await
    }
}
