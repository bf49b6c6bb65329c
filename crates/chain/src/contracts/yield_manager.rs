//! YieldManager contract client.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolEvent, SolValue};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::bindings::{IStakingVault, IYieldManager, WithdrawalParams};
use crate::clients::{RebalancePolicy, YieldManager};
use crate::provider::ProviderManager;
use crate::signer::TransactionSender;
use crate::types::{
    RebalanceRequirement, TxReceipt, WithdrawalEvent, WithdrawalRequests, YieldProviderData,
    YieldReport,
};
use crate::units::{apply_bps, eth_to_wei};

/// Classify the reserve against its target with a symmetric tolerance band.
///
/// The band is `tolerance_bps` of the total system balance. A balance below
/// the band is a deficit of `target - balance`; above it, a surplus of
/// `balance - target`.
pub fn evaluate_rebalance(
    reserve_balance: U256,
    total_system_balance: U256,
    target_reserve: U256,
    tolerance_bps: u32,
) -> RebalanceRequirement {
    let tolerance = apply_bps(total_system_balance, tolerance_bps);
    if reserve_balance.saturating_add(tolerance) < target_reserve {
        RebalanceRequirement::unstake(target_reserve - reserve_balance)
    } else if reserve_balance > target_reserve.saturating_add(tolerance) {
        RebalanceRequirement::stake(reserve_balance - target_reserve)
    } else {
        RebalanceRequirement::none()
    }
}

/// Alloy-backed [`YieldManager`] bound to one yield provider.
#[derive(Debug)]
pub struct YieldManagerContractClient {
    address: Address,
    /// Provider whose requirements `get_rebalance_requirements` evaluates
    yield_provider: Address,
    /// Rollup contract holding the withdrawal reserve
    l1_message_service: Address,
    tolerance_bps: u32,
    /// Minimum reserve top-up, whole ETH
    min_withdrawal_threshold_eth: u64,
    provider: ProviderManager,
    sender: Arc<TransactionSender>,
    policy: Option<Arc<dyn RebalancePolicy>>,
}

impl YieldManagerContractClient {
    pub fn new(
        address: Address,
        yield_provider: Address,
        l1_message_service: Address,
        provider: ProviderManager,
        sender: Arc<TransactionSender>,
    ) -> Self {
        Self {
            address,
            yield_provider,
            l1_message_service,
            tolerance_bps: 0,
            min_withdrawal_threshold_eth: 0,
            provider,
            sender,
            policy: None,
        }
    }

    pub fn with_tolerance_bps(mut self, bps: u32) -> Self {
        self.tolerance_bps = bps;
        self
    }

    pub fn with_min_withdrawal_threshold_eth(mut self, eth: u64) -> Self {
        self.min_withdrawal_threshold_eth = eth;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn RebalancePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    async fn send(&self, calldata: Vec<u8>, value: U256) -> Result<TxReceipt> {
        self.sender
            .send_transaction(self.address, Bytes::from(calldata), value)
            .await
    }

    /// Yield manager ETH balance plus what the provider can release now.
    pub async fn get_available_unstaking_rebalance_balance(&self, provider: Address) -> Result<U256> {
        let own_balance = self.provider.get_balance(self.address).await?;
        let withdrawable = IYieldManager::new(self.address, self.provider.provider()).withdrawableValue(provider).call().await?._0;
        Ok(own_balance.saturating_add(withdrawable))
    }

    async fn is_staking_paused(&self, provider: Address) -> Result<bool> {
        Ok(IYieldManager::new(self.address, self.provider.provider()).isStakingPaused(provider).call().await?._0)
    }

    async fn add_to_withdrawal_reserve_if_available(
        &self,
        provider: Address,
        amount: Option<U256>,
    ) -> Result<Option<TxReceipt>> {
        let available = self.get_available_unstaking_rebalance_balance(provider).await?;
        let threshold = eth_to_wei(self.min_withdrawal_threshold_eth);
        if available < threshold {
            info!(
                yield_provider = %provider,
                available = %available,
                threshold = %threshold,
                "Available unstaking balance below threshold, skipping reserve top-up"
            );
            return Ok(None);
        }

        let amount = amount.unwrap_or(available);
        let call = IYieldManager::safeAddToWithdrawalReserveCall {
            yieldProvider: provider,
            amount,
        };
        info!(yield_provider = %provider, amount = %amount, "Adding to withdrawal reserve");
        self.send(call.abi_encode(), U256::ZERO).await.map(Some)
    }
}

#[async_trait]
impl YieldManager for YieldManagerContractClient {
    fn address(&self) -> Address {
        self.address
    }

    #[instrument(skip(self))]
    async fn get_rebalance_requirements(&self) -> Result<RebalanceRequirement> {
        let contract = IYieldManager::new(self.address, self.provider.provider());
        let reserve_balance = self.provider.get_balance(self.l1_message_service).await?;
        let total_system_balance = contract.getTotalSystemBalance().call().await?._0;
        let target_reserve = contract.getEffectiveTargetWithdrawalReserve().call().await?._0;

        let requirement = evaluate_rebalance(
            reserve_balance,
            total_system_balance,
            target_reserve,
            self.tolerance_bps,
        );
        debug!(
            reserve_balance = %reserve_balance,
            total_system_balance = %total_system_balance,
            target_reserve = %target_reserve,
            direction = %requirement.direction(),
            amount = %requirement.amount(),
            "Rebalance requirement evaluated"
        );

        match &self.policy {
            Some(policy) => {
                let vault = self.get_lido_staking_vault_address(self.yield_provider).await?;
                Ok(policy.apply(vault, total_system_balance, requirement))
            }
            None => Ok(requirement),
        }
    }

    async fn fund_yield_provider(&self, provider: Address, amount: U256) -> Result<TxReceipt> {
        let call = IYieldManager::fundYieldProviderCall {
            yieldProvider: provider,
            amount,
        };
        info!(yield_provider = %provider, amount = %amount, "Funding yield provider");
        self.send(call.abi_encode(), U256::ZERO).await
    }

    async fn safe_add_to_withdrawal_reserve_if_above_threshold(
        &self,
        provider: Address,
        amount: U256,
    ) -> Result<Option<TxReceipt>> {
        self.add_to_withdrawal_reserve_if_available(provider, Some(amount))
            .await
    }

    async fn safe_max_add_to_withdrawal_reserve(
        &self,
        provider: Address,
    ) -> Result<Option<TxReceipt>> {
        self.add_to_withdrawal_reserve_if_available(provider, None).await
    }

    async fn pause_staking_if_not_already(&self, provider: Address) -> Result<Option<TxReceipt>> {
        if self.is_staking_paused(provider).await? {
            debug!(yield_provider = %provider, "Staking already paused");
            return Ok(None);
        }
        let call = IYieldManager::pauseStakingCall {
            yieldProvider: provider,
        };
        info!(yield_provider = %provider, "Pausing staking");
        self.send(call.abi_encode(), U256::ZERO).await.map(Some)
    }

    async fn unpause_staking_if_not_already(
        &self,
        provider: Address,
    ) -> Result<Option<TxReceipt>> {
        if !self.is_staking_paused(provider).await? {
            debug!(yield_provider = %provider, "Staking already unpaused");
            return Ok(None);
        }
        let call = IYieldManager::unpauseStakingCall {
            yieldProvider: provider,
        };
        info!(yield_provider = %provider, "Unpausing staking");
        self.send(call.abi_encode(), U256::ZERO).await.map(Some)
    }

    async fn report_yield(&self, provider: Address, l2_recipient: Address) -> Result<TxReceipt> {
        let call = IYieldManager::reportYieldCall {
            yieldProvider: provider,
            l2YieldRecipient: l2_recipient,
        };
        info!(yield_provider = %provider, l2_recipient = %l2_recipient, "Reporting yield");
        self.send(call.abi_encode(), U256::ZERO).await
    }

    async fn peek_yield_report(
        &self,
        provider: Address,
        l2_recipient: Address,
    ) -> Result<YieldReport> {
        let call = IYieldManager::reportYieldCall {
            yieldProvider: provider,
            l2YieldRecipient: l2_recipient,
        };
        let output = self
            .sender
            .simulate(self.address, Bytes::from(call.abi_encode()), U256::ZERO)
            .await?;
        let ret = IYieldManager::reportYieldCall::abi_decode_returns(&output, true)
            .context("decoding reportYield return")?;
        Ok(YieldReport {
            yield_amount: ret.newReportedYield,
            outstanding_negative_yield: ret.outstandingNegativeYield,
            yield_provider: provider,
        })
    }

    async fn progress_pending_ossification(&self, provider: Address) -> Result<TxReceipt> {
        let call = IYieldManager::progressPendingOssificationCall {
            yieldProvider: provider,
        };
        info!(yield_provider = %provider, "Progressing pending ossification");
        self.send(call.abi_encode(), U256::ZERO).await
    }

    async fn unstake(&self, provider: Address, requests: &WithdrawalRequests) -> Result<TxReceipt> {
        let vault = self.get_lido_staking_vault_address(provider).await?;
        let fee = IStakingVault::new(vault, self.provider.provider())
            .calculateValidatorWithdrawalFee(U256::from(requests.len()))
            .call()
            .await?
            ._0;

        let pubkeys: Vec<u8> = requests
            .pubkeys
            .iter()
            .flat_map(|key| key.iter().copied())
            .collect();
        let params = WithdrawalParams {
            pubkeys: Bytes::from(pubkeys),
            amounts: requests.amounts_gwei.clone(),
            refundRecipient: self.sender.address,
        };
        let call = IYieldManager::unstakeCall {
            yieldProvider: provider,
            withdrawalParams: Bytes::from(params.abi_encode()),
        };
        info!(
            yield_provider = %provider,
            validators = requests.len(),
            fee = %fee,
            "Submitting validator withdrawal requests"
        );
        self.send(call.abi_encode(), fee).await
    }

    async fn is_ossified(&self, provider: Address) -> Result<bool> {
        Ok(IYieldManager::new(self.address, self.provider.provider()).isOssified(provider).call().await?._0)
    }

    async fn is_ossification_initiated(&self, provider: Address) -> Result<bool> {
        Ok(IYieldManager::new(self.address, self.provider.provider()).isOssificationInitiated(provider).call().await?._0)
    }

    async fn get_yield_provider_data(&self, provider: Address) -> Result<YieldProviderData> {
        let data = IYieldManager::new(self.address, self.provider.provider()).getYieldProviderData(provider).call().await?._0;
        Ok(YieldProviderData {
            primary_entrypoint: data.primaryEntrypoint,
            ossified_entrypoint: data.ossifiedEntrypoint,
            is_staking_paused: data.isStakingPaused,
            is_ossification_initiated: data.isOssificationInitiated,
            is_ossified: data.isOssified,
            user_funds: data.userFunds,
            yield_reported_cumulative: data.yieldReportedCumulative,
            lst_liability_principal: data.lstLiabilityPrincipal,
            last_reported_negative_yield: data.lastReportedNegativeYield,
        })
    }

    async fn get_lido_staking_vault_address(&self, provider: Address) -> Result<Address> {
        Ok(self.get_yield_provider_data(provider).await?.ossified_entrypoint)
    }

    async fn get_lido_dashboard_address(&self, provider: Address) -> Result<Address> {
        Ok(self.get_yield_provider_data(provider).await?.primary_entrypoint)
    }

    fn get_yield_report_from_tx_receipt(&self, receipt: &TxReceipt) -> Option<YieldReport> {
        decode_yield_report(self.address, receipt)
    }

    fn get_withdrawal_event_from_tx_receipt(
        &self,
        receipt: &TxReceipt,
    ) -> Option<WithdrawalEvent> {
        decode_withdrawal_event(self.address, receipt)
    }
}

/// `NativeYieldReported` emitted by `yield_manager` within the receipt.
pub fn decode_yield_report(yield_manager: Address, receipt: &TxReceipt) -> Option<YieldReport> {
    receipt.logs_from(yield_manager).find_map(|log| {
        IYieldManager::NativeYieldReported::decode_log_data(&log.data, true)
            .ok()
            .map(|event| YieldReport {
                yield_amount: event.yieldAmount,
                outstanding_negative_yield: event.outstandingNegativeYield,
                yield_provider: event.yieldProvider,
            })
    })
}

/// `WithdrawalReserveAugmented` emitted by `yield_manager` within the receipt.
pub fn decode_withdrawal_event(
    yield_manager: Address,
    receipt: &TxReceipt,
) -> Option<WithdrawalEvent> {
    receipt.logs_from(yield_manager).find_map(|log| {
        IYieldManager::WithdrawalReserveAugmented::decode_log_data(&log.data, true)
            .ok()
            .map(|event| WithdrawalEvent {
                reserve_increment_amount: event.reserveIncrementAmount,
                yield_provider: event.yieldProvider,
            })
    })
}
