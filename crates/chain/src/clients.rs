//! Narrow client interfaces consumed by the operation-mode engine.
//!
//! Each method is a thin wrapper over a contract read, a transaction or an
//! off-chain API call. The engine depends only on these signatures, so tests
//! drive it with recording fakes and production wires in the alloy-backed
//! implementations from [`crate::contracts`].

use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

use crate::types::{
    LiabilityPayment, LidoFeePayment, RebalanceRequirement, TxReceipt, VaultReport,
    VaultReportParams, WithdrawalEvent, WithdrawalRequests, YieldProviderData, YieldReport,
};
use crate::watch::ReportWatch;

/// YieldManager contract.
///
/// Guarded helpers return `Ok(None)` when their guard decided not to send.
#[async_trait]
pub trait YieldManager: Send + Sync + Debug {
    /// Contract address.
    fn address(&self) -> Address;

    /// Current reserve imbalance, read fresh on every call.
    async fn get_rebalance_requirements(&self) -> Result<RebalanceRequirement>;

    async fn fund_yield_provider(&self, provider: Address, amount: U256) -> Result<TxReceipt>;

    async fn safe_add_to_withdrawal_reserve_if_above_threshold(
        &self,
        provider: Address,
        amount: U256,
    ) -> Result<Option<TxReceipt>>;

    async fn safe_max_add_to_withdrawal_reserve(&self, provider: Address)
        -> Result<Option<TxReceipt>>;

    async fn pause_staking_if_not_already(&self, provider: Address) -> Result<Option<TxReceipt>>;

    async fn unpause_staking_if_not_already(&self, provider: Address)
        -> Result<Option<TxReceipt>>;

    async fn report_yield(&self, provider: Address, l2_recipient: Address) -> Result<TxReceipt>;

    /// Dry-run of `reportYield`, returning what would be reported.
    async fn peek_yield_report(&self, provider: Address, l2_recipient: Address)
        -> Result<YieldReport>;

    async fn progress_pending_ossification(&self, provider: Address) -> Result<TxReceipt>;

    /// Request partial validator withdrawals through the provider.
    async fn unstake(&self, provider: Address, requests: &WithdrawalRequests) -> Result<TxReceipt>;

    async fn is_ossified(&self, provider: Address) -> Result<bool>;

    async fn is_ossification_initiated(&self, provider: Address) -> Result<bool>;

    async fn get_yield_provider_data(&self, provider: Address) -> Result<YieldProviderData>;

    async fn get_lido_staking_vault_address(&self, provider: Address) -> Result<Address>;

    async fn get_lido_dashboard_address(&self, provider: Address) -> Result<Address>;

    fn get_yield_report_from_tx_receipt(&self, receipt: &TxReceipt) -> Option<YieldReport>;

    fn get_withdrawal_event_from_tx_receipt(&self, receipt: &TxReceipt)
        -> Option<WithdrawalEvent>;
}

/// LazyOracle contract.
#[async_trait]
pub trait LazyOracle: Send + Sync + Debug {
    /// Start watching for the next `VaultsReportDataUpdated` event.
    async fn wait_for_vaults_report_data_updated_event(&self) -> Result<ReportWatch>;

    async fn latest_report_data(&self) -> Result<VaultReport>;

    async fn update_vault_data(&self, params: &VaultReportParams) -> Result<TxReceipt>;

    /// `eth_call` of `updateVaultData` without broadcasting.
    async fn simulate_update_vault_data(&self, params: &VaultReportParams) -> Result<()>;
}

/// VaultHub contract.
#[async_trait]
pub trait VaultHub: Send + Sync + Debug {
    async fn is_report_fresh(&self, vault: Address) -> Result<bool>;

    async fn is_vault_connected(&self, vault: Address) -> Result<bool>;

    async fn settleable_lido_fees_value(&self, vault: Address) -> Result<U256>;

    async fn latest_vault_report_timestamp(&self, vault: Address) -> Result<u64>;

    fn get_liability_payment_from_tx_receipt(&self, receipt: &TxReceipt)
        -> Option<LiabilityPayment>;

    fn get_lido_fee_payment_from_tx_receipt(&self, receipt: &TxReceipt) -> Option<LidoFeePayment>;
}

/// Dashboard contracts, addressed per call.
pub trait Dashboard: Send + Sync + Debug {
    /// Node-operator fee disbursed by `dashboard` within the receipt.
    fn get_node_operator_fee_paid_from_tx_receipt(
        &self,
        dashboard: Address,
        receipt: &TxReceipt,
    ) -> Option<U256>;
}

/// Yield extension of the rollup contract (the L1 message service).
#[async_trait]
pub trait RollupYieldExtension: Send + Sync + Debug {
    async fn transfer_funds_for_native_yield(&self, amount: U256) -> Result<TxReceipt>;
}

/// Builds and submits Lido accounting reports for a vault.
#[async_trait]
pub trait AccountingReportClient: Send + Sync + Debug {
    async fn get_latest_submit_vault_report_params(&self, vault: Address)
        -> Result<VaultReportParams>;

    /// Dry-run of [`Self::submit_latest_vault_report`]; `false` on any error.
    async fn is_simulate_submit_latest_vault_report_successful(&self, vault: Address) -> bool;

    async fn submit_latest_vault_report(&self, vault: Address) -> Result<TxReceipt>;
}

/// Requests validator withdrawals on the beacon chain.
///
/// Both methods return `Ok(None)` when no request was worth sending.
#[async_trait]
pub trait BeaconStakingClient: Send + Sync + Debug {
    async fn submit_withdrawal_requests_to_fulfil_amount(
        &self,
        amount: U256,
    ) -> Result<Option<TxReceipt>>;

    async fn submit_max_available_withdrawal_requests(&self) -> Result<Option<TxReceipt>>;
}

/// Adjusts a freshly computed rebalance requirement before it is returned.
pub trait RebalancePolicy: Send + Sync + Debug {
    fn apply(
        &self,
        vault: Address,
        total_system_balance: U256,
        requirement: RebalanceRequirement,
    ) -> RebalanceRequirement;
}

/// Receives gas-estimation failures from the transaction sender.
pub trait GasErrorReporter: Send + Sync + Debug {
    fn report_estimate_gas_error(
        &self,
        contract: Address,
        raw_revert_data: &str,
        error_name: Option<&str>,
    );
}
