//! Typed metric updates.
//!
//! Every method maps onto one [`NativeYieldMetric`] and applies its guard:
//! counters ignore non-positive increments, gauges and histograms ignore
//! negative values.

use alloy::primitives::Address;
use native_yield_chain::{GasErrorReporter, RebalanceDirection};
use std::sync::Arc;
use tracing::debug;

use super::{MetricsService, NativeYieldMetric};
use crate::mode::{ExecutionStatus, OperationMode, OperationTrigger};

#[derive(Debug, Clone)]
pub struct NativeYieldMetricsUpdater {
    service: Arc<dyn MetricsService>,
}

impl NativeYieldMetricsUpdater {
    pub fn new(service: Arc<dyn MetricsService>) -> Self {
        Self { service }
    }

    fn add_per_vault(&self, metric: NativeYieldMetric, vault: Address, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        let vault = vault.to_string();
        self.service
            .increment_counter(metric, &[("vault_address", &vault)], amount);
    }

    fn set_per_vault(&self, metric: NativeYieldMetric, vault: Address, value: f64) {
        if value < 0.0 {
            return;
        }
        let vault = vault.to_string();
        self.service
            .set_gauge(metric, &[("vault_address", &vault)], value);
    }

    pub fn record_rebalance(&self, direction: RebalanceDirection, amount_gwei: f64) {
        if amount_gwei <= 0.0 {
            return;
        }
        self.service.increment_counter(
            NativeYieldMetric::RebalanceAmountTotal,
            &[("direction", direction.as_str())],
            amount_gwei,
        );
    }

    pub fn add_validator_partial_unstake_amount(&self, pubkey: &str, amount_gwei: f64) {
        if amount_gwei <= 0.0 {
            return;
        }
        self.service.increment_counter(
            NativeYieldMetric::ValidatorPartialUnstakeAmountTotal,
            &[("validator_pubkey", pubkey)],
            amount_gwei,
        );
    }

    pub fn increment_lido_vault_accounting_report(&self, vault: Address) {
        self.add_per_vault(
            NativeYieldMetric::LidoVaultAccountingReportSubmittedTotal,
            vault,
            1.0,
        );
    }

    pub fn increment_report_yield(&self, vault: Address) {
        self.add_per_vault(NativeYieldMetric::ReportYieldTotal, vault, 1.0);
    }

    pub fn increment_staking_deposit_quota_exceeded(&self, vault: Address) {
        self.add_per_vault(NativeYieldMetric::StakingDepositQuotaExceeded, vault, 1.0);
    }

    pub fn add_node_operator_fees_paid(&self, vault: Address, amount_gwei: f64) {
        self.add_per_vault(NativeYieldMetric::NodeOperatorFeesPaidTotal, vault, amount_gwei);
    }

    pub fn add_liabilities_paid(&self, vault: Address, amount_gwei: f64) {
        self.add_per_vault(NativeYieldMetric::LiabilitiesPaidTotal, vault, amount_gwei);
    }

    pub fn add_lido_fees_paid(&self, vault: Address, amount_gwei: f64) {
        self.add_per_vault(NativeYieldMetric::LidoFeesPaidTotal, vault, amount_gwei);
    }

    pub fn set_last_peeked_negative_yield_report(&self, vault: Address, gwei: f64) {
        self.set_per_vault(NativeYieldMetric::LastPeekedNegativeYieldReport, vault, gwei);
    }

    pub fn set_last_peeked_positive_yield_report(&self, vault: Address, gwei: f64) {
        self.set_per_vault(NativeYieldMetric::LastPeekedPositiveYieldReport, vault, gwei);
    }

    pub fn set_last_settleable_lido_fees(&self, vault: Address, gwei: f64) {
        self.set_per_vault(NativeYieldMetric::LastSettleableLidoFees, vault, gwei);
    }

    pub fn set_last_vault_report_timestamp(&self, vault: Address, timestamp: u64) {
        self.set_per_vault(
            NativeYieldMetric::LastVaultReportTimestamp,
            vault,
            timestamp as f64,
        );
    }

    pub fn set_yield_reported_cumulative(&self, vault: Address, gwei: f64) {
        self.set_per_vault(NativeYieldMetric::YieldReportedCumulative, vault, gwei);
    }

    pub fn set_lst_liability_principal_gwei(&self, vault: Address, gwei: f64) {
        self.set_per_vault(NativeYieldMetric::LstLiabilityPrincipalGwei, vault, gwei);
    }

    pub fn set_last_reported_negative_yield(&self, vault: Address, gwei: f64) {
        self.set_per_vault(NativeYieldMetric::LastReportedNegativeYield, vault, gwei);
    }

    pub fn set_last_total_pending_partial_withdrawals_gwei(&self, gwei: f64) {
        if gwei < 0.0 {
            return;
        }
        self.service.set_gauge(
            NativeYieldMetric::LastTotalPendingPartialWithdrawalsGwei,
            &[],
            gwei,
        );
    }

    pub fn set_last_total_validator_balance_gwei(&self, gwei: f64) {
        if gwei < 0.0 {
            return;
        }
        self.service
            .set_gauge(NativeYieldMetric::LastTotalValidatorBalanceGwei, &[], gwei);
    }

    fn set_requirement(
        &self,
        metric: NativeYieldMetric,
        vault: Address,
        gwei: f64,
        direction: RebalanceDirection,
    ) {
        if gwei < 0.0 {
            return;
        }
        let vault = vault.to_string();
        self.service.set_gauge(
            metric,
            &[
                ("vault_address", &vault),
                ("staking_direction", direction.staking_label()),
            ],
            gwei,
        );
    }

    /// Requirement before any staking quota is applied.
    pub fn set_actual_rebalance_requirement(
        &self,
        vault: Address,
        gwei: f64,
        direction: RebalanceDirection,
    ) {
        self.set_requirement(
            NativeYieldMetric::ActualRebalanceRequirementGwei,
            vault,
            gwei,
            direction,
        );
    }

    /// Requirement as returned to the processors.
    pub fn set_reported_rebalance_requirement(
        &self,
        vault: Address,
        gwei: f64,
        direction: RebalanceDirection,
    ) {
        self.set_requirement(
            NativeYieldMetric::ReportedRebalanceRequirementGwei,
            vault,
            gwei,
            direction,
        );
    }

    pub fn increment_operation_mode_trigger(&self, mode: OperationMode, trigger: OperationTrigger) {
        self.service.increment_counter(
            NativeYieldMetric::OperationModeTriggerTotal,
            &[("mode", mode.as_str()), ("trigger", trigger.as_str())],
            1.0,
        );
    }

    pub fn increment_operation_mode_execution(&self, mode: OperationMode, status: ExecutionStatus) {
        self.service.increment_counter(
            NativeYieldMetric::OperationModeExecutionTotal,
            &[("mode", mode.as_str()), ("status", status.as_str())],
            1.0,
        );
    }

    pub fn record_operation_mode_duration(&self, mode: OperationMode, seconds: f64) {
        if seconds < 0.0 {
            return;
        }
        self.service.add_value_to_histogram(
            NativeYieldMetric::OperationModeExecutionDurationSeconds,
            seconds,
            &[("mode", mode.as_str())],
        );
    }

    pub fn increment_contract_estimate_gas_error(
        &self,
        contract: Address,
        raw_revert_data: &str,
        error_name: Option<&str>,
    ) {
        let contract = contract.to_string();
        self.service.increment_counter(
            NativeYieldMetric::ContractEstimateGasError,
            &[
                ("contract_address", &contract),
                ("rawRevertData", raw_revert_data),
                ("errorName", error_name.unwrap_or("unknown")),
            ],
            1.0,
        );
    }
}

impl GasErrorReporter for NativeYieldMetricsUpdater {
    fn report_estimate_gas_error(
        &self,
        contract: Address,
        raw_revert_data: &str,
        error_name: Option<&str>,
    ) {
        debug!(
            contract = %contract,
            error_name = error_name.unwrap_or("unknown"),
            "Recording estimateGas failure"
        );
        self.increment_contract_estimate_gas_error(contract, raw_revert_data, error_name);
    }
}
