//! Receipt-derived metrics for the operation-mode processors.
//!
//! Each `record_*` method takes the outcome of a tolerated call. Errors and
//! skipped (`None`) receipts record nothing.

use alloy::primitives::Address;
use anyhow::Result;
use native_yield_chain::units::wei_to_gwei_f64;
use native_yield_chain::{Dashboard, RebalanceDirection, TxReceipt, VaultHub, YieldManager};
use std::sync::Arc;
use tracing::{debug, warn};

use super::NativeYieldMetricsUpdater;

#[derive(Debug, Clone)]
pub struct OperationModeMetricsRecorder {
    updater: NativeYieldMetricsUpdater,
    yield_manager: Arc<dyn YieldManager>,
    vault_hub: Arc<dyn VaultHub>,
    dashboard: Arc<dyn Dashboard>,
}

impl OperationModeMetricsRecorder {
    pub fn new(
        updater: NativeYieldMetricsUpdater,
        yield_manager: Arc<dyn YieldManager>,
        vault_hub: Arc<dyn VaultHub>,
        dashboard: Arc<dyn Dashboard>,
    ) -> Self {
        Self {
            updater,
            yield_manager,
            vault_hub,
            dashboard,
        }
    }

    /// Refresh the yield-provider gauges after funds moved to the provider.
    pub async fn record_transfer_funds_metrics(
        &self,
        provider: Address,
        result: &Result<TxReceipt>,
    ) {
        let Ok(receipt) = result else {
            return;
        };
        debug!(tx_hash = %receipt.tx_hash, "Recording fund transfer metrics");
        if let Err(e) = self.record_yield_provider_gauges(provider).await {
            warn!(yield_provider = %provider, error = %e, "Failed to refresh yield provider gauges");
        }
    }

    /// Count the reserve top-up as an UNSTAKE rebalance.
    pub async fn record_safe_withdrawal_metrics(&self, result: &Result<Option<TxReceipt>>) {
        let Ok(Some(receipt)) = result else {
            return;
        };
        let Some(event) = self.yield_manager.get_withdrawal_event_from_tx_receipt(receipt) else {
            debug!(tx_hash = %receipt.tx_hash, "No WithdrawalReserveAugmented event in receipt");
            return;
        };
        self.updater.record_rebalance(
            RebalanceDirection::Unstake,
            wei_to_gwei_f64(event.reserve_increment_amount),
        );
    }

    pub async fn record_report_yield_metrics(&self, provider: Address, result: &Result<TxReceipt>) {
        let Ok(receipt) = result else {
            return;
        };
        let Some(report) = self.yield_manager.get_yield_report_from_tx_receipt(receipt) else {
            debug!(tx_hash = %receipt.tx_hash, "No NativeYieldReported event in receipt");
            return;
        };
        let vault = match self.yield_manager.get_lido_staking_vault_address(provider).await {
            Ok(vault) => vault,
            Err(e) => {
                warn!(yield_provider = %provider, error = %e, "Cannot resolve vault for yield metrics");
                return;
            }
        };

        self.updater.increment_report_yield(vault);
        self.updater.set_last_reported_negative_yield(
            vault,
            wei_to_gwei_f64(report.outstanding_negative_yield),
        );
        debug!(
            vault = %vault,
            yield_amount = %report.yield_amount,
            outstanding_negative_yield = %report.outstanding_negative_yield,
            "Recorded yield report"
        );
    }

    /// Fees and liabilities settled by `progressPendingOssification`.
    pub async fn record_progress_ossification_metrics(
        &self,
        provider: Address,
        result: &Result<TxReceipt>,
    ) {
        let Ok(receipt) = result else {
            return;
        };
        let (vault, dashboard) = match tokio::try_join!(
            self.yield_manager.get_lido_staking_vault_address(provider),
            self.yield_manager.get_lido_dashboard_address(provider),
        ) {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(yield_provider = %provider, error = %e, "Cannot resolve vault for ossification metrics");
                return;
            }
        };

        if let Some(fee) = self
            .dashboard
            .get_node_operator_fee_paid_from_tx_receipt(dashboard, receipt)
        {
            self.updater
                .add_node_operator_fees_paid(vault, wei_to_gwei_f64(fee));
        }
        if let Some(payment) = self.vault_hub.get_liability_payment_from_tx_receipt(receipt) {
            self.updater
                .add_liabilities_paid(vault, wei_to_gwei_f64(payment.ether_paid));
        }
        if let Some(payment) = self.vault_hub.get_lido_fee_payment_from_tx_receipt(receipt) {
            self.updater
                .add_lido_fees_paid(vault, wei_to_gwei_f64(payment.fees_paid));
        }
    }

    /// Yield-provider accounting gauges, read fresh from the yield manager.
    pub async fn record_yield_provider_gauges(&self, provider: Address) -> Result<()> {
        let vault = self.yield_manager.get_lido_staking_vault_address(provider).await?;
        let data = self.yield_manager.get_yield_provider_data(provider).await?;

        self.updater
            .set_yield_reported_cumulative(vault, wei_to_gwei_f64(data.yield_reported_cumulative));
        self.updater
            .set_lst_liability_principal_gwei(vault, wei_to_gwei_f64(data.lst_liability_principal));
        self.updater.set_last_reported_negative_yield(
            vault,
            wei_to_gwei_f64(data.last_reported_negative_yield),
        );
        Ok(())
    }
}
