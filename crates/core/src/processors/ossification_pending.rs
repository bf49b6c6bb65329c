//! OSSIFICATION_PENDING_MODE: drain validators and drive the pending
//! ossification forward until the provider is ossified.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use super::{
    await_trigger, timed_cycle, CycleError, OperationModeProcessor, ProcessorDeps,
    ProcessorSettings,
};
use crate::attempt::attempt;
use crate::mode::OperationMode;

const MODE: OperationMode = OperationMode::OssificationPending;

#[derive(Debug)]
pub struct OssificationPendingProcessor {
    deps: ProcessorDeps,
    settings: ProcessorSettings,
}

impl OssificationPendingProcessor {
    pub fn new(deps: ProcessorDeps, settings: ProcessorSettings) -> Self {
        Self { deps, settings }
    }

    fn provider(&self) -> Address {
        self.settings.yield_provider
    }

    async fn run_cycle(&self) -> Result<()> {
        let _ = attempt(
            "submitMaxAvailableWithdrawalRequests failed (tolerated)",
            self.deps
                .beacon_staking
                .submit_max_available_withdrawal_requests(),
        )
        .await;

        let vault = self
            .deps
            .yield_manager
            .get_lido_staking_vault_address(self.provider())
            .await
            .context("failed to resolve staking vault")?;

        self.submit_vault_report_if_needed(vault).await;

        let progress = attempt(
            "progressPendingOssification failed",
            self.deps
                .yield_manager
                .progress_pending_ossification(self.provider()),
        )
        .await;
        if let Err(e) = &progress {
            error!(yield_provider = %self.provider(), "Ossification progression failed, ending cycle");
            return Err(CycleError::OssificationProgressFailed(format!("{e:#}")).into());
        }
        self.deps
            .recorder
            .record_progress_ossification_metrics(self.provider(), &progress)
            .await;

        let ossified = self
            .deps
            .yield_manager
            .is_ossified(self.provider())
            .await
            .context("isOssified read failed")?;
        if !ossified {
            info!(yield_provider = %self.provider(), "Ossification still pending");
            return Ok(());
        }

        info!(yield_provider = %self.provider(), "Provider ossified, withdrawing to reserve");
        let withdrawal = attempt(
            "safeMaxAddToWithdrawalReserve failed (tolerated)",
            self.deps
                .yield_manager
                .safe_max_add_to_withdrawal_reserve(self.provider()),
        )
        .await;
        self.deps
            .recorder
            .record_safe_withdrawal_metrics(&withdrawal)
            .await;
        Ok(())
    }

    /// Submit the vault report unless disabled, disconnected or already
    /// fresh. A failed freshness check does not block submission.
    async fn submit_vault_report_if_needed(&self, vault: Address) {
        if !self.settings.should_submit_vault_report {
            info!(vault = %vault, reason = "disabled", "Skipping vault report");
            return;
        }

        match self.deps.vault_hub.is_vault_connected(vault).await {
            Ok(false) => {
                info!(vault = %vault, reason = "vault not connected", "Skipping vault report");
                return;
            }
            Ok(true) => {}
            Err(e) => warn!(vault = %vault, error = %e, "isVaultConnected read failed, continuing"),
        }

        match self.deps.vault_hub.is_report_fresh(vault).await {
            Ok(true) => {
                info!(vault = %vault, reason = "report already fresh", "Skipping vault report");
                return;
            }
            Ok(false) => {}
            Err(e) => warn!(vault = %vault, error = %e, "isReportFresh read failed, submitting anyway"),
        }

        let result = attempt(
            "submitLatestVaultReport failed (tolerated)",
            self.deps.accounting.submit_latest_vault_report(vault),
        )
        .await;
        if result.is_ok() {
            self.deps.metrics.increment_lido_vault_accounting_report(vault);
        }
    }
}

#[async_trait]
impl OperationModeProcessor for OssificationPendingProcessor {
    fn mode(&self) -> OperationMode {
        MODE
    }

    #[instrument(skip(self, shutdown), fields(mode = %MODE))]
    async fn process(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let Some(trigger) =
            await_trigger(&self.deps, MODE, self.settings.max_inaction, &mut shutdown).await
        else {
            return Err(CycleError::ShutdownBeforeTrigger.into());
        };
        info!(
            trigger = %trigger.result,
            tx_hash = ?trigger.tx_hash,
            "Ossification pending cycle triggered"
        );
        timed_cycle(&self.deps.metrics, MODE, self.run_cycle()).await
    }
}
