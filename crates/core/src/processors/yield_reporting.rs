//! YIELD_REPORTING_MODE: keep the withdrawal reserve on target and report
//! yield while the provider is live.
//!
//! Cycle:
//! 1. initial read of the requirement plus a report dry run
//! 2. pause staking up front when in deficit
//! 3. primary rebalance (report ordering depends on direction)
//! 4. one amendment pass if external flows flipped the reserve into deficit,
//!    otherwise unpause
//! 5. beacon-chain withdrawal requests for any remaining deficit

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use native_yield_chain::units::wei_to_gwei_f64;
use native_yield_chain::RebalanceDirection;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use super::{
    await_trigger, timed_cycle, CycleError, OperationModeProcessor, ProcessorDeps,
    ProcessorSettings,
};
use crate::attempt::attempt;
use crate::mode::OperationMode;

const MODE: OperationMode = OperationMode::YieldReporting;

#[derive(Debug)]
pub struct YieldReportingProcessor {
    deps: ProcessorDeps,
    settings: ProcessorSettings,
}

impl YieldReportingProcessor {
    pub fn new(deps: ProcessorDeps, settings: ProcessorSettings) -> Self {
        Self { deps, settings }
    }

    fn provider(&self) -> Address {
        self.settings.yield_provider
    }

    async fn run_cycle(&self) -> Result<()> {
        let vault = self
            .deps
            .yield_manager
            .get_lido_staking_vault_address(self.provider())
            .await
            .context("failed to resolve staking vault")?;

        let (initial, simulate_ok) = tokio::join!(
            self.deps.yield_manager.get_rebalance_requirements(),
            self.deps
                .accounting
                .is_simulate_submit_latest_vault_report_successful(vault),
        );
        let initial = initial.context("initial rebalance requirement read failed")?;
        info!(
            vault = %vault,
            direction = %initial.direction(),
            amount = %initial.amount(),
            simulate_ok = simulate_ok,
            "Initial rebalance requirement"
        );

        if initial.is_deficit() {
            let _ = attempt(
                "pause staking failed (tolerated)",
                self.deps
                    .yield_manager
                    .pause_staking_if_not_already(self.provider()),
            )
            .await;
        }

        match initial.direction() {
            RebalanceDirection::None => {
                if simulate_ok {
                    let _ = self.submit_report_and_yield(vault).await;
                } else {
                    info!(vault = %vault, "Report dry run failed, skipping report");
                }
            }
            RebalanceDirection::Stake => {
                self.handle_staking_rebalance(vault, initial.amount(), simulate_ok)
                    .await
            }
            RebalanceDirection::Unstake => {
                self.handle_unstaking_rebalance(vault, initial.amount(), simulate_ok)
                    .await
            }
        }

        let post = self
            .deps
            .yield_manager
            .get_rebalance_requirements()
            .await
            .context("post-rebalance requirement read failed")?;
        info!(direction = %post.direction(), amount = %post.amount(), "Post-rebalance requirement");

        if !initial.is_deficit() && post.is_deficit() {
            info!(amount = %post.amount(), "Reserve flipped into deficit mid-cycle, amending");
            let _ = attempt(
                "pause staking before amendment failed (tolerated)",
                self.deps
                    .yield_manager
                    .pause_staking_if_not_already(self.provider()),
            )
            .await;
            self.handle_unstaking_rebalance(vault, post.amount(), false)
                .await;
        } else if !initial.is_deficit()
            && !post.is_deficit()
            && self.settings.is_unpause_staking_enabled
        {
            let _ = attempt(
                "unpause staking failed (tolerated)",
                self.deps
                    .yield_manager
                    .unpause_staking_if_not_already(self.provider()),
            )
            .await;
        }

        let last = self
            .deps
            .yield_manager
            .get_rebalance_requirements()
            .await
            .context("beacon withdrawal requirement read failed")?;
        if last.is_deficit() {
            let _ = attempt(
                "beacon chain withdrawal requests failed (tolerated)",
                self.deps
                    .beacon_staking
                    .submit_withdrawal_requests_to_fulfil_amount(last.amount()),
            )
            .await;
        }
        Ok(())
    }

    /// Surplus: move funds out of the message service, then into the
    /// provider, then report.
    async fn handle_staking_rebalance(&self, vault: Address, amount: U256, simulate_ok: bool) {
        info!(amount = %amount, "Reserve surplus, staking");
        let transfer = attempt(
            "transferFundsForNativeYield failed (tolerated)",
            self.deps.rollup.transfer_funds_for_native_yield(amount),
        )
        .await;
        if transfer.is_ok() {
            // counted once funds have left the message service
            self.deps
                .metrics
                .record_rebalance(RebalanceDirection::Stake, wei_to_gwei_f64(amount));
        }

        let funded = attempt(
            "fundYieldProvider failed (tolerated)",
            self.deps
                .yield_manager
                .fund_yield_provider(self.provider(), amount),
        )
        .await;
        self.deps
            .recorder
            .record_transfer_funds_metrics(self.provider(), &funded)
            .await;

        if simulate_ok {
            let _ = self.submit_report_and_yield(vault).await;
        }
    }

    /// Deficit: report first so it reflects balances before the reserve is
    /// topped up, then withdraw from the provider.
    async fn handle_unstaking_rebalance(&self, vault: Address, amount: U256, submit_report: bool) {
        if submit_report {
            let _ = self.submit_report_and_yield(vault).await;
        }

        info!(amount = %amount, "Reserve deficit, topping up withdrawal reserve");
        let withdrawal = attempt(
            "safeAddToWithdrawalReserveIfAboveThreshold failed (tolerated)",
            self.deps
                .yield_manager
                .safe_add_to_withdrawal_reserve_if_above_threshold(self.provider(), amount),
        )
        .await;
        self.deps
            .recorder
            .record_safe_withdrawal_metrics(&withdrawal)
            .await;
    }

    /// Submit the vault report, then report yield. Yield is never reported
    /// on top of a failed vault report.
    async fn submit_report_and_yield(&self, vault: Address) -> Result<()> {
        if self.settings.should_submit_vault_report {
            let receipt = attempt(
                "submitLatestVaultReport failed",
                self.deps.accounting.submit_latest_vault_report(vault),
            )
            .await?;
            info!(vault = %vault, tx_hash = %receipt.tx_hash, "Vault report submitted");
            self.deps.metrics.increment_lido_vault_accounting_report(vault);
        } else {
            info!("Vault report submission disabled");
        }

        if !self.settings.should_report_yield {
            info!("Yield reporting disabled");
            return Ok(());
        }

        self.record_peeked_gauges(vault).await;

        let result = attempt(
            "reportYield failed",
            self.deps
                .yield_manager
                .report_yield(self.provider(), self.settings.l2_yield_recipient),
        )
        .await;
        self.deps
            .recorder
            .record_report_yield_metrics(self.provider(), &result)
            .await;
        result.map(|_| ())
    }

    async fn record_peeked_gauges(&self, vault: Address) {
        let (fees, peek) = tokio::join!(
            self.deps.vault_hub.settleable_lido_fees_value(vault),
            self.deps
                .yield_manager
                .peek_yield_report(self.provider(), self.settings.l2_yield_recipient),
        );
        match fees {
            Ok(fees) => self
                .deps
                .metrics
                .set_last_settleable_lido_fees(vault, wei_to_gwei_f64(fees)),
            Err(e) => warn!(vault = %vault, error = %e, "settleableLidoFeesValue read failed"),
        }
        match peek {
            Ok(report) => {
                self.deps.metrics.set_last_peeked_negative_yield_report(
                    vault,
                    wei_to_gwei_f64(report.outstanding_negative_yield),
                );
                self.deps
                    .metrics
                    .set_last_peeked_positive_yield_report(vault, wei_to_gwei_f64(report.yield_amount));
            }
            Err(e) => warn!(vault = %vault, error = %e, "reportYield dry run failed"),
        }
    }
}

#[async_trait]
impl OperationModeProcessor for YieldReportingProcessor {
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
            ref_slot = ?trigger.report.as_ref().map(|r| r.ref_slot),
            "Yield reporting cycle triggered"
        );
        timed_cycle(&self.deps.metrics, MODE, self.run_cycle()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NativeYieldMetric;
    use crate::test_utils::{running, Harness};
    use native_yield_chain::units::eth_to_wei;
    use native_yield_chain::RebalanceRequirement;
    use std::time::Duration;

    fn processor(harness: &Harness) -> YieldReportingProcessor {
        YieldReportingProcessor::new(harness.deps(), harness.settings())
    }

    #[tokio::test(start_paused = true)]
    async fn test_deficit_pauses_before_anything_else() {
        let h = Harness::new();
        h.yield_manager
            .script_requirements(vec![RebalanceRequirement::unstake(eth_to_wei(10))]);
        h.accounting.set_simulate_ok(true);

        processor(&h).process(running()).await.unwrap();

        let pause = h.log.position("pause_staking_if_not_already").unwrap();
        let report = h.log.position("submit_latest_vault_report").unwrap();
        let reserve = h
            .log
            .position("safe_add_to_withdrawal_reserve_if_above_threshold")
            .unwrap();
        assert!(pause < report);
        assert!(report < reserve);
        assert_eq!(h.log.count("unpause_staking_if_not_already"), 0);
        // deficit persists, so validator withdrawals are requested last
        assert_eq!(
            h.log.calls().last().map(String::as_str),
            Some("submit_withdrawal_requests_to_fulfil_amount")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_surplus_flipping_to_deficit_amends_once() {
        let h = Harness::new();
        h.yield_manager.script_requirements(vec![
            RebalanceRequirement::stake(eth_to_wei(5)),
            RebalanceRequirement::unstake(eth_to_wei(3)),
            RebalanceRequirement::none(),
        ]);
        h.accounting.set_simulate_ok(true);

        processor(&h).process(running()).await.unwrap();

        assert_eq!(
            h.log.count("safe_add_to_withdrawal_reserve_if_above_threshold"),
            1
        );
        assert_eq!(h.log.count("unpause_staking_if_not_already"), 0);
        assert_eq!(h.log.count("pause_staking_if_not_already"), 1);
        // amendment does not resubmit the report
        assert_eq!(h.log.count("submit_latest_vault_report"), 1);
        assert_eq!(h.log.count("submit_withdrawal_requests_to_fulfil_amount"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_surplus_stakes_then_reports_then_unpauses() {
        let h = Harness::new();
        h.yield_manager.script_requirements(vec![
            RebalanceRequirement::stake(eth_to_wei(5)),
            RebalanceRequirement::none(),
        ]);
        h.accounting.set_simulate_ok(true);

        processor(&h).process(running()).await.unwrap();

        let transfer = h.log.position("transfer_funds_for_native_yield").unwrap();
        let fund = h.log.position("fund_yield_provider").unwrap();
        let report = h.log.position("submit_latest_vault_report").unwrap();
        let yield_report = h.log.position("report_yield").unwrap();
        assert!(transfer < fund && fund < report && report < yield_report);
        assert_eq!(h.log.count("unpause_staking_if_not_already"), 1);

        let rebalances = h.metrics.calls_for(NativeYieldMetric::RebalanceAmountTotal);
        assert_eq!(rebalances.len(), 1);
        assert_eq!(rebalances[0].label("direction"), Some("STAKE"));
        assert_eq!(rebalances[0].value, 5_000_000_000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_failure_still_funds_and_reports() {
        let h = Harness::new();
        h.yield_manager
            .script_requirements(vec![RebalanceRequirement::stake(eth_to_wei(5)), RebalanceRequirement::none()]);
        h.accounting.set_simulate_ok(true);
        h.rollup.fail_transfer();

        processor(&h).process(running()).await.unwrap();

        assert_eq!(h.log.count("fund_yield_provider"), 1);
        assert_eq!(h.log.count("submit_latest_vault_report"), 1);
        assert_eq!(h.metrics.count(NativeYieldMetric::RebalanceAmountTotal), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_dry_run_skips_report() {
        let h = Harness::new();
        h.accounting.set_simulate_ok(false);

        processor(&h).process(running()).await.unwrap();

        assert_eq!(h.log.count("submit_latest_vault_report"), 0);
        assert_eq!(h.log.count("report_yield"), 0);
        assert_eq!(h.log.count("unpause_staking_if_not_already"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_failure_skips_yield_report() {
        let h = Harness::new();
        h.accounting.set_simulate_ok(true);
        h.accounting.fail_submit();

        processor(&h).process(running()).await.unwrap();

        assert_eq!(h.log.count("submit_latest_vault_report"), 1);
        assert_eq!(h.log.count("report_yield"), 0);
        assert_eq!(
            h.metrics
                .count(NativeYieldMetric::LidoVaultAccountingReportSubmittedTotal),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_report_records_metrics() {
        let h = Harness::new();
        h.accounting.set_simulate_ok(true);

        processor(&h).process(running()).await.unwrap();

        assert_eq!(
            h.metrics
                .count(NativeYieldMetric::LidoVaultAccountingReportSubmittedTotal),
            1
        );
        assert_eq!(h.metrics.count(NativeYieldMetric::LastSettleableLidoFees), 1);
        assert_eq!(h.metrics.count(NativeYieldMetric::LastPeekedPositiveYieldReport), 1);
        let triggers = h.metrics.calls_for(NativeYieldMetric::OperationModeTriggerTotal);
        assert_eq!(triggers[0].label("trigger"), Some("TIMEOUT"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpause_disabled_by_config() {
        let h = Harness::new();
        let mut settings = h.settings();
        settings.is_unpause_staking_enabled = false;

        YieldReportingProcessor::new(h.deps(), settings)
            .process(running())
            .await
            .unwrap();

        assert_eq!(h.log.count("unpause_staking_if_not_already"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_excludes_trigger_wait() {
        let h = Harness::new();
        h.accounting.set_simulate_ok(true);
        h.accounting.set_submit_delay(Duration::from_millis(600));

        processor(&h).process(running()).await.unwrap();

        let durations = h
            .metrics
            .calls_for(NativeYieldMetric::OperationModeExecutionDurationSeconds);
        assert_eq!(durations.len(), 1);
        assert!((durations[0].value - 0.6).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_read_failure_ends_cycle_but_records_duration() {
        let h = Harness::new();
        h.yield_manager.fail_requirements();

        assert!(processor(&h).process(running()).await.is_err());
        assert_eq!(
            h.metrics
                .count(NativeYieldMetric::OperationModeExecutionDurationSeconds),
            1
        );
        assert_eq!(h.log.count("pause_staking_if_not_already"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_event_triggers_cycle() {
        let h = Harness::new();
        h.lazy_oracle.deliver_event_after(Duration::from_millis(200));
        let start = tokio::time::Instant::now();

        processor(&h).process(running()).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(200));
        let triggers = h.metrics.calls_for(NativeYieldMetric::OperationModeTriggerTotal);
        assert_eq!(
            triggers[0].label("trigger"),
            Some("VAULTS_REPORT_DATA_UPDATED_EVENT")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_trigger_does_nothing() {
        let h = Harness::new();
        let (tx, rx) = watch::channel(false);
        tx.send_replace(true);

        let err = processor(&h).process(rx).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CycleError>(),
            Some(CycleError::ShutdownBeforeTrigger)
        ));
        assert_eq!(h.log.count("get_rebalance_requirements"), 0);
        assert_eq!(h.metrics.count(NativeYieldMetric::OperationModeTriggerTotal), 0);
    }
}
