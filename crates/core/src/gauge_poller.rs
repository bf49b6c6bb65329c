//! Periodic refresh of state gauges that no cycle touches directly.

use alloy::primitives::Address;
use anyhow::Result;
use native_yield_api::{
    join_validators_with_pending_withdrawals, total_pending_withdrawals_gwei,
    total_validator_balance_gwei,
};
use native_yield_chain::units::wei_to_gwei_f64;
use native_yield_chain::{VaultHub, YieldManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::metrics::{NativeYieldMetricsUpdater, OperationModeMetricsRecorder};
use crate::sources::{BeaconStateSource, ValidatorSource};

#[derive(Debug)]
pub struct GaugeMetricsPoller {
    recorder: OperationModeMetricsRecorder,
    metrics: NativeYieldMetricsUpdater,
    yield_manager: Arc<dyn YieldManager>,
    vault_hub: Arc<dyn VaultHub>,
    validators: Arc<dyn ValidatorSource>,
    beacon: Arc<dyn BeaconStateSource>,
    yield_provider: Address,
    poll_interval: Duration,
}

impl GaugeMetricsPoller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        recorder: OperationModeMetricsRecorder,
        metrics: NativeYieldMetricsUpdater,
        yield_manager: Arc<dyn YieldManager>,
        vault_hub: Arc<dyn VaultHub>,
        validators: Arc<dyn ValidatorSource>,
        beacon: Arc<dyn BeaconStateSource>,
        yield_provider: Address,
        poll_interval: Duration,
    ) -> Self {
        Self {
            recorder,
            metrics,
            yield_manager,
            vault_hub,
            validators,
            beacon,
            yield_provider,
            poll_interval,
        }
    }

    async fn poll_vault_gauges(&self) -> Result<()> {
        let vault = self
            .yield_manager
            .get_lido_staking_vault_address(self.yield_provider)
            .await?;
        let (timestamp, fees) = tokio::join!(
            self.vault_hub.latest_vault_report_timestamp(vault),
            self.vault_hub.settleable_lido_fees_value(vault),
        );
        match timestamp {
            Ok(ts) => self.metrics.set_last_vault_report_timestamp(vault, ts),
            Err(e) => warn!(vault = %vault, error = %e, "Vault report timestamp read failed"),
        }
        match fees {
            Ok(fees) => self
                .metrics
                .set_last_settleable_lido_fees(vault, wei_to_gwei_f64(fees)),
            Err(e) => warn!(vault = %vault, error = %e, "Settleable Lido fees read failed"),
        }
        Ok(())
    }

    async fn poll_validator_gauges(&self) -> Result<()> {
        let (validators, pending) = tokio::try_join!(
            self.validators.get_active_validators(),
            self.beacon.get_pending_partial_withdrawals(),
        )?;

        if let Some(total) = total_validator_balance_gwei(&validators) {
            self.metrics.set_last_total_validator_balance_gwei(total as f64);
        }
        let joined = join_validators_with_pending_withdrawals(&validators, &pending);
        self.metrics
            .set_last_total_pending_partial_withdrawals_gwei(total_pending_withdrawals_gwei(&joined) as f64);
        Ok(())
    }

    /// One pass; each group of reads fails independently.
    pub async fn poll_once(&self) {
        let (provider, vault, validators) = tokio::join!(
            self.recorder.record_yield_provider_gauges(self.yield_provider),
            self.poll_vault_gauges(),
            self.poll_validator_gauges(),
        );
        for (source, result) in [
            ("yield provider", provider),
            ("vault", vault),
            ("validators", validators),
        ] {
            if let Err(e) = result {
                warn!(source = source, error = %format!("{e:#}"), "Gauge poll failed");
            }
        }
        debug!("Gauge poll complete");
    }

    /// Poll until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "Gauge poller started");
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.poll_once().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Gauge poller stopped");
    }
}
