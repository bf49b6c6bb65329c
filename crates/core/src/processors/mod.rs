//! Operation-mode processors.
//!
//! One processor per [`OperationMode`]. Each `process()` call runs a single
//! cycle: wait for a trigger, act, record the cycle duration.
//!
//! Shutdown is honoured only while waiting for the trigger. Once triggered,
//! a cycle always runs to completion.

mod ossification_complete;
mod ossification_pending;
mod yield_reporting;

pub use ossification_complete::OssificationCompleteProcessor;
pub use ossification_pending::OssificationPendingProcessor;
pub use yield_reporting::YieldReportingProcessor;

use alloy::primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use native_yield_chain::{
    AccountingReportClient, BeaconStakingClient, LazyOracle, RollupYieldExtension, VaultHub,
    YieldManager,
};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::info;

use crate::config::ServiceConfig;
use crate::metrics::{NativeYieldMetricsUpdater, OperationModeMetricsRecorder};
use crate::mode::{OperationMode, OperationTriggerResult};
use crate::trigger::wait_for_vault_report_or_timeout;

#[async_trait]
pub trait OperationModeProcessor: Send + Sync + Debug {
    fn mode(&self) -> OperationMode;

    /// Run one cycle. Tolerated sub-step failures are logged, not returned.
    ///
    /// If `shutdown` flips to `true` before the trigger fires, nothing is
    /// done and [`CycleError::ShutdownBeforeTrigger`] is returned.
    async fn process(&self, shutdown: watch::Receiver<bool>) -> Result<()>;
}

/// Hard-dependency failures that end a cycle early.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("progressPendingOssification failed: {0}")]
    OssificationProgressFailed(String),
    #[error("shutdown requested before the cycle was triggered")]
    ShutdownBeforeTrigger,
}

/// Clients shared by every processor.
#[derive(Debug, Clone)]
pub struct ProcessorDeps {
    pub yield_manager: Arc<dyn YieldManager>,
    pub lazy_oracle: Arc<dyn LazyOracle>,
    pub vault_hub: Arc<dyn VaultHub>,
    pub rollup: Arc<dyn RollupYieldExtension>,
    pub accounting: Arc<dyn AccountingReportClient>,
    pub beacon_staking: Arc<dyn BeaconStakingClient>,
    pub metrics: NativeYieldMetricsUpdater,
    pub recorder: OperationModeMetricsRecorder,
}

/// Per-provider settings shared by every processor.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub yield_provider: Address,
    pub l2_yield_recipient: Address,
    pub max_inaction: Duration,
    pub should_submit_vault_report: bool,
    pub should_report_yield: bool,
    pub is_unpause_staking_enabled: bool,
}

impl ProcessorSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            yield_provider: config.contracts.lido_yield_provider,
            l2_yield_recipient: config.contracts.l2_yield_recipient,
            max_inaction: config.timing.trigger_max_inaction(),
            should_submit_vault_report: config.reporting.should_submit_vault_report,
            should_report_yield: config.reporting.should_report_yield,
            is_unpause_staking_enabled: config.reporting.is_unpause_staking_enabled,
        }
    }
}

/// Resolves once `shutdown` reads `true`. Never resolves if the sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let sender_gone = shutdown.wait_for(|stop| *stop).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

/// Race the report event against `max_inaction` and count the trigger.
/// `None` when shutdown arrived first.
async fn await_trigger(
    deps: &ProcessorDeps,
    mode: OperationMode,
    max_inaction: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<OperationTriggerResult> {
    let trigger = tokio::select! {
        trigger = wait_for_vault_report_or_timeout(deps.lazy_oracle.as_ref(), max_inaction) => trigger,
        _ = shutdown_requested(shutdown) => {
            info!(mode = %mode, "Shutdown before trigger, skipping cycle");
            return None;
        }
    };
    deps.metrics.increment_operation_mode_trigger(mode, trigger.result);
    Some(trigger)
}

/// Sleep out `period` unless shutdown arrives first. Returns false on shutdown.
async fn idle_unless_shutdown(
    mode: OperationMode,
    period: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(period) => true,
        _ = shutdown_requested(shutdown) => {
            info!(mode = %mode, "Shutdown before trigger, skipping cycle");
            false
        }
    }
}

/// Run `cycle`, recording its duration whatever the outcome.
async fn timed_cycle<F>(metrics: &NativeYieldMetricsUpdater, mode: OperationMode, cycle: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let started = Instant::now();
    let result = cycle.await;
    metrics.record_operation_mode_duration(mode, started.elapsed().as_secs_f64());
    result
}
