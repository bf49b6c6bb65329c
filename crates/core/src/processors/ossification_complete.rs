//! OSSIFICATION_COMPLETE_MODE: sweep whatever the ossified provider still
//! holds back into the withdrawal reserve.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, instrument};

use super::{
    idle_unless_shutdown, timed_cycle, CycleError, OperationModeProcessor, ProcessorDeps,
    ProcessorSettings,
};
use crate::attempt::attempt;
use crate::mode::OperationMode;

const MODE: OperationMode = OperationMode::OssificationComplete;

#[derive(Debug)]
pub struct OssificationCompleteProcessor {
    deps: ProcessorDeps,
    settings: ProcessorSettings,
}

impl OssificationCompleteProcessor {
    pub fn new(deps: ProcessorDeps, settings: ProcessorSettings) -> Self {
        Self { deps, settings }
    }

    async fn run_cycle(&self) -> Result<()> {
        let provider = self.settings.yield_provider;

        let _ = attempt(
            "submitMaxAvailableWithdrawalRequests failed (tolerated)",
            self.deps
                .beacon_staking
                .submit_max_available_withdrawal_requests(),
        )
        .await;

        let withdrawal = attempt(
            "safeMaxAddToWithdrawalReserve failed (tolerated)",
            self.deps
                .yield_manager
                .safe_max_add_to_withdrawal_reserve(provider),
        )
        .await;
        self.deps
            .recorder
            .record_safe_withdrawal_metrics(&withdrawal)
            .await;
        Ok(())
    }
}

#[async_trait]
impl OperationModeProcessor for OssificationCompleteProcessor {
    fn mode(&self) -> OperationMode {
        MODE
    }

    /// No event to wait for once ossified; the cycle runs on a fixed cadence.
    #[instrument(skip(self, shutdown), fields(mode = %MODE))]
    async fn process(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if !idle_unless_shutdown(MODE, self.settings.max_inaction, &mut shutdown).await {
            return Err(CycleError::ShutdownBeforeTrigger.into());
        }
        info!("Ossification complete cycle started");
        timed_cycle(&self.deps.metrics, MODE, self.run_cycle()).await
    }
}
