//! Event-versus-timeout trigger shared by the operation-mode processors.

use native_yield_chain::{LazyOracle, ReportWatch};
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::mode::OperationTriggerResult;

/// Wait for the next `VaultsReportDataUpdated` event or `max_inaction`,
/// whichever comes first. The event's tx hash and report are carried in the
/// result. The watcher is always unsubscribed before returning.
#[instrument(skip(oracle))]
pub async fn wait_for_vault_report_or_timeout(
    oracle: &dyn LazyOracle,
    max_inaction: Duration,
) -> OperationTriggerResult {
    let deadline = tokio::time::Instant::now() + max_inaction;

    let watch = match oracle.wait_for_vaults_report_data_updated_event().await {
        Ok(watch) => watch,
        Err(e) => {
            error!(error = %e, "Failed to subscribe to VaultsReportDataUpdated, waiting for timeout");
            tokio::time::sleep_until(deadline).await;
            return OperationTriggerResult::timeout();
        }
    };

    let ReportWatch {
        mut subscription,
        event: receiver,
    } = watch;

    // a closed channel means the watcher stopped; only the timer can win then
    let event = async move {
        match receiver.await {
            Ok(event) => event,
            Err(_) => std::future::pending().await,
        }
    };

    let trigger = tokio::select! {
        event = event => {
            info!(
                tx_hash = %event.tx_hash,
                ref_slot = event.report.ref_slot,
                report_cid = %event.report.report_cid,
                "VaultsReportDataUpdated received"
            );
            OperationTriggerResult::event(event.tx_hash, event.report)
        }
        _ = tokio::time::sleep_until(deadline) => {
            info!(max_inaction_ms = max_inaction.as_millis() as u64, "Trigger timed out");
            OperationTriggerResult::timeout()
        }
    };

    subscription.unsubscribe();
    trigger
}
