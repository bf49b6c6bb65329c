//! Operation mode selection loop.
//!
//! Each iteration reads the provider's ossification state, picks the
//! matching processor and runs one cycle. Runs until [`OperationModeSelector::stop`].
//! A stop interrupts mode reads and trigger waits, but a triggered cycle
//! finishes before the loop exits.

use alloy::primitives::Address;
use native_yield_chain::YieldManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::metrics::NativeYieldMetricsUpdater;
use crate::mode::{ExecutionStatus, OperationMode};
use crate::processors::{shutdown_requested, CycleError, OperationModeProcessor};

#[derive(Debug)]
pub struct OperationModeSelector {
    yield_manager: Arc<dyn YieldManager>,
    processors: HashMap<OperationMode, Arc<dyn OperationModeProcessor>>,
    metrics: NativeYieldMetricsUpdater,
    yield_provider: Address,
    /// Delay before retrying a failed mode read
    read_retry: Duration,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl OperationModeSelector {
    pub fn new(
        yield_manager: Arc<dyn YieldManager>,
        processors: Vec<Arc<dyn OperationModeProcessor>>,
        metrics: NativeYieldMetricsUpdater,
        yield_provider: Address,
        read_retry: Duration,
    ) -> Self {
        let processors = processors.into_iter().map(|p| (p.mode(), p)).collect();
        let (shutdown, _) = watch::channel(false);
        Self {
            yield_manager,
            processors,
            metrics,
            yield_provider,
            read_retry,
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Current mode, retrying reads until they succeed.
    pub async fn select_mode(&self) -> OperationMode {
        loop {
            let reads = tokio::try_join!(
                self.yield_manager.is_ossified(self.yield_provider),
                self.yield_manager
                    .is_ossification_initiated(self.yield_provider),
            );
            match reads {
                Ok((true, _)) => return OperationMode::OssificationComplete,
                Ok((false, true)) => return OperationMode::OssificationPending,
                Ok((false, false)) => return OperationMode::YieldReporting,
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_ms = self.read_retry.as_millis() as u64,
                        "Ossification state read failed, retrying"
                    );
                    tokio::time::sleep(self.read_retry).await;
                }
            }
        }
    }

    /// Select a mode and run one cycle of its processor.
    pub async fn run_once(&self, mut shutdown: watch::Receiver<bool>) {
        let mode = tokio::select! {
            mode = self.select_mode() => mode,
            _ = shutdown_requested(&mut shutdown) => return,
        };
        let Some(processor) = self.processors.get(&mode) else {
            error!(mode = %mode, "No processor registered for mode");
            tokio::time::sleep(self.read_retry).await;
            return;
        };

        info!(mode = %mode, "Running operation mode cycle");
        let status = match processor.process(shutdown).await {
            Ok(()) => ExecutionStatus::Success,
            Err(e) if matches!(
                e.downcast_ref::<CycleError>(),
                Some(CycleError::ShutdownBeforeTrigger)
            ) =>
            {
                info!(mode = %mode, "Cycle skipped, selector stopping");
                return;
            }
            Err(e) => {
                error!(mode = %mode, error = %format!("{e:#}"), "Operation mode cycle failed");
                ExecutionStatus::Failure
            }
        };
        self.metrics.increment_operation_mode_execution(mode, status);
    }

    /// Spawn the selection loop. Calling `start` on a running selector is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }

        let selector = Arc::clone(self);
        let shutdown = self.shutdown.subscribe();
        *handle = Some(tokio::spawn(async move {
            info!(yield_provider = %selector.yield_provider, "Operation mode selector started");
            loop {
                if *shutdown.borrow() {
                    break;
                }
                selector.run_once(shutdown.clone()).await;
            }
            info!("Operation mode selector stopped");
        }));
    }

    /// Signal the loop and wait for it to exit, letting a triggered cycle
    /// finish first. Safe to call more than once.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Selector task ended abnormally");
            }
        }
    }
}
