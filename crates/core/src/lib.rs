//! Native-yield automation core.
//!
//! This crate provides the operation-mode engine:
//! - Mode selection from the yield provider's ossification state
//! - One processor per mode (yield reporting, ossification pending,
//!   ossification complete), each triggered by a LazyOracle report or a
//!   max-inaction timeout
//! - Lido vault accounting report submission with merkle proofs from IPFS
//! - Validator partial-withdrawal requests sized to the reserve deficit
//! - A rolling quota on staking rebalances
//! - Prometheus metrics, a gauge poller and the `/metrics` endpoint

mod accounting_report;
mod attempt;
mod beacon_staking;
pub mod config;
mod gauge_poller;
pub mod metrics;
mod mode;
pub mod processors;
mod quota;
mod selector;
mod sources;
mod trigger;

#[cfg(test)]
mod test_utils;

pub use accounting_report::LidoAccountingReportService;
pub use attempt::attempt;
pub use beacon_staking::BeaconChainStakingService;
pub use config::{ConfigError, ServiceConfig};
pub use gauge_poller::GaugeMetricsPoller;
pub use metrics::{
    metrics_router, serve_metrics, MetricsService, NativeYieldMetric, NativeYieldMetricsUpdater,
    OperationModeMetricsRecorder, PrometheusMetricsService,
};
pub use mode::{ExecutionStatus, OperationMode, OperationTrigger, OperationTriggerResult};
pub use processors::{
    CycleError, OperationModeProcessor, OssificationCompleteProcessor,
    OssificationPendingProcessor, ProcessorDeps, ProcessorSettings, YieldReportingProcessor,
};
pub use quota::RebalanceQuotaService;
pub use selector::OperationModeSelector;
pub use sources::{BeaconStateSource, ReportTreeSource, ValidatorSource};
pub use trigger::wait_for_vault_report_or_timeout;
