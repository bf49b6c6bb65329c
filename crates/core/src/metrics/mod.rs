//! Prometheus metrics for the automation service.
//!
//! This module provides:
//! - The metric catalogue ([`NativeYieldMetric`]) with names, help and labels
//! - A [`MetricsService`] sink and its prometheus-backed implementation
//! - A typed updater that enforces the recording guards
//! - A recorder that derives metrics from transaction receipts
//! - An axum route serving the text exposition format

mod recorder;
mod server;
mod updater;

pub use recorder::OperationModeMetricsRecorder;
pub use server::{metrics_router, serve_metrics};
pub use updater::NativeYieldMetricsUpdater;

use anyhow::Result;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::warn;

/// Histogram buckets for cycle durations, up to 20 minutes.
pub const OPERATION_MODE_DURATION_BUCKETS: [f64; 11] = [
    1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 180.0, 300.0, 600.0, 900.0, 1200.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Every metric the service exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeYieldMetric {
    RebalanceAmountTotal,
    ValidatorPartialUnstakeAmountTotal,
    LidoVaultAccountingReportSubmittedTotal,
    ReportYieldTotal,
    NodeOperatorFeesPaidTotal,
    LiabilitiesPaidTotal,
    LidoFeesPaidTotal,
    OperationModeTriggerTotal,
    OperationModeExecutionTotal,
    StakingDepositQuotaExceeded,
    ContractEstimateGasError,
    LastPeekedNegativeYieldReport,
    LastPeekedPositiveYieldReport,
    LastSettleableLidoFees,
    LastVaultReportTimestamp,
    YieldReportedCumulative,
    LstLiabilityPrincipalGwei,
    LastReportedNegativeYield,
    LastTotalPendingPartialWithdrawalsGwei,
    LastTotalValidatorBalanceGwei,
    ActualRebalanceRequirementGwei,
    ReportedRebalanceRequirementGwei,
    OperationModeExecutionDurationSeconds,
}

impl NativeYieldMetric {
    pub const ALL: [NativeYieldMetric; 23] = [
        Self::RebalanceAmountTotal,
        Self::ValidatorPartialUnstakeAmountTotal,
        Self::LidoVaultAccountingReportSubmittedTotal,
        Self::ReportYieldTotal,
        Self::NodeOperatorFeesPaidTotal,
        Self::LiabilitiesPaidTotal,
        Self::LidoFeesPaidTotal,
        Self::OperationModeTriggerTotal,
        Self::OperationModeExecutionTotal,
        Self::StakingDepositQuotaExceeded,
        Self::ContractEstimateGasError,
        Self::LastPeekedNegativeYieldReport,
        Self::LastPeekedPositiveYieldReport,
        Self::LastSettleableLidoFees,
        Self::LastVaultReportTimestamp,
        Self::YieldReportedCumulative,
        Self::LstLiabilityPrincipalGwei,
        Self::LastReportedNegativeYield,
        Self::LastTotalPendingPartialWithdrawalsGwei,
        Self::LastTotalValidatorBalanceGwei,
        Self::ActualRebalanceRequirementGwei,
        Self::ReportedRebalanceRequirementGwei,
        Self::OperationModeExecutionDurationSeconds,
    ];

    /// Exported metric name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RebalanceAmountTotal => "native_yield_rebalance_amount_total",
            Self::ValidatorPartialUnstakeAmountTotal => {
                "native_yield_validator_partial_unstake_amount_total"
            }
            Self::LidoVaultAccountingReportSubmittedTotal => {
                "native_yield_lido_vault_accounting_report_submitted_total"
            }
            Self::ReportYieldTotal => "native_yield_report_yield_total",
            Self::NodeOperatorFeesPaidTotal => "native_yield_node_operator_fees_paid_total",
            Self::LiabilitiesPaidTotal => "native_yield_liabilities_paid_total",
            Self::LidoFeesPaidTotal => "native_yield_lido_fees_paid_total",
            Self::OperationModeTriggerTotal => "native_yield_operation_mode_trigger_total",
            Self::OperationModeExecutionTotal => "native_yield_operation_mode_execution_total",
            Self::StakingDepositQuotaExceeded => "native_yield_staking_deposit_quota_exceeded",
            Self::ContractEstimateGasError => "native_yield_contract_estimate_gas_error",
            Self::LastPeekedNegativeYieldReport => "native_yield_last_peeked_negative_yield_report",
            Self::LastPeekedPositiveYieldReport => "native_yield_last_peeked_positive_yield_report",
            Self::LastSettleableLidoFees => "native_yield_last_settleable_lido_fees",
            Self::LastVaultReportTimestamp => "native_yield_last_vault_report_timestamp",
            Self::YieldReportedCumulative => "native_yield_yield_reported_cumulative",
            Self::LstLiabilityPrincipalGwei => "native_yield_lst_liability_principal_gwei",
            Self::LastReportedNegativeYield => "native_yield_last_reported_negative_yield",
            Self::LastTotalPendingPartialWithdrawalsGwei => {
                "native_yield_last_total_pending_partial_withdrawals_gwei"
            }
            Self::LastTotalValidatorBalanceGwei => "native_yield_last_total_validator_balance_gwei",
            Self::ActualRebalanceRequirementGwei => "native_yield_actual_rebalance_requirement_gwei",
            Self::ReportedRebalanceRequirementGwei => {
                "native_yield_reported_rebalance_requirement_gwei"
            }
            Self::OperationModeExecutionDurationSeconds => {
                "native_yield_operation_mode_execution_duration_seconds"
            }
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Self::RebalanceAmountTotal => {
                "Total rebalance amount between L1MessageService and YieldProvider"
            }
            Self::ValidatorPartialUnstakeAmountTotal => {
                "Total amount partially unstaked per validator"
            }
            Self::LidoVaultAccountingReportSubmittedTotal => {
                "Accounting reports submitted to Lido per vault"
            }
            Self::ReportYieldTotal => "Yield reports submitted to YieldManager per vault",
            Self::NodeOperatorFeesPaidTotal => "Node operator fees paid by automation per vault",
            Self::LiabilitiesPaidTotal => "Liabilities paid by automation per vault",
            Self::LidoFeesPaidTotal => "Lido fees paid by automation per vault",
            Self::OperationModeTriggerTotal => "Operation mode triggers grouped by mode and trigger",
            Self::OperationModeExecutionTotal => {
                "Operation mode executions grouped by mode and status"
            }
            Self::StakingDepositQuotaExceeded => {
                "Total number of times the staking deposit quota has been exceeded"
            }
            Self::ContractEstimateGasError => "Total number of contract estimateGas errors",
            Self::LastPeekedNegativeYieldReport => {
                "Outstanding negative yield from the last peeked yield report"
            }
            Self::LastPeekedPositiveYieldReport => {
                "Positive yield amount from the last peeked yield report"
            }
            Self::LastSettleableLidoFees => "Settleable Lido protocol fees from the last query",
            Self::LastVaultReportTimestamp => "Timestamp from the latest vault report",
            Self::YieldReportedCumulative => {
                "Cumulative yield reported from the YieldManager contract"
            }
            Self::LstLiabilityPrincipalGwei => "LST liability principal from the YieldManager contract",
            Self::LastReportedNegativeYield => {
                "Last reported negative yield from the YieldManager contract"
            }
            Self::LastTotalPendingPartialWithdrawalsGwei => {
                "Total pending partial withdrawals in gwei"
            }
            Self::LastTotalValidatorBalanceGwei => "Total validator balance in gwei",
            Self::ActualRebalanceRequirementGwei => {
                "Rebalance requirement in gwei before the staking quota"
            }
            Self::ReportedRebalanceRequirementGwei => {
                "Rebalance requirement in gwei after the staking quota"
            }
            Self::OperationModeExecutionDurationSeconds => {
                "Operation mode execution duration in seconds"
            }
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Self::RebalanceAmountTotal
            | Self::ValidatorPartialUnstakeAmountTotal
            | Self::LidoVaultAccountingReportSubmittedTotal
            | Self::ReportYieldTotal
            | Self::NodeOperatorFeesPaidTotal
            | Self::LiabilitiesPaidTotal
            | Self::LidoFeesPaidTotal
            | Self::OperationModeTriggerTotal
            | Self::OperationModeExecutionTotal
            | Self::StakingDepositQuotaExceeded
            | Self::ContractEstimateGasError => MetricKind::Counter,
            Self::OperationModeExecutionDurationSeconds => MetricKind::Histogram,
            _ => MetricKind::Gauge,
        }
    }

    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            Self::RebalanceAmountTotal => &["direction"],
            Self::ValidatorPartialUnstakeAmountTotal => &["validator_pubkey"],
            Self::OperationModeTriggerTotal => &["mode", "trigger"],
            Self::OperationModeExecutionTotal => &["mode", "status"],
            Self::ContractEstimateGasError => &["contract_address", "rawRevertData", "errorName"],
            Self::ActualRebalanceRequirementGwei | Self::ReportedRebalanceRequirementGwei => {
                &["vault_address", "staking_direction"]
            }
            Self::LastTotalPendingPartialWithdrawalsGwei | Self::LastTotalValidatorBalanceGwei => {
                &[]
            }
            Self::OperationModeExecutionDurationSeconds => &["mode"],
            _ => &["vault_address"],
        }
    }
}

/// Metrics sink. Implementations must never panic on bad input: a label
/// mismatch is logged and dropped.
pub trait MetricsService: Send + Sync + Debug {
    fn increment_counter(&self, metric: NativeYieldMetric, labels: &[(&str, &str)], amount: f64);

    fn set_gauge(&self, metric: NativeYieldMetric, labels: &[(&str, &str)], value: f64);

    fn add_value_to_histogram(&self, metric: NativeYieldMetric, value: f64, labels: &[(&str, &str)]);
}

#[derive(Debug, Clone)]
enum Collector {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
}

/// [`MetricsService`] backed by a private prometheus [`Registry`].
#[derive(Debug, Clone)]
pub struct PrometheusMetricsService {
    registry: Registry,
    collectors: HashMap<NativeYieldMetric, Collector>,
}

fn label_map<'a>(labels: &'a [(&'a str, &'a str)]) -> HashMap<&'a str, &'a str> {
    labels.iter().copied().collect()
}

impl PrometheusMetricsService {
    /// Register every [`NativeYieldMetric`].
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let mut collectors = HashMap::with_capacity(NativeYieldMetric::ALL.len());

        for metric in NativeYieldMetric::ALL {
            let collector = match metric.kind() {
                MetricKind::Counter => {
                    let vec = CounterVec::new(Opts::new(metric.name(), metric.help()), metric.labels())?;
                    registry.register(Box::new(vec.clone()))?;
                    Collector::Counter(vec)
                }
                MetricKind::Gauge => {
                    let vec = GaugeVec::new(Opts::new(metric.name(), metric.help()), metric.labels())?;
                    registry.register(Box::new(vec.clone()))?;
                    Collector::Gauge(vec)
                }
                MetricKind::Histogram => {
                    let vec = HistogramVec::new(
                        HistogramOpts::new(metric.name(), metric.help())
                            .buckets(OPERATION_MODE_DURATION_BUCKETS.to_vec()),
                        metric.labels(),
                    )?;
                    registry.register(Box::new(vec.clone()))?;
                    Collector::Histogram(vec)
                }
            };
            collectors.insert(metric, collector);
        }

        Ok(Self {
            registry,
            collectors,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl MetricsService for PrometheusMetricsService {
    fn increment_counter(&self, metric: NativeYieldMetric, labels: &[(&str, &str)], amount: f64) {
        if amount < 0.0 || !amount.is_finite() {
            warn!(metric = metric.name(), amount = amount, "Refusing to decrement counter");
            return;
        }
        let Some(Collector::Counter(vec)) = self.collectors.get(&metric) else {
            warn!(metric = metric.name(), "Not a counter");
            return;
        };
        match vec.get_metric_with(&label_map(labels)) {
            Ok(counter) => counter.inc_by(amount),
            Err(e) => warn!(metric = metric.name(), error = %e, "Counter label mismatch"),
        }
    }

    fn set_gauge(&self, metric: NativeYieldMetric, labels: &[(&str, &str)], value: f64) {
        let Some(Collector::Gauge(vec)) = self.collectors.get(&metric) else {
            warn!(metric = metric.name(), "Not a gauge");
            return;
        };
        match vec.get_metric_with(&label_map(labels)) {
            Ok(gauge) => gauge.set(value),
            Err(e) => warn!(metric = metric.name(), error = %e, "Gauge label mismatch"),
        }
    }

    fn add_value_to_histogram(&self, metric: NativeYieldMetric, value: f64, labels: &[(&str, &str)]) {
        let Some(Collector::Histogram(vec)) = self.collectors.get(&metric) else {
            warn!(metric = metric.name(), "Not a histogram");
            return;
        };
        match vec.get_metric_with(&label_map(labels)) {
            Ok(histogram) => histogram.observe(value),
            Err(e) => warn!(metric = metric.name(), error = %e, "Histogram label mismatch"),
        }
    }
}
