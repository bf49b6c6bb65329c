//! Operation modes, trigger outcomes and execution status labels.

use alloy::primitives::B256;
use native_yield_chain::VaultReport;
use std::fmt;

/// One of the three mutually exclusive automation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationMode {
    YieldReporting,
    OssificationPending,
    OssificationComplete,
}

impl OperationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YieldReporting => "YIELD_REPORTING_MODE",
            Self::OssificationPending => "OSSIFICATION_PENDING_MODE",
            Self::OssificationComplete => "OSSIFICATION_COMPLETE_MODE",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What woke a processor up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationTrigger {
    VaultsReportDataUpdatedEvent,
    Timeout,
}

impl OperationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VaultsReportDataUpdatedEvent => "VAULTS_REPORT_DATA_UPDATED_EVENT",
            Self::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for OperationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a trigger wait. `tx_hash` and `report` are set only when the
/// report event won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationTriggerResult {
    pub result: OperationTrigger,
    pub tx_hash: Option<B256>,
    pub report: Option<VaultReport>,
}

impl OperationTriggerResult {
    pub fn timeout() -> Self {
        Self {
            result: OperationTrigger::Timeout,
            tx_hash: None,
            report: None,
        }
    }

    pub fn event(tx_hash: B256, report: VaultReport) -> Self {
        Self {
            result: OperationTrigger::VaultsReportDataUpdatedEvent,
            tx_hash: Some(tx_hash),
            report: Some(report),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    Success,
    Failure,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}
