//! Native-yield chain interaction layer.
//!
//! This crate provides:
//! - Client traits for the YieldManager, LazyOracle, VaultHub, Dashboard and
//!   rollup yield extension contracts
//! - Alloy-backed implementations with inline ABI bindings
//! - A polling watcher for `VaultsReportDataUpdated` events
//! - Transaction signing and sending with gas-estimation error reporting
//! - Wei/gwei unit helpers

pub mod clients;
pub mod contracts;
mod event_listener;
mod provider;
mod signer;
pub mod types;
pub mod units;
mod watch;

pub use clients::{
    AccountingReportClient, BeaconStakingClient, Dashboard, GasErrorReporter, LazyOracle,
    RebalancePolicy, RollupYieldExtension, VaultHub, YieldManager,
};
pub use contracts::{
    DashboardContractClient, LazyOracleContractClient, RollupYieldExtensionClient,
    VaultHubContractClient, YieldManagerContractClient,
};
pub use event_listener::{
    decode_report_log, is_benign_watch_error, FilterRpcError, ReportFilterRpc, ReportWatcher,
};
pub use provider::ProviderManager;
pub use signer::{NonceManager, TransactionSender, TransactionSenderBuilder};
pub use types::{
    LiabilityPayment, LidoFeePayment, RebalanceDirection, RebalanceRequirement, ReportEvent,
    TxReceipt, VaultReport, VaultReportParams, WithdrawalEvent, WithdrawalRequests,
    YieldProviderData, YieldReport,
};
pub use watch::{ReportWatch, SubscriptionHandle};
