//! Alloy-backed implementations of the client traits.
//!
//! Reads go through a shared [`ProviderManager`](crate::ProviderManager);
//! mutating calls are ABI-encoded here and sent through the
//! [`TransactionSender`](crate::TransactionSender), which estimates gas
//! before broadcasting.

pub mod bindings;
mod dashboard;
mod lazy_oracle;
mod rollup;
mod vault_hub;
mod yield_manager;

pub use dashboard::DashboardContractClient;
pub use lazy_oracle::LazyOracleContractClient;
pub use rollup::RollupYieldExtensionClient;
pub use vault_hub::{decode_lido_fee_payment, decode_liability_payment, VaultHubContractClient};
pub use yield_manager::{
    decode_withdrawal_event, decode_yield_report, evaluate_rebalance, YieldManagerContractClient,
};
