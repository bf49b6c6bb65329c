//! HTTP clients for the off-chain services the automation reads.
//!
//! This crate provides clients for:
//! - IPFS gateway: LazyOracle report trees and merkle proofs
//! - Staking GraphQL API: active validator balances
//! - Beacon node REST API: pending partial withdrawals and the current epoch

mod beacon;
mod ipfs;
mod staking;
pub mod validators;

pub use beacon::{BeaconNodeClient, SLOTS_PER_EPOCH};
pub use ipfs::{process_proof, IpfsClient, ReportTree, ReportTreeValue, VaultLeaf};
pub use staking::StakingApiClient;
pub use validators::{
    filter_withdrawal_eligible, join_validators_with_pending_withdrawals,
    total_pending_withdrawals_gwei, total_validator_balance_gwei, PendingPartialWithdrawal,
    ValidatorBalance, ValidatorWithdrawable, MIN_VALIDATOR_BALANCE_GWEI, SHARD_COMMITTEE_PERIOD,
};
