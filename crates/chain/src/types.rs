//! Domain types shared between the contract clients and the engine.

use alloy::primitives::{Address, Bytes, Log, B256, U256};
use alloy::rpc::types::TransactionReceipt;
use std::fmt;

/// Direction of a reserve rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RebalanceDirection {
    /// Reserve surplus, move funds to the yield provider.
    Stake,
    /// Reserve deficit, pull funds back from the yield provider.
    Unstake,
    None,
}

impl RebalanceDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stake => "STAKE",
            Self::Unstake => "UNSTAKE",
            Self::None => "NONE",
        }
    }

    /// Label value used by the rebalance requirement gauges.
    pub fn staking_label(&self) -> &'static str {
        match self {
            Self::Stake => "STAKING",
            Self::Unstake => "UNSTAKING",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for RebalanceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction and magnitude of the current reserve imbalance.
///
/// Always recomputed from chain state. A zero amount is only ever paired
/// with [`RebalanceDirection::None`] and vice versa; the constructors
/// normalise any other combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceRequirement {
    direction: RebalanceDirection,
    amount: U256,
}

impl RebalanceRequirement {
    pub fn new(direction: RebalanceDirection, amount: U256) -> Self {
        if direction == RebalanceDirection::None || amount.is_zero() {
            return Self::none();
        }
        Self { direction, amount }
    }

    pub fn stake(amount: U256) -> Self {
        Self::new(RebalanceDirection::Stake, amount)
    }

    pub fn unstake(amount: U256) -> Self {
        Self::new(RebalanceDirection::Unstake, amount)
    }

    pub fn none() -> Self {
        Self {
            direction: RebalanceDirection::None,
            amount: U256::ZERO,
        }
    }

    pub fn direction(&self) -> RebalanceDirection {
        self.direction
    }

    /// Amount in wei.
    pub fn amount(&self) -> U256 {
        self.amount
    }

    pub fn is_deficit(&self) -> bool {
        self.direction == RebalanceDirection::Unstake
    }
}

/// Snapshot published by the LazyOracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultReport {
    pub timestamp: u64,
    pub ref_slot: u64,
    /// Merkle root of the per-vault report tree
    pub tree_root: B256,
    /// IPFS CID of the full report tree
    pub report_cid: String,
}

impl VaultReport {
    /// Report timestamp rendered as RFC 3339, for logs.
    pub fn published_at(&self) -> String {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

/// A `VaultsReportDataUpdated` log delivered by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEvent {
    pub tx_hash: B256,
    pub report: VaultReport,
}

/// Merkle-proved input for `LazyOracle.updateVaultData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultReportParams {
    pub vault: Address,
    pub total_value: U256,
    pub cumulative_lido_fees: U256,
    pub liability_shares: U256,
    pub max_liability_shares: U256,
    pub slashing_reserve: U256,
    pub proof: Vec<B256>,
}

/// `NativeYieldReported` event fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YieldReport {
    pub yield_amount: U256,
    pub outstanding_negative_yield: U256,
    pub yield_provider: Address,
}

/// `WithdrawalReserveAugmented` event fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalEvent {
    pub reserve_increment_amount: U256,
    pub yield_provider: Address,
}

/// Liability settled against the vault during ossification progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiabilityPayment {
    pub vault: Address,
    pub shares_burned: U256,
    pub ether_paid: U256,
}

/// Lido protocol fees settled for the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LidoFeePayment {
    pub vault: Address,
    pub fees_paid: U256,
}

/// Per-provider state kept by the yield manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YieldProviderData {
    /// Dashboard contract (mutable control surface)
    pub primary_entrypoint: Address,
    /// Staking vault contract
    pub ossified_entrypoint: Address,
    pub is_staking_paused: bool,
    pub is_ossification_initiated: bool,
    pub is_ossified: bool,
    pub user_funds: U256,
    pub yield_reported_cumulative: U256,
    pub lst_liability_principal: U256,
    pub last_reported_negative_yield: U256,
}

/// Partial withdrawal requests for a set of validators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawalRequests {
    pub pubkeys: Vec<Bytes>,
    /// Per-validator amount in gwei
    pub amounts_gwei: Vec<u64>,
}

impl WithdrawalRequests {
    pub fn push(&mut self, pubkey: Bytes, amount_gwei: u64) {
        self.pubkeys.push(pubkey);
        self.amounts_gwei.push(amount_gwei);
    }

    pub fn len(&self) -> usize {
        self.pubkeys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pubkeys.is_empty()
    }
}

/// Mined transaction as seen by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

impl TxReceipt {
    /// Logs emitted by `emitter` only.
    pub fn logs_from(&self, emitter: Address) -> impl Iterator<Item = &Log> {
        self.logs.iter().filter(move |log| log.address == emitter)
    }
}

impl From<&TransactionReceipt> for TxReceipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        }
    }
}
