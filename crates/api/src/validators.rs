//! Validator records and the join with the beacon pending-withdrawal queue.
//!
//! All amounts here are in gwei, as returned by both the staking API and the
//! beacon node.

use alloy::primitives::Bytes;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Balance a compounding (0x02) validator must keep, in gwei.
pub const MIN_VALIDATOR_BALANCE_GWEI: u64 = 32_000_000_000;

/// Epochs a validator must be active before it may request withdrawals.
pub const SHARD_COMMITTEE_PERIOD: u64 = 256;

/// Accepts a JSON number or a decimal string. GraphQL and the beacon API
/// both serialise 64-bit integers as strings.
pub(crate) fn u64_from_str_or_num<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Active validator as reported by the staking API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorBalance {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub balance: u64,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub effective_balance: u64,
    pub public_key: Bytes,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub validator_index: u64,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub activation_epoch: u64,
}

/// Entry of the beacon state's `pending_partial_withdrawals` queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PendingPartialWithdrawal {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub validator_index: u64,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub amount: u64,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub withdrawable_epoch: u64,
}

/// Validator joined with its queued partial withdrawals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorWithdrawable {
    pub public_key: Bytes,
    pub validator_index: u64,
    pub balance: u64,
    pub activation_epoch: u64,
    /// Sum of queued partial withdrawals
    pub pending_withdrawal_amount: u64,
    /// `balance - pending - 32 ETH`, floored at zero
    pub withdrawable_amount: u64,
}

/// Join validators with the pending queue, summing duplicate entries.
///
/// Queue entries for validators outside `validators` are ignored.
pub fn join_validators_with_pending_withdrawals(
    validators: &[ValidatorBalance],
    pending: &[PendingPartialWithdrawal],
) -> Vec<ValidatorWithdrawable> {
    let mut pending_by_index: HashMap<u64, u64> = HashMap::with_capacity(pending.len());
    for w in pending {
        let entry = pending_by_index.entry(w.validator_index).or_insert(0);
        *entry = entry.saturating_add(w.amount);
    }

    validators
        .iter()
        .map(|v| {
            let pending_amount = pending_by_index.get(&v.validator_index).copied().unwrap_or(0);
            ValidatorWithdrawable {
                public_key: v.public_key.clone(),
                validator_index: v.validator_index,
                balance: v.balance,
                activation_epoch: v.activation_epoch,
                pending_withdrawal_amount: pending_amount,
                withdrawable_amount: v
                    .balance
                    .saturating_sub(pending_amount)
                    .saturating_sub(MIN_VALIDATOR_BALANCE_GWEI),
            }
        })
        .collect()
}

/// Keep validators active for at least [`SHARD_COMMITTEE_PERIOD`] epochs.
pub fn filter_withdrawal_eligible(
    validators: Vec<ValidatorWithdrawable>,
    current_epoch: u64,
) -> Vec<ValidatorWithdrawable> {
    validators
        .into_iter()
        .filter(|v| v.activation_epoch.saturating_add(SHARD_COMMITTEE_PERIOD) <= current_epoch)
        .collect()
}

pub fn total_pending_withdrawals_gwei(validators: &[ValidatorWithdrawable]) -> u64 {
    validators
        .iter()
        .fold(0u64, |acc, v| acc.saturating_add(v.pending_withdrawal_amount))
}

/// `None` for an empty set, so an outage is not exported as a zero balance.
pub fn total_validator_balance_gwei(validators: &[ValidatorBalance]) -> Option<u64> {
    if validators.is_empty() {
        return None;
    }
    Some(validators.iter().fold(0u64, |acc, v| acc.saturating_add(v.balance)))
}
