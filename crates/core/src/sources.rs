//! Off-chain data sources consumed by the engine services.
//!
//! Thin seams over the `native-yield-api` HTTP clients so the services can be
//! driven by fakes.

use anyhow::Result;
use async_trait::async_trait;
use native_yield_api::{
    BeaconNodeClient, IpfsClient, PendingPartialWithdrawal, ReportTree, StakingApiClient,
    ValidatorBalance,
};
use std::fmt::Debug;

/// Report merkle trees by IPFS CID.
#[async_trait]
pub trait ReportTreeSource: Send + Sync + Debug {
    async fn fetch_report_tree(&self, cid: &str) -> Result<ReportTree>;
}

/// Active validators of the staking vault.
#[async_trait]
pub trait ValidatorSource: Send + Sync + Debug {
    async fn get_active_validators(&self) -> Result<Vec<ValidatorBalance>>;
}

/// Beacon state reads.
#[async_trait]
pub trait BeaconStateSource: Send + Sync + Debug {
    async fn get_pending_partial_withdrawals(&self) -> Result<Vec<PendingPartialWithdrawal>>;

    async fn get_current_epoch(&self) -> Result<u64>;
}

#[async_trait]
impl ReportTreeSource for IpfsClient {
    async fn fetch_report_tree(&self, cid: &str) -> Result<ReportTree> {
        IpfsClient::fetch_report_tree(self, cid).await
    }
}

#[async_trait]
impl ValidatorSource for StakingApiClient {
    async fn get_active_validators(&self) -> Result<Vec<ValidatorBalance>> {
        StakingApiClient::get_active_validators(self).await
    }
}

#[async_trait]
impl BeaconStateSource for BeaconNodeClient {
    async fn get_pending_partial_withdrawals(&self) -> Result<Vec<PendingPartialWithdrawal>> {
        BeaconNodeClient::get_pending_partial_withdrawals(self).await
    }

    async fn get_current_epoch(&self) -> Result<u64> {
        BeaconNodeClient::get_current_epoch(self).await
    }
}
