//! LazyOracle contract client.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::bindings::ILazyOracle;
use crate::clients::LazyOracle;
use crate::event_listener::ReportWatcher;
use crate::provider::ProviderManager;
use crate::signer::TransactionSender;
use crate::types::{TxReceipt, VaultReport, VaultReportParams};
use crate::watch::ReportWatch;

/// Alloy-backed [`LazyOracle`].
#[derive(Debug)]
pub struct LazyOracleContractClient {
    address: Address,
    provider: ProviderManager,
    sender: Arc<TransactionSender>,
    watcher: ReportWatcher,
}

impl LazyOracleContractClient {
    pub fn new(
        address: Address,
        provider: ProviderManager,
        sender: Arc<TransactionSender>,
        watcher: ReportWatcher,
    ) -> Self {
        Self {
            address,
            provider,
            sender,
            watcher,
        }
    }
}

fn update_vault_data_call(params: &VaultReportParams) -> ILazyOracle::updateVaultDataCall {
    ILazyOracle::updateVaultDataCall {
        vault: params.vault,
        totalValue: params.total_value,
        cumulativeLidoFees: params.cumulative_lido_fees,
        liabilityShares: params.liability_shares,
        maxLiabilityShares: params.max_liability_shares,
        slashingReserve: params.slashing_reserve,
        proof: params.proof.clone(),
    }
}

#[async_trait]
impl LazyOracle for LazyOracleContractClient {
    async fn wait_for_vaults_report_data_updated_event(&self) -> Result<ReportWatch> {
        Ok(self.watcher.watch())
    }

    async fn latest_report_data(&self) -> Result<VaultReport> {
        let data = ILazyOracle::new(self.address, self.provider.provider())
            .latestReportData()
            .call()
            .await?;
        Ok(VaultReport {
            timestamp: data.timestamp.try_into().context("report timestamp overflow")?,
            ref_slot: data.refSlot.try_into().context("report refSlot overflow")?,
            tree_root: data.treeRoot,
            report_cid: data.reportCid,
        })
    }

    async fn update_vault_data(&self, params: &VaultReportParams) -> Result<TxReceipt> {
        info!(
            vault = %params.vault,
            total_value = %params.total_value,
            proof_len = params.proof.len(),
            "Submitting vault report"
        );
        let calldata = Bytes::from(update_vault_data_call(params).abi_encode());
        self.sender
            .send_transaction(self.address, calldata, U256::ZERO)
            .await
    }

    async fn simulate_update_vault_data(&self, params: &VaultReportParams) -> Result<()> {
        let calldata = Bytes::from(update_vault_data_call(params).abi_encode());
        self.sender
            .simulate(self.address, calldata, U256::ZERO)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    #[test]
    fn test_update_vault_data_call_carries_proof() {
        let params = VaultReportParams {
            vault: Address::repeat_byte(0x11),
            total_value: U256::from(100u64),
            cumulative_lido_fees: U256::from(3u64),
            liability_shares: U256::from(40u64),
            max_liability_shares: U256::from(50u64),
            slashing_reserve: U256::ZERO,
            proof: vec![B256::repeat_byte(0x01), B256::repeat_byte(0x02)],
        };
        let call = update_vault_data_call(&params);
        assert_eq!(call.vault, params.vault);
        assert_eq!(call.proof.len(), 2);

        let decoded =
            ILazyOracle::updateVaultDataCall::abi_decode(&call.abi_encode(), true).unwrap();
        assert_eq!(decoded.maxLiabilityShares, U256::from(50u64));
    }
}
