//! Lido vault accounting reports.
//!
//! The LazyOracle publishes a merkle root and the IPFS CID of the full
//! per-vault tree. Submitting a vault's report means proving its leaf against
//! that root via `updateVaultData`.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use native_yield_chain::{AccountingReportClient, LazyOracle, TxReceipt, VaultReportParams};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::sources::ReportTreeSource;

#[derive(Debug)]
pub struct LidoAccountingReportService {
    lazy_oracle: Arc<dyn LazyOracle>,
    ipfs: Arc<dyn ReportTreeSource>,
    /// Params keyed by (vault, report CID); only the current CID is kept
    cache: DashMap<(Address, String), VaultReportParams>,
}

impl LidoAccountingReportService {
    pub fn new(lazy_oracle: Arc<dyn LazyOracle>, ipfs: Arc<dyn ReportTreeSource>) -> Self {
        Self {
            lazy_oracle,
            ipfs,
            cache: DashMap::new(),
        }
    }
}

#[async_trait]
impl AccountingReportClient for LidoAccountingReportService {
    #[instrument(skip(self))]
    async fn get_latest_submit_vault_report_params(
        &self,
        vault: Address,
    ) -> Result<VaultReportParams> {
        let report = self.lazy_oracle.latest_report_data().await?;
        let key = (vault, report.report_cid.clone());
        if let Some(params) = self.cache.get(&key) {
            debug!(vault = %vault, cid = %report.report_cid, "Using cached report params");
            return Ok(params.clone());
        }

        let tree = self
            .ipfs
            .fetch_report_tree(&report.report_cid)
            .await
            .with_context(|| format!("failed to fetch report tree {}", report.report_cid))?;

        if tree.root() != Some(report.tree_root) {
            anyhow::bail!(
                "report tree {} root does not match on-chain root {}",
                report.report_cid,
                report.tree_root
            );
        }

        let leaf = tree
            .find_vault(vault)?
            .with_context(|| format!("vault {vault} not found in report {}", report.report_cid))?;
        let proof = tree.proof(leaf.tree_index)?;

        let params = VaultReportParams {
            vault,
            total_value: leaf.total_value,
            cumulative_lido_fees: leaf.cumulative_lido_fees,
            liability_shares: leaf.liability_shares,
            max_liability_shares: leaf.max_liability_shares,
            slashing_reserve: leaf.slashing_reserve,
            proof,
        };

        self.cache.retain(|(_, cid), _| cid == &report.report_cid);
        self.cache.insert(key, params.clone());

        info!(
            vault = %vault,
            ref_slot = report.ref_slot,
            published_at = %report.published_at(),
            total_value = %params.total_value,
            "Built vault report params"
        );
        Ok(params)
    }

    async fn is_simulate_submit_latest_vault_report_successful(&self, vault: Address) -> bool {
        let params = match self.get_latest_submit_vault_report_params(vault).await {
            Ok(params) => params,
            Err(e) => {
                warn!(vault = %vault, error = %format!("{e:#}"), "Cannot build vault report params");
                return false;
            }
        };
        match self.lazy_oracle.simulate_update_vault_data(&params).await {
            Ok(()) => true,
            Err(e) => {
                warn!(vault = %vault, error = %format!("{e:#}"), "updateVaultData simulation failed");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn submit_latest_vault_report(&self, vault: Address) -> Result<TxReceipt> {
        let params = self.get_latest_submit_vault_report_params(vault).await?;
        let receipt = self.lazy_oracle.update_vault_data(&params).await?;
        info!(vault = %vault, tx_hash = %receipt.tx_hash, "Vault report submitted");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_report_tree, FakeLazyOracle, FakeReportTreeSource};
    use alloy::primitives::U256;

    fn service() -> (
        LidoAccountingReportService,
        Arc<FakeLazyOracle>,
        Arc<FakeReportTreeSource>,
        Address,
    ) {
        let (tree, vault) = sample_report_tree();
        let oracle = Arc::new(FakeLazyOracle::default());
        oracle.set_latest_report("cid-1", tree.root().unwrap());
        let ipfs = Arc::new(FakeReportTreeSource::new(tree));
        let service = LidoAccountingReportService::new(oracle.clone(), ipfs.clone());
        (service, oracle, ipfs, vault)
    }

    #[tokio::test]
    async fn test_builds_params_with_valid_proof() {
        let (service, _, _, vault) = service();
        let params = service.get_latest_submit_vault_report_params(vault).await.unwrap();

        assert_eq!(params.vault, vault);
        assert_eq!(params.total_value, U256::from(32_000_000_000_000_000_000u128));
        assert_eq!(params.proof.len(), 2);
    }

    #[tokio::test]
    async fn test_simulate_then_submit_downloads_once() {
        let (service, oracle, ipfs, vault) = service();

        assert!(service.is_simulate_submit_latest_vault_report_successful(vault).await);
        service.submit_latest_vault_report(vault).await.unwrap();

        assert_eq!(ipfs.fetch_count(), 1);
        assert_eq!(oracle.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_vault_fails_simulation() {
        let (service, _, _, _) = service();
        assert!(
            !service
                .is_simulate_submit_latest_vault_report_successful(Address::repeat_byte(0x99))
                .await
        );
    }

    #[tokio::test]
    async fn test_root_mismatch_is_rejected() {
        let (service, oracle, _, vault) = service();
        oracle.set_latest_report("cid-2", alloy::primitives::B256::repeat_byte(0xff));
        let err = service
            .get_latest_submit_vault_report_params(vault)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("root does not match"));
    }

    #[tokio::test]
    async fn test_simulation_revert_is_false() {
        let (service, oracle, _, vault) = service();
        oracle.fail_simulation();
        assert!(!service.is_simulate_submit_latest_vault_report_successful(vault).await);
    }
}
