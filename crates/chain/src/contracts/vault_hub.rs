//! VaultHub contract client.

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolEvent;
use anyhow::Result;
use async_trait::async_trait;

use super::bindings::IVaultHub;
use crate::clients::VaultHub;
use crate::provider::ProviderManager;
use crate::types::{LiabilityPayment, LidoFeePayment, TxReceipt};

/// Alloy-backed [`VaultHub`].
#[derive(Debug, Clone)]
pub struct VaultHubContractClient {
    address: Address,
    provider: ProviderManager,
}

impl VaultHubContractClient {
    pub fn new(address: Address, provider: ProviderManager) -> Self {
        Self { address, provider }
    }
}

#[async_trait]
impl VaultHub for VaultHubContractClient {
    async fn is_report_fresh(&self, vault: Address) -> Result<bool> {
        let hub = IVaultHub::new(self.address, self.provider.provider());
        Ok(hub.isReportFresh(vault).call().await?._0)
    }

    async fn is_vault_connected(&self, vault: Address) -> Result<bool> {
        let hub = IVaultHub::new(self.address, self.provider.provider());
        Ok(hub.isVaultConnected(vault).call().await?._0)
    }

    async fn settleable_lido_fees_value(&self, vault: Address) -> Result<U256> {
        let hub = IVaultHub::new(self.address, self.provider.provider());
        Ok(hub.settleableLidoFeesValue(vault).call().await?._0)
    }

    async fn latest_vault_report_timestamp(&self, vault: Address) -> Result<u64> {
        let hub = IVaultHub::new(self.address, self.provider.provider());
        let report = hub.latestReport(vault).call().await?._0;
        Ok(report.timestamp.to::<u64>())
    }

    fn get_liability_payment_from_tx_receipt(
        &self,
        receipt: &TxReceipt,
    ) -> Option<LiabilityPayment> {
        decode_liability_payment(self.address, receipt)
    }

    fn get_lido_fee_payment_from_tx_receipt(&self, receipt: &TxReceipt) -> Option<LidoFeePayment> {
        decode_lido_fee_payment(self.address, receipt)
    }
}

/// `VaultRebalanced` emitted by `vault_hub` within the receipt.
pub fn decode_liability_payment(vault_hub: Address, receipt: &TxReceipt) -> Option<LiabilityPayment> {
    receipt.logs_from(vault_hub).find_map(|log| {
        IVaultHub::VaultRebalanced::decode_log_data(&log.data, true)
            .ok()
            .map(|event| LiabilityPayment {
                vault: event.vault,
                shares_burned: event.sharesBurned,
                ether_paid: event.etherWithdrawn,
            })
    })
}

/// `LidoFeesSettled` emitted by `vault_hub` within the receipt.
pub fn decode_lido_fee_payment(vault_hub: Address, receipt: &TxReceipt) -> Option<LidoFeePayment> {
    receipt.logs_from(vault_hub).find_map(|log| {
        IVaultHub::LidoFeesSettled::decode_log_data(&log.data, true)
            .ok()
            .map(|event| LidoFeePayment {
                vault: event.vault,
                fees_paid: event.transferred,
            })
    })
}
