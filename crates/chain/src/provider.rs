//! Read provider shared by the contract clients.

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, RootProvider};
use anyhow::{Context, Result};
use tracing::info;

/// Shared HTTP provider for contract reads.
#[derive(Clone, Debug)]
pub struct ProviderManager {
    provider: RootProvider,
}

impl ProviderManager {
    /// Connect and verify the endpoint answers.
    pub async fn new(rpc_url: &str) -> Result<Self> {
        let provider = RootProvider::new_http(rpc_url.parse().context("invalid L1 RPC URL")?);
        let block = provider.get_block_number().await?;
        info!(rpc = rpc_url, block = block, "Provider connection verified");

        Ok(Self { provider })
    }

    pub fn provider(&self) -> &RootProvider {
        &self.provider
    }

    /// Native ETH balance of `address`.
    pub async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_provider_creation() {
        let provider = ProviderManager::new("http://localhost:8545").await;
        assert!(provider.is_ok());
    }
}
