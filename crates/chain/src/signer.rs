//! Transaction signer and sender for contract-mutating calls.
//!
//! Every send estimates gas first so that reverts surface before broadcast,
//! then waits for the receipt and fails on a reverted status.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::clients::GasErrorReporter;
use crate::types::TxReceipt;

/// Cached nonce manager for sequential transaction submission.
pub struct NonceManager {
    /// Next nonce to hand out
    current: AtomicU64,
    /// Last nonce confirmed against the chain
    last_synced: AtomicU64,
}

impl NonceManager {
    pub fn new(initial_nonce: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_nonce),
            last_synced: AtomicU64::new(initial_nonce),
        }
    }

    /// Get next nonce and increment counter.
    #[inline]
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst)
    }

    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Force the counter back to the chain value (after a failed send).
    pub fn reset(&self, chain_nonce: u64) {
        self.current.store(chain_nonce, Ordering::SeqCst);
        self.last_synced.store(chain_nonce, Ordering::SeqCst);
    }

    pub fn last_synced(&self) -> u64 {
        self.last_synced.load(Ordering::SeqCst)
    }
}

/// Signs and sends transactions from the automation account.
pub struct TransactionSender {
    /// RPC URL for sending transactions
    rpc_url: String,
    wallet: EthereumWallet,
    /// Signer address
    pub address: Address,
    chain_id: u64,
    nonce_manager: NonceManager,
    gas_error_reporter: Option<Arc<dyn GasErrorReporter>>,
}

/// Builder for [`TransactionSender`].
pub struct TransactionSenderBuilder {
    rpc_url: String,
    chain_id: u64,
    gas_error_reporter: Option<Arc<dyn GasErrorReporter>>,
}

impl TransactionSenderBuilder {
    pub fn new(rpc_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id,
            gas_error_reporter: None,
        }
    }

    /// Report gas-estimation failures to `reporter`.
    pub fn gas_error_reporter(mut self, reporter: Arc<dyn GasErrorReporter>) -> Self {
        self.gas_error_reporter = Some(reporter);
        self
    }

    pub async fn build(self, private_key: &str) -> Result<TransactionSender> {
        let key_str = private_key.trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str.parse().context("invalid private key")?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let initial_nonce = provider.get_transaction_count(address).await?;

        info!(
            address = %address,
            chain_id = self.chain_id,
            initial_nonce = initial_nonce,
            "Transaction sender initialized"
        );

        Ok(TransactionSender {
            rpc_url: self.rpc_url,
            wallet,
            address,
            chain_id: self.chain_id,
            nonce_manager: NonceManager::new(initial_nonce),
            gas_error_reporter: self.gas_error_reporter,
        })
    }
}

impl TransactionSender {
    pub async fn new(private_key: &str, rpc_url: &str, chain_id: u64) -> Result<Self> {
        TransactionSenderBuilder::new(rpc_url, chain_id)
            .build(private_key)
            .await
    }

    fn request(&self, to: Address, calldata: Bytes, value: U256) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_input(calldata)
            .with_value(value)
            .with_chain_id(self.chain_id)
    }

    /// `eth_call` the transaction from the automation account.
    pub async fn simulate(&self, to: Address, calldata: Bytes, value: U256) -> Result<Bytes> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let output = provider.call(self.request(to, calldata, value)).await?;
        Ok(output)
    }

    /// Estimate, sign, send and wait for the receipt.
    pub async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
        value: U256,
    ) -> Result<TxReceipt> {
        let total_start = Instant::now();
        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.parse()?);

        let tx = self.request(to, calldata, value);
        let gas_limit = match provider.estimate_gas(tx.clone()).await {
            Ok(gas) => gas,
            Err(e) => {
                let revert_data = e
                    .as_error_resp()
                    .and_then(|payload| payload.as_revert_data())
                    .map(|data| data.to_string())
                    .unwrap_or_default();
                if let Some(reporter) = &self.gas_error_reporter {
                    reporter.report_estimate_gas_error(to, &revert_data, None);
                }
                warn!(to = %to, revert_data = %revert_data, error = %e, "Gas estimation failed");
                return Err(anyhow::Error::new(e).context(format!("estimateGas failed for {to}")));
            }
        };

        let nonce = self.nonce_manager.next();
        let tx = tx.with_nonce(nonce).with_gas_limit(gas_limit);

        debug!(to = %to, nonce = nonce, gas_limit = gas_limit, "Sending transaction");

        let pending = match provider.send_transaction(tx).await {
            Ok(pending) => pending,
            Err(e) => {
                self.sync_nonce().await;
                return Err(anyhow::Error::new(e).context(format!("broadcast failed for {to}")));
            }
        };
        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, to = %to, "Transaction submitted, waiting for confirmation");

        let receipt = pending.get_receipt().await?;
        let total_elapsed = total_start.elapsed();

        if receipt.status() {
            info!(
                tx_hash = %tx_hash,
                block = receipt.block_number.unwrap_or(0),
                gas_used = receipt.gas_used,
                total_ms = total_elapsed.as_millis(),
                "Transaction confirmed"
            );
            Ok(TxReceipt::from(&receipt))
        } else {
            warn!(tx_hash = %tx_hash, total_ms = total_elapsed.as_millis(), "Transaction reverted, syncing nonce");
            self.sync_nonce().await;
            anyhow::bail!("Transaction reverted: {:?}", tx_hash)
        }
    }

    /// Resync the cached nonce from chain.
    pub async fn sync_nonce(&self) {
        let url = match self.rpc_url.parse() {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid RPC URL, nonce not synced");
                return;
            }
        };
        let provider = ProviderBuilder::new().on_http(url);
        match provider.get_transaction_count(self.address).await {
            Ok(chain_nonce) => {
                self.nonce_manager.reset(chain_nonce);
                debug!(nonce = chain_nonce, "Nonce synced from chain");
            }
            Err(e) => {
                warn!(error = %e, "Failed to sync nonce from chain");
            }
        }
    }
}

impl std::fmt::Debug for TransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSender")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .finish_non_exhaustive()
    }
}
