//! Rollup yield extension client.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::bindings::ILineaRollupYieldExtension;
use crate::clients::RollupYieldExtension;
use crate::signer::TransactionSender;
use crate::types::TxReceipt;

#[derive(Debug)]
pub struct RollupYieldExtensionClient {
    address: Address,
    sender: Arc<TransactionSender>,
}

impl RollupYieldExtensionClient {
    pub fn new(address: Address, sender: Arc<TransactionSender>) -> Self {
        Self { address, sender }
    }
}

#[async_trait]
impl RollupYieldExtension for RollupYieldExtensionClient {
    async fn transfer_funds_for_native_yield(&self, amount: U256) -> Result<TxReceipt> {
        let call = ILineaRollupYieldExtension::transferFundsForNativeYieldCall { amount };
        info!(rollup = %self.address, amount = %amount, "Transferring reserve surplus to yield manager");
        self.sender
            .send_transaction(self.address, Bytes::from(call.abi_encode()), U256::ZERO)
            .await
    }
}
