//! Receipt decoding for Lido dashboards.

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolEvent;

use super::bindings::IDashboard;
use crate::clients::Dashboard;
use crate::types::TxReceipt;

/// Stateless: the dashboard address is supplied per receipt.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardContractClient;

impl Dashboard for DashboardContractClient {
    fn get_node_operator_fee_paid_from_tx_receipt(
        &self,
        dashboard: Address,
        receipt: &TxReceipt,
    ) -> Option<U256> {
        receipt.logs_from(dashboard).find_map(|log| {
            IDashboard::NodeOperatorFeeDisbursed::decode_log_data(&log.data, true)
                .ok()
                .map(|event| event.fee)
        })
    }
}
