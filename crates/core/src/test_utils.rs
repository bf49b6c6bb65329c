//! Recording fakes for the client traits.
//!
//! Fakes built by [`Harness`] share one [`CallLog`], so tests can assert the
//! order of calls across clients.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use native_yield_api::{
    process_proof, PendingPartialWithdrawal, ReportTree, ReportTreeValue, ValidatorBalance,
};
use native_yield_chain::{
    AccountingReportClient, BeaconStakingClient, Dashboard, LazyOracle, LiabilityPayment,
    LidoFeePayment, RebalanceRequirement, ReportEvent, ReportWatch, RollupYieldExtension,
    SubscriptionHandle, TxReceipt, VaultHub, VaultReport, VaultReportParams, WithdrawalEvent,
    WithdrawalRequests, YieldManager, YieldProviderData, YieldReport,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};

use crate::metrics::{
    MetricsService, NativeYieldMetric, NativeYieldMetricsUpdater, OperationModeMetricsRecorder,
};
use crate::mode::OperationMode;
use crate::processors::{OperationModeProcessor, ProcessorDeps, ProcessorSettings};
use crate::sources::{BeaconStateSource, ReportTreeSource, ValidatorSource};

// ---------------------------------------------------------------------------
// Call log and metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: &str) {
        self.0.lock().push(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.0.lock().iter().position(|c| c == call)
    }

    /// Calls restricted to `names`, in order.
    pub fn calls_matching(&self, names: &[&str]) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter(|c| names.contains(&c.as_str()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct MetricCall {
    pub metric: NativeYieldMetric,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl MetricCall {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
pub struct RecordingMetrics {
    calls: Mutex<Vec<MetricCall>>,
}

impl RecordingMetrics {
    fn push(&self, metric: NativeYieldMetric, labels: &[(&str, &str)], value: f64) {
        self.calls.lock().push(MetricCall {
            metric,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        });
    }

    pub fn calls(&self) -> Vec<MetricCall> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, metric: NativeYieldMetric) -> Vec<MetricCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.metric == metric)
            .cloned()
            .collect()
    }

    pub fn count(&self, metric: NativeYieldMetric) -> usize {
        self.calls_for(metric).len()
    }
}

impl MetricsService for RecordingMetrics {
    fn increment_counter(&self, metric: NativeYieldMetric, labels: &[(&str, &str)], amount: f64) {
        self.push(metric, labels, amount);
    }

    fn set_gauge(&self, metric: NativeYieldMetric, labels: &[(&str, &str)], value: f64) {
        self.push(metric, labels, value);
    }

    fn add_value_to_histogram(&self, metric: NativeYieldMetric, value: f64, labels: &[(&str, &str)]) {
        self.push(metric, labels, value);
    }
}

fn receipt() -> TxReceipt {
    TxReceipt {
        tx_hash: B256::repeat_byte(0x77),
        block_number: Some(1),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Contract fakes
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct YieldManagerState {
    /// Scripted requirement reads; the last one repeats
    requirements: VecDeque<RebalanceRequirement>,
    last_requirement: RebalanceRequirement,
    fail_requirements: bool,
    ossified: bool,
    ossification_initiated: bool,
    mode_read_failures: usize,
    fail_progress: bool,
    fail_reserve_top_up: bool,
    yield_report: Option<YieldReport>,
    withdrawal_event: Option<WithdrawalEvent>,
    unstake_requests: Vec<WithdrawalRequests>,
    /// Providers passed to `safe_max_add_to_withdrawal_reserve`
    max_top_ups: Vec<Address>,
}

#[derive(Debug)]
pub struct FakeYieldManager {
    log: CallLog,
    state: Mutex<YieldManagerState>,
}

impl Default for FakeYieldManager {
    fn default() -> Self {
        Self::with_log(CallLog::default())
    }
}

impl FakeYieldManager {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            state: Mutex::new(YieldManagerState {
                requirements: VecDeque::new(),
                last_requirement: RebalanceRequirement::none(),
                fail_requirements: false,
                ossified: false,
                ossification_initiated: false,
                mode_read_failures: 0,
                fail_progress: false,
                fail_reserve_top_up: false,
                yield_report: None,
                withdrawal_event: None,
                unstake_requests: Vec::new(),
                max_top_ups: Vec::new(),
            }),
        }
    }

    pub fn vault(&self) -> Address {
        Address::repeat_byte(0xaa)
    }

    pub fn dashboard(&self) -> Address {
        Address::repeat_byte(0xdb)
    }

    pub fn script_requirements(&self, requirements: Vec<RebalanceRequirement>) {
        self.state.lock().requirements = requirements.into();
    }

    pub fn fail_requirements(&self) {
        self.state.lock().fail_requirements = true;
    }

    pub fn set_ossified(&self, value: bool) {
        self.state.lock().ossified = value;
    }

    pub fn set_ossification_initiated(&self, value: bool) {
        self.state.lock().ossification_initiated = value;
    }

    /// Fail the next `n` `is_ossified` reads.
    pub fn fail_mode_reads(&self, n: usize) {
        self.state.lock().mode_read_failures = n;
    }

    pub fn fail_progress(&self) {
        self.state.lock().fail_progress = true;
    }

    pub fn fail_reserve_top_up(&self) {
        self.state.lock().fail_reserve_top_up = true;
    }

    pub fn set_yield_report(&self, report: Option<YieldReport>) {
        self.state.lock().yield_report = report;
    }

    pub fn set_withdrawal_event(&self, event: Option<WithdrawalEvent>) {
        self.state.lock().withdrawal_event = event;
    }

    pub fn unstake_requests(&self) -> Vec<WithdrawalRequests> {
        self.state.lock().unstake_requests.clone()
    }

    pub fn max_top_ups(&self) -> Vec<Address> {
        self.state.lock().max_top_ups.clone()
    }
}

#[async_trait]
impl YieldManager for FakeYieldManager {
    fn address(&self) -> Address {
        Address::repeat_byte(0x99)
    }

    async fn get_rebalance_requirements(&self) -> Result<RebalanceRequirement> {
        self.log.record("get_rebalance_requirements");
        let mut state = self.state.lock();
        if state.fail_requirements {
            anyhow::bail!("requirement read failed");
        }
        if let Some(next) = state.requirements.pop_front() {
            state.last_requirement = next;
        }
        Ok(state.last_requirement)
    }

    async fn fund_yield_provider(&self, _provider: Address, _amount: U256) -> Result<TxReceipt> {
        self.log.record("fund_yield_provider");
        Ok(receipt())
    }

    async fn safe_add_to_withdrawal_reserve_if_above_threshold(
        &self,
        _provider: Address,
        _amount: U256,
    ) -> Result<Option<TxReceipt>> {
        self.log
            .record("safe_add_to_withdrawal_reserve_if_above_threshold");
        Ok(Some(receipt()))
    }

    async fn safe_max_add_to_withdrawal_reserve(
        &self,
        provider: Address,
    ) -> Result<Option<TxReceipt>> {
        self.log.record("safe_max_add_to_withdrawal_reserve");
        let mut state = self.state.lock();
        state.max_top_ups.push(provider);
        if state.fail_reserve_top_up {
            anyhow::bail!("reserve top-up reverted");
        }
        Ok(Some(receipt()))
    }

    async fn pause_staking_if_not_already(&self, _provider: Address) -> Result<Option<TxReceipt>> {
        self.log.record("pause_staking_if_not_already");
        Ok(Some(receipt()))
    }

    async fn unpause_staking_if_not_already(
        &self,
        _provider: Address,
    ) -> Result<Option<TxReceipt>> {
        self.log.record("unpause_staking_if_not_already");
        Ok(Some(receipt()))
    }

    async fn report_yield(&self, _provider: Address, _l2_recipient: Address) -> Result<TxReceipt> {
        self.log.record("report_yield");
        Ok(receipt())
    }

    async fn peek_yield_report(
        &self,
        provider: Address,
        _l2_recipient: Address,
    ) -> Result<YieldReport> {
        self.log.record("peek_yield_report");
        Ok(YieldReport {
            yield_amount: U256::from(5_000_000_000u64),
            outstanding_negative_yield: U256::ZERO,
            yield_provider: provider,
        })
    }

    async fn progress_pending_ossification(&self, _provider: Address) -> Result<TxReceipt> {
        self.log.record("progress_pending_ossification");
        if self.state.lock().fail_progress {
            anyhow::bail!("progressPendingOssification reverted");
        }
        Ok(receipt())
    }

    async fn unstake(&self, _provider: Address, requests: &WithdrawalRequests) -> Result<TxReceipt> {
        self.log.record("unstake");
        self.state.lock().unstake_requests.push(requests.clone());
        Ok(receipt())
    }

    async fn is_ossified(&self, _provider: Address) -> Result<bool> {
        self.log.record("is_ossified");
        let mut state = self.state.lock();
        if state.mode_read_failures > 0 {
            state.mode_read_failures -= 1;
            anyhow::bail!("isOssified read failed");
        }
        Ok(state.ossified)
    }

    async fn is_ossification_initiated(&self, _provider: Address) -> Result<bool> {
        Ok(self.state.lock().ossification_initiated)
    }

    async fn get_yield_provider_data(&self, _provider: Address) -> Result<YieldProviderData> {
        Ok(YieldProviderData {
            primary_entrypoint: self.dashboard(),
            ossified_entrypoint: self.vault(),
            yield_reported_cumulative: U256::from(9_000_000_000u64),
            ..Default::default()
        })
    }

    async fn get_lido_staking_vault_address(&self, _provider: Address) -> Result<Address> {
        Ok(self.vault())
    }

    async fn get_lido_dashboard_address(&self, _provider: Address) -> Result<Address> {
        Ok(self.dashboard())
    }

    fn get_yield_report_from_tx_receipt(&self, _receipt: &TxReceipt) -> Option<YieldReport> {
        self.state.lock().yield_report
    }

    fn get_withdrawal_event_from_tx_receipt(&self, _receipt: &TxReceipt) -> Option<WithdrawalEvent> {
        self.state.lock().withdrawal_event
    }
}

#[derive(Debug, Default)]
struct LazyOracleState {
    deliver_after: Option<Duration>,
    close_immediately: bool,
    fail_subscribe: bool,
    fail_simulation: bool,
    /// Keeps pending watches open
    senders: Vec<oneshot::Sender<ReportEvent>>,
    latest: Option<VaultReport>,
    submitted: Vec<VaultReportParams>,
}

#[derive(Debug, Default)]
pub struct FakeLazyOracle {
    log: CallLog,
    state: Mutex<LazyOracleState>,
    unsubscribes: Arc<AtomicUsize>,
}

impl FakeLazyOracle {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn deliver_event_after(&self, delay: Duration) {
        self.state.lock().deliver_after = Some(delay);
    }

    pub fn close_watch_immediately(&self) {
        self.state.lock().close_immediately = true;
    }

    pub fn fail_subscribe(&self) {
        self.state.lock().fail_subscribe = true;
    }

    pub fn fail_simulation(&self) {
        self.state.lock().fail_simulation = true;
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn set_latest_report(&self, cid: &str, root: B256) {
        self.state.lock().latest = Some(VaultReport {
            timestamp: 1_700_000_000,
            ref_slot: 100,
            tree_root: root,
            report_cid: cid.to_string(),
        });
    }

    pub fn submitted(&self) -> Vec<VaultReportParams> {
        self.state.lock().submitted.clone()
    }

    fn event() -> ReportEvent {
        ReportEvent {
            tx_hash: B256::repeat_byte(0x01),
            report: VaultReport {
                timestamp: 1_700_000_000,
                ref_slot: 100,
                tree_root: B256::ZERO,
                report_cid: "cid".to_string(),
            },
        }
    }
}

#[async_trait]
impl LazyOracle for FakeLazyOracle {
    async fn wait_for_vaults_report_data_updated_event(&self) -> Result<ReportWatch> {
        self.log.record("wait_for_vaults_report_data_updated_event");
        let mut state = self.state.lock();
        if state.fail_subscribe {
            anyhow::bail!("subscription refused");
        }

        let (tx, rx) = oneshot::channel();
        let unsubscribes = self.unsubscribes.clone();
        let subscription = SubscriptionHandle::new(move || {
            unsubscribes.fetch_add(1, Ordering::SeqCst);
        });

        if state.close_immediately {
            drop(tx);
        } else if let Some(delay) = state.deliver_after {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Self::event());
            });
        } else {
            state.senders.push(tx);
        }

        Ok(ReportWatch {
            subscription,
            event: rx,
        })
    }

    async fn latest_report_data(&self) -> Result<VaultReport> {
        self.state
            .lock()
            .latest
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no report published"))
    }

    async fn update_vault_data(&self, params: &VaultReportParams) -> Result<TxReceipt> {
        self.log.record("update_vault_data");
        self.state.lock().submitted.push(params.clone());
        Ok(receipt())
    }

    async fn simulate_update_vault_data(&self, _params: &VaultReportParams) -> Result<()> {
        if self.state.lock().fail_simulation {
            anyhow::bail!("execution reverted");
        }
        Ok(())
    }
}

#[derive(Debug)]
struct VaultHubState {
    report_fresh: Result<bool, String>,
    connected: bool,
    liability_payment: Option<LiabilityPayment>,
    lido_fee_payment: Option<LidoFeePayment>,
}

#[derive(Debug)]
pub struct FakeVaultHub {
    log: CallLog,
    state: Mutex<VaultHubState>,
}

impl Default for FakeVaultHub {
    fn default() -> Self {
        Self::with_log(CallLog::default())
    }
}

impl FakeVaultHub {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            state: Mutex::new(VaultHubState {
                report_fresh: Ok(false),
                connected: true,
                liability_payment: None,
                lido_fee_payment: None,
            }),
        }
    }

    pub fn set_report_fresh(&self, fresh: Result<bool, String>) {
        self.state.lock().report_fresh = fresh;
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    pub fn set_liability_payment(&self, payment: Option<LiabilityPayment>) {
        self.state.lock().liability_payment = payment;
    }

    pub fn set_lido_fee_payment(&self, payment: Option<LidoFeePayment>) {
        self.state.lock().lido_fee_payment = payment;
    }
}

#[async_trait]
impl VaultHub for FakeVaultHub {
    async fn is_report_fresh(&self, _vault: Address) -> Result<bool> {
        self.log.record("is_report_fresh");
        self.state
            .lock()
            .report_fresh
            .clone()
            .map_err(anyhow::Error::msg)
    }

    async fn is_vault_connected(&self, _vault: Address) -> Result<bool> {
        Ok(self.state.lock().connected)
    }

    async fn settleable_lido_fees_value(&self, _vault: Address) -> Result<U256> {
        Ok(U256::from(1_000_000_000u64))
    }

    async fn latest_vault_report_timestamp(&self, _vault: Address) -> Result<u64> {
        Ok(1_700_000_000)
    }

    fn get_liability_payment_from_tx_receipt(&self, _receipt: &TxReceipt) -> Option<LiabilityPayment> {
        self.state.lock().liability_payment
    }

    fn get_lido_fee_payment_from_tx_receipt(&self, _receipt: &TxReceipt) -> Option<LidoFeePayment> {
        self.state.lock().lido_fee_payment
    }
}

#[derive(Debug, Default)]
pub struct FakeDashboard {
    fee: Mutex<Option<U256>>,
    queried: Mutex<Vec<Address>>,
}

impl FakeDashboard {
    pub fn set_fee(&self, fee: Option<U256>) {
        *self.fee.lock() = fee;
    }

    pub fn queried(&self) -> Vec<Address> {
        self.queried.lock().clone()
    }
}

impl Dashboard for FakeDashboard {
    fn get_node_operator_fee_paid_from_tx_receipt(
        &self,
        dashboard: Address,
        _receipt: &TxReceipt,
    ) -> Option<U256> {
        self.queried.lock().push(dashboard);
        *self.fee.lock()
    }
}

#[derive(Debug, Default)]
pub struct FakeRollup {
    log: CallLog,
    fail: AtomicBool,
}

impl FakeRollup {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_transfer(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RollupYieldExtension for FakeRollup {
    async fn transfer_funds_for_native_yield(&self, _amount: U256) -> Result<TxReceipt> {
        self.log.record("transfer_funds_for_native_yield");
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("transferFundsForNativeYield reverted");
        }
        Ok(receipt())
    }
}

// ---------------------------------------------------------------------------
// Service fakes
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeAccounting {
    log: CallLog,
    simulate_ok: AtomicBool,
    fail_submit: AtomicBool,
    submit_delay: Mutex<Option<Duration>>,
}

impl FakeAccounting {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            simulate_ok: AtomicBool::new(true),
            fail_submit: AtomicBool::new(false),
            submit_delay: Mutex::new(None),
        }
    }

    pub fn set_simulate_ok(&self, ok: bool) {
        self.simulate_ok.store(ok, Ordering::SeqCst);
    }

    pub fn fail_submit(&self) {
        self.fail_submit.store(true, Ordering::SeqCst);
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock() = Some(delay);
    }
}

#[async_trait]
impl AccountingReportClient for FakeAccounting {
    async fn get_latest_submit_vault_report_params(
        &self,
        vault: Address,
    ) -> Result<VaultReportParams> {
        Ok(VaultReportParams {
            vault,
            total_value: U256::ZERO,
            cumulative_lido_fees: U256::ZERO,
            liability_shares: U256::ZERO,
            max_liability_shares: U256::ZERO,
            slashing_reserve: U256::ZERO,
            proof: vec![],
        })
    }

    async fn is_simulate_submit_latest_vault_report_successful(&self, _vault: Address) -> bool {
        self.log
            .record("is_simulate_submit_latest_vault_report_successful");
        self.simulate_ok.load(Ordering::SeqCst)
    }

    async fn submit_latest_vault_report(&self, _vault: Address) -> Result<TxReceipt> {
        self.log.record("submit_latest_vault_report");
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_submit.load(Ordering::SeqCst) {
            anyhow::bail!("updateVaultData reverted");
        }
        Ok(receipt())
    }
}

#[derive(Debug)]
pub struct FakeBeaconStaking {
    log: CallLog,
    fail: AtomicBool,
}

impl FakeBeaconStaking {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BeaconStakingClient for FakeBeaconStaking {
    async fn submit_withdrawal_requests_to_fulfil_amount(
        &self,
        _amount: U256,
    ) -> Result<Option<TxReceipt>> {
        self.log.record("submit_withdrawal_requests_to_fulfil_amount");
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("withdrawal request reverted");
        }
        Ok(Some(receipt()))
    }

    async fn submit_max_available_withdrawal_requests(&self) -> Result<Option<TxReceipt>> {
        self.log.record("submit_max_available_withdrawal_requests");
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("withdrawal request reverted");
        }
        Ok(Some(receipt()))
    }
}

// ---------------------------------------------------------------------------
// Off-chain source fakes
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeReportTreeSource {
    tree: ReportTree,
    fetches: AtomicUsize,
}

impl FakeReportTreeSource {
    pub fn new(tree: ReportTree) -> Self {
        Self {
            tree,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportTreeSource for FakeReportTreeSource {
    async fn fetch_report_tree(&self, _cid: &str) -> Result<ReportTree> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.tree.clone())
    }
}

#[derive(Debug)]
pub struct FakeValidatorSource {
    validators: Vec<ValidatorBalance>,
    fail: AtomicBool,
}

impl FakeValidatorSource {
    pub fn new(validators: Vec<ValidatorBalance>) -> Self {
        Self {
            validators,
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ValidatorSource for FakeValidatorSource {
    async fn get_active_validators(&self) -> Result<Vec<ValidatorBalance>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("staking API unavailable");
        }
        Ok(self.validators.clone())
    }
}

#[derive(Debug)]
pub struct FakeBeaconState {
    pending: Vec<PendingPartialWithdrawal>,
    epoch: Option<u64>,
}

impl FakeBeaconState {
    pub fn new(pending: Vec<PendingPartialWithdrawal>, epoch: Option<u64>) -> Self {
        Self { pending, epoch }
    }
}

#[async_trait]
impl BeaconStateSource for FakeBeaconState {
    async fn get_pending_partial_withdrawals(&self) -> Result<Vec<PendingPartialWithdrawal>> {
        Ok(self.pending.clone())
    }

    async fn get_current_epoch(&self) -> Result<u64> {
        self.epoch
            .ok_or_else(|| anyhow::anyhow!("beacon head unavailable"))
    }
}

/// Validator with a pubkey derived from its index.
pub fn validator(index: u64, balance_gwei: u64, activation_epoch: u64) -> ValidatorBalance {
    ValidatorBalance {
        balance: balance_gwei,
        effective_balance: balance_gwei.min(2_048_000_000_000),
        public_key: Bytes::from(vec![index as u8; 48]),
        validator_index: index,
        activation_epoch,
    }
}

/// Four-leaf report tree holding one vault at leaf index 5.
pub fn sample_report_tree() -> (ReportTree, Address) {
    let leaves: Vec<B256> = (1u8..=4).map(|i| keccak256([i])).collect();
    let n1 = process_proof(leaves[0], &[leaves[1]]);
    let n2 = process_proof(leaves[2], &[leaves[3]]);
    let root = process_proof(n1, &[n2]);
    let vault = Address::repeat_byte(0x42);

    let tree = ReportTree {
        format: "standard-v1".to_string(),
        leaf_encoding: vec![],
        tree: vec![root, n1, n2, leaves[0], leaves[1], leaves[2], leaves[3]],
        values: vec![ReportTreeValue {
            value: vec![
                serde_json::json!(vault.to_string()),
                serde_json::json!("32000000000000000000"),
                serde_json::json!("5"),
                serde_json::json!("7"),
                serde_json::json!("9"),
                serde_json::json!("0"),
            ],
            tree_index: 5,
        }],
    };
    (tree, vault)
}

// ---------------------------------------------------------------------------
// Processor fakes and harness
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeProcessor {
    mode: OperationMode,
    runs: AtomicUsize,
    fail_next: AtomicBool,
}

impl FakeProcessor {
    pub fn new(mode: OperationMode) -> Self {
        Self {
            mode,
            runs: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OperationModeProcessor for FakeProcessor {
    fn mode(&self) -> OperationMode {
        self.mode
    }

    async fn process(&self, _shutdown: watch::Receiver<bool>) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("cycle failed");
        }
        Ok(())
    }
}

/// A shutdown receiver that never fires.
pub fn running() -> watch::Receiver<bool> {
    watch::channel(false).1
}

/// Every fake wired to one call log.
#[derive(Debug)]
pub struct Harness {
    pub log: CallLog,
    pub yield_manager: Arc<FakeYieldManager>,
    pub lazy_oracle: Arc<FakeLazyOracle>,
    pub vault_hub: Arc<FakeVaultHub>,
    pub dashboard: Arc<FakeDashboard>,
    pub rollup: Arc<FakeRollup>,
    pub accounting: Arc<FakeAccounting>,
    pub beacon_staking: Arc<FakeBeaconStaking>,
    pub metrics: Arc<RecordingMetrics>,
}

impl Harness {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            yield_manager: Arc::new(FakeYieldManager::with_log(log.clone())),
            lazy_oracle: Arc::new(FakeLazyOracle::with_log(log.clone())),
            vault_hub: Arc::new(FakeVaultHub::with_log(log.clone())),
            dashboard: Arc::new(FakeDashboard::default()),
            rollup: Arc::new(FakeRollup::with_log(log.clone())),
            accounting: Arc::new(FakeAccounting::with_log(log.clone())),
            beacon_staking: Arc::new(FakeBeaconStaking::with_log(log.clone())),
            metrics: Arc::new(RecordingMetrics::default()),
            log,
        }
    }

    pub fn deps(&self) -> ProcessorDeps {
        let metrics = NativeYieldMetricsUpdater::new(self.metrics.clone());
        let recorder = OperationModeMetricsRecorder::new(
            metrics.clone(),
            self.yield_manager.clone(),
            self.vault_hub.clone(),
            self.dashboard.clone(),
        );
        ProcessorDeps {
            yield_manager: self.yield_manager.clone(),
            lazy_oracle: self.lazy_oracle.clone(),
            vault_hub: self.vault_hub.clone(),
            rollup: self.rollup.clone(),
            accounting: self.accounting.clone(),
            beacon_staking: self.beacon_staking.clone(),
            metrics,
            recorder,
        }
    }

    pub fn settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            yield_provider: Address::repeat_byte(0x01),
            l2_yield_recipient: Address::repeat_byte(0x02),
            max_inaction: Duration::from_secs(1),
            should_submit_vault_report: true,
            should_report_yield: true,
            is_unpause_staking_enabled: true,
        }
    }
}
