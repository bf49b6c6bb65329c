//! Polling watcher for LazyOracle `VaultsReportDataUpdated` events.
//!
//! The watcher installs an `eth_newFilter` and polls `eth_getFilterChanges`
//! at a fixed interval. Nodes drop idle filters, so a "filter not found"
//! style error is expected from time to time: it is logged at warn and the
//! filter is reinstalled. Anything else is logged at error and polling
//! continues. The caller's timeout is the backstop in both cases.
//!
//! The filter is uninstalled when the watch ends, whether an event arrived
//! or the subscription was torn down. A teardown that lands mid-RPC takes
//! effect once that call returns.

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::TransportError;
use async_trait::async_trait;
use regex_lite::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::contracts::bindings::ILazyOracle;
use crate::types::{ReportEvent, VaultReport};
use crate::watch::{ReportWatch, SubscriptionHandle};

/// JSON-RPC code nodes use for invalid input, including unknown filter ids.
const INVALID_INPUT_CODE: i64 = -32000;

fn benign_error_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)filter\s+(not\s+found|expired|does\s+not\s+exist)|invalid\s+input")
                .ok()
        })
        .as_ref()
}

/// Whether a watcher error is an expected filter expiry.
pub fn is_benign_watch_error(code: Option<i64>, message: &str) -> bool {
    code == Some(INVALID_INPUT_CODE)
        || benign_error_pattern().is_some_and(|pattern| pattern.is_match(message))
}

/// Decode a `VaultsReportDataUpdated` log.
///
/// Removed (reorged) logs and logs without a transaction hash or with
/// undecodable arguments yield `None`.
pub fn decode_report_log(log: &Log) -> Option<ReportEvent> {
    if log.removed {
        return None;
    }
    let tx_hash = log.transaction_hash?;
    let event = ILazyOracle::VaultsReportDataUpdated::decode_log_data(log.data(), true).ok()?;
    Some(ReportEvent {
        tx_hash,
        report: VaultReport {
            timestamp: event.timestamp.try_into().ok()?,
            ref_slot: event.refSlot.try_into().ok()?,
            tree_root: event.root,
            report_cid: event.cid,
        },
    })
}

/// First usable report event in a batch of logs.
pub fn first_report_event<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Option<ReportEvent> {
    logs.into_iter().find_map(decode_report_log)
}

/// A failed filter RPC, reduced to what error classification needs.
#[derive(Debug, Clone)]
pub struct FilterRpcError {
    pub code: Option<i64>,
    pub message: String,
}

impl From<TransportError> for FilterRpcError {
    fn from(e: TransportError) -> Self {
        Self {
            code: e.as_error_resp().map(|payload| payload.code),
            message: e.to_string(),
        }
    }
}

/// The `eth_*Filter` calls the watcher makes.
#[async_trait]
pub trait ReportFilterRpc: Clone + Send + Sync + std::fmt::Debug + 'static {
    async fn install_filter(&self, filter: &Filter) -> Result<U256, FilterRpcError>;

    async fn filter_changes(&self, id: U256) -> Result<Vec<Log>, FilterRpcError>;

    async fn uninstall_filter(&self, id: U256) -> Result<bool, FilterRpcError>;
}

#[async_trait]
impl ReportFilterRpc for RootProvider {
    async fn install_filter(&self, filter: &Filter) -> Result<U256, FilterRpcError> {
        Ok(self.new_filter(filter).await?)
    }

    async fn filter_changes(&self, id: U256) -> Result<Vec<Log>, FilterRpcError> {
        Ok(self.get_filter_changes::<Log>(id).await?)
    }

    async fn uninstall_filter(&self, id: U256) -> Result<bool, FilterRpcError> {
        Ok(Provider::uninstall_filter(self, id).await?)
    }
}

/// Spawns one polling task per watch.
#[derive(Clone, Debug)]
pub struct ReportWatcher<R = RootProvider> {
    rpc: R,
    lazy_oracle: Address,
    poll_interval: Duration,
}

impl<R: ReportFilterRpc> ReportWatcher<R> {
    pub fn new(rpc: R, lazy_oracle: Address, poll_interval: Duration) -> Self {
        Self {
            rpc,
            lazy_oracle,
            poll_interval,
        }
    }

    fn filter(&self) -> Filter {
        Filter::new()
            .address(self.lazy_oracle)
            .event_signature(ILazyOracle::VaultsReportDataUpdated::SIGNATURE_HASH)
    }

    /// Start watching. Unsubscribing stops the polling task, which then
    /// uninstalls its filter.
    pub fn watch(&self) -> ReportWatch {
        let (tx, rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let watcher = self.clone();
        tokio::spawn(async move { watcher.poll_until_event(tx, stop_rx).await });

        info!(lazy_oracle = %self.lazy_oracle, "Watching for VaultsReportDataUpdated");

        ReportWatch {
            subscription: SubscriptionHandle::new(move || {
                let _ = stop_tx.send(());
            }),
            event: rx,
        }
    }

    async fn poll_until_event(
        self,
        tx: oneshot::Sender<ReportEvent>,
        mut stop: oneshot::Receiver<()>,
    ) {
        let filter = self.filter();
        let mut filter_id: Option<U256> = None;

        loop {
            if tx.is_closed() {
                break;
            }

            let id = match filter_id {
                Some(id) => id,
                None => match self.rpc.install_filter(&filter).await {
                    Ok(id) => {
                        debug!(filter_id = %id, "Installed report filter");
                        filter_id = Some(id);
                        id
                    }
                    Err(e) => {
                        self.log_watch_error(&e);
                        if self.pause(&mut stop).await {
                            break;
                        }
                        continue;
                    }
                },
            };

            if self.pause(&mut stop).await {
                break;
            }

            match self.rpc.filter_changes(id).await {
                Ok(logs) => {
                    if let Some(event) = first_report_event(&logs) {
                        info!(
                            tx_hash = %event.tx_hash,
                            ref_slot = event.report.ref_slot,
                            cid = %event.report.report_cid,
                            "VaultsReportDataUpdated received"
                        );
                        let _ = tx.send(event);
                        break;
                    }
                }
                Err(e) => {
                    if self.log_watch_error(&e) {
                        filter_id = None;
                    }
                }
            }
        }

        if let Some(id) = filter_id {
            match self.rpc.uninstall_filter(id).await {
                Ok(_) => debug!(filter_id = %id, "Uninstalled report filter"),
                Err(e) => debug!(filter_id = %id, error = %e.message, "Report filter uninstall failed"),
            }
        }
    }

    /// Sleep one poll interval. Returns true once the subscription is torn down.
    async fn pause(&self, stop: &mut oneshot::Receiver<()>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => false,
            _ = stop => true,
        }
    }

    /// Log a watcher error; returns true when the filter should be reinstalled.
    fn log_watch_error(&self, e: &FilterRpcError) -> bool {
        if is_benign_watch_error(e.code, &e.message) {
            warn!(lazy_oracle = %self.lazy_oracle, error = %e.message, "Report filter expired, recreating");
            true
        } else {
            error!(lazy_oracle = %self.lazy_oracle, error = %e.message, "Report watcher error");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{B256, Log as PrimitiveLog};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct FilterState {
        installed: Vec<U256>,
        uninstalled: Vec<U256>,
        pending_logs: Vec<Log>,
    }

    /// In-memory node: hands out filter ids and returns queued logs once.
    #[derive(Clone, Debug, Default)]
    struct FakeFilterRpc(Arc<Mutex<FilterState>>);

    impl FakeFilterRpc {
        fn queue_logs(&self, logs: Vec<Log>) {
            self.0.lock().unwrap().pending_logs = logs;
        }

        fn installed(&self) -> Vec<U256> {
            self.0.lock().unwrap().installed.clone()
        }

        fn uninstalled(&self) -> Vec<U256> {
            self.0.lock().unwrap().uninstalled.clone()
        }
    }

    #[async_trait]
    impl ReportFilterRpc for FakeFilterRpc {
        async fn install_filter(&self, _filter: &Filter) -> Result<U256, FilterRpcError> {
            let mut state = self.0.lock().unwrap();
            let id = U256::from(state.installed.len() + 1);
            state.installed.push(id);
            Ok(id)
        }

        async fn filter_changes(&self, _id: U256) -> Result<Vec<Log>, FilterRpcError> {
            Ok(std::mem::take(&mut self.0.lock().unwrap().pending_logs))
        }

        async fn uninstall_filter(&self, id: U256) -> Result<bool, FilterRpcError> {
            self.0.lock().unwrap().uninstalled.push(id);
            Ok(true)
        }
    }

    fn watcher(rpc: &FakeFilterRpc) -> ReportWatcher<FakeFilterRpc> {
        ReportWatcher::new(rpc.clone(), Address::repeat_byte(0x0c), Duration::from_millis(100))
    }

    fn report_log(removed: bool, tx_hash: Option<B256>, ref_slot: u64) -> Log {
        let event = ILazyOracle::VaultsReportDataUpdated {
            timestamp: U256::from(1_700_000_000u64),
            refSlot: U256::from(ref_slot),
            root: B256::repeat_byte(0x01),
            cid: "bafy-report".to_string(),
        };
        Log {
            inner: PrimitiveLog {
                address: Address::repeat_byte(0x0c),
                data: event.encode_log_data(),
            },
            transaction_hash: tx_hash,
            removed,
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_report_log() {
        let hash = B256::repeat_byte(0xab);
        let event = decode_report_log(&report_log(false, Some(hash), 42)).unwrap();
        assert_eq!(event.tx_hash, hash);
        assert_eq!(event.report.ref_slot, 42);
        assert_eq!(event.report.timestamp, 1_700_000_000);
        assert_eq!(event.report.report_cid, "bafy-report");
    }

    #[test]
    fn test_removed_logs_are_ignored() {
        let hash = B256::repeat_byte(0xab);
        assert!(decode_report_log(&report_log(true, Some(hash), 1)).is_none());

        let logs = vec![
            report_log(true, Some(hash), 1),
            report_log(false, None, 2),
            report_log(false, Some(hash), 3),
        ];
        let event = first_report_event(&logs).unwrap();
        assert_eq!(event.report.ref_slot, 3);
    }

    #[test]
    fn test_unrelated_log_is_ignored() {
        let log = Log {
            inner: PrimitiveLog::new_unchecked(
                Address::ZERO,
                vec![B256::repeat_byte(0x99)],
                Default::default(),
            ),
            transaction_hash: Some(B256::ZERO),
            ..Default::default()
        };
        assert!(decode_report_log(&log).is_none());
    }

    #[test]
    fn test_benign_error_classification() {
        assert!(is_benign_watch_error(None, "filter not found"));
        assert!(is_benign_watch_error(None, "Filter expired"));
        assert!(is_benign_watch_error(Some(-32000), "anything"));
        assert!(!is_benign_watch_error(Some(-32603), "internal error"));
        assert!(!is_benign_watch_error(None, "connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_uninstalls_filter() {
        let rpc = FakeFilterRpc::default();
        let mut watch = watcher(&rpc).watch();

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(rpc.installed(), vec![U256::from(1)]);
        assert!(rpc.uninstalled().is_empty());

        watch.subscription.unsubscribe();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(rpc.uninstalled(), vec![U256::from(1)]);
        assert!(watch.event.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_watch_uninstalls_filter() {
        let rpc = FakeFilterRpc::default();
        let watch = watcher(&rpc).watch();
        tokio::time::sleep(Duration::from_millis(150)).await;

        drop(watch);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(rpc.uninstalled(), vec![U256::from(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_delivered_then_filter_uninstalled() {
        let rpc = FakeFilterRpc::default();
        rpc.queue_logs(vec![report_log(false, Some(B256::repeat_byte(0xab)), 7)]);

        let watch = watcher(&rpc).watch();
        let event = watch.event.await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(event.report.ref_slot, 7);
        assert_eq!(rpc.installed().len(), 1);
        assert_eq!(rpc.uninstalled(), vec![U256::from(1)]);
    }
}
