//! Subscription handles for on-chain event watchers.

use tokio::sync::oneshot;

use crate::types::ReportEvent;

/// Handle to a live event watcher.
///
/// `unsubscribe` tears the watcher down at most once; later calls and the
/// final drop are no-ops.
pub struct SubscriptionHandle {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A pending `VaultsReportDataUpdated` watch.
///
/// `event` resolves with the first complete, non-removed log. If the watcher
/// stops without delivering one, the sender is dropped and `event` errors.
#[derive(Debug)]
pub struct ReportWatch {
    pub subscription: SubscriptionHandle,
    pub event: oneshot::Receiver<ReportEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut handle = SubscriptionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.unsubscribe();
        handle.unsubscribe();
        assert!(!handle.is_active());
        drop(handle);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = SubscriptionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(handle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
