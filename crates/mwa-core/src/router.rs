//! Correlation of launched activities with their asynchronous results.
//!
//! Each launch registers a one-shot callback under its request code. The
//! platform reports the result later through [`ActivityResultRouter::deliver`],
//! which removes the entry before running it, so a request code is delivered
//! at most once.

use dashmap::DashMap;
use tracing::debug;

/// Android `Activity.RESULT_OK`
pub const RESULT_OK: i32 = -1;
/// Android `Activity.RESULT_CANCELED`
pub const RESULT_CANCELED: i32 = 0;

/// Data returned by the launched activity
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActivityResultData {
    /// Data URI of the returned intent, if any
    pub uri: Option<String>,
}

/// One-shot completion callback: `(result_code, data)`
pub type ActivityResultCallback = Box<dyn FnOnce(i32, Option<ActivityResultData>) + Send + Sync>;

/// Pending activity results keyed by request code.
#[derive(Default)]
pub struct ActivityResultRouter {
    pending: DashMap<i32, ActivityResultCallback>,
}

impl ActivityResultRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `request_code`.
    ///
    /// A callback already pending under the same code is replaced and never
    /// invoked.
    pub fn register(&self, request_code: i32, callback: ActivityResultCallback) {
        if self.pending.insert(request_code, callback).is_some() {
            debug!(request_code, "replaced pending activity result callback");
        }
    }

    /// Deliver a result. Returns `true` if a callback was pending.
    pub fn deliver(
        &self,
        request_code: i32,
        result_code: i32,
        data: Option<ActivityResultData>,
    ) -> bool {
        debug!(request_code, result_code, ?data, "handle activity result");

        // Remove first so a concurrent delivery for the same code finds nothing.
        match self.pending.remove(&request_code) {
            Some((_, callback)) => {
                callback(result_code, data);
                true
            }
            None => false,
        }
    }

    /// Drop a pending callback without running it.
    pub fn cancel(&self, request_code: i32) -> bool {
        self.pending.remove(&request_code).is_some()
    }

    pub fn is_pending(&self, request_code: i32) -> bool {
        self.pending.contains_key(&request_code)
    }

    /// Number of pending callbacks
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_callback(counter: &Arc<AtomicUsize>) -> ActivityResultCallback {
        let counter = counter.clone();
        Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_deliver_at_most_once() {
        let router = ActivityResultRouter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        router.register(0, counting_callback(&calls));

        assert!(router.deliver(0, RESULT_OK, None));
        assert!(!router.deliver(0, RESULT_OK, None));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(router.pending(), 0);
    }

    #[test]
    fn test_deliver_passes_result() {
        let router = ActivityResultRouter::new();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = seen.clone();
        router.register(
            7,
            Box::new(move |code, data| {
                *sink.lock() = Some((code, data));
            }),
        );

        let data = ActivityResultData {
            uri: Some("solana-wallet:/done".into()),
        };
        router.deliver(7, RESULT_CANCELED, Some(data.clone()));
        assert_eq!(*seen.lock(), Some((RESULT_CANCELED, Some(data))));
    }

    #[test]
    fn test_unknown_request_code_is_noop() {
        let router = ActivityResultRouter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        router.register(1, counting_callback(&calls));

        assert!(!router.deliver(2, RESULT_OK, None));
        assert!(router.is_pending(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_register_replaces_and_cancel_removes() {
        let router = ActivityResultRouter::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        router.register(0, counting_callback(&first));
        router.register(0, counting_callback(&second));

        router.deliver(0, RESULT_OK, None);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        router.register(0, counting_callback(&first));
        assert!(router.cancel(0));
        assert!(!router.deliver(0, RESULT_OK, None));
        assert_eq!(first.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrent_deliveries_run_callback_once() {
        let router = Arc::new(ActivityResultRouter::new());
        let calls = Arc::new(AtomicUsize::new(0));
        router.register(0, counting_callback(&calls));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let router = router.clone();
                std::thread::spawn(move || router.deliver(0, RESULT_OK, None))
            })
            .collect();
        let delivered = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| *d)
            .count();

        assert_eq!(delivered, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
