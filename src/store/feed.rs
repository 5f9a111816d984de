//! Change notifications as owned subscription handles.
//!
//! The feed is a version counter on a `watch` channel. Any number of
//! changes between two reads collapse into a single wake-up, which is
//! all a full-refetch consumer needs.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::logging::{log, log_subscription, obj, v_str, Domain, Level};
use serde_json::json;

#[derive(Debug)]
struct FeedInner {
    tx: watch::Sender<u64>,
    next_id: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
    active: Arc<AtomicUsize>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0u64);
        Self {
            inner: Arc::new(FeedInner {
                tx,
                next_id: AtomicU64::new(1),
            }),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn notify(&self, source: &str) {
        self.inner.tx.send_modify(|v| *v = v.wrapping_add(1));
        log(
            Level::Debug,
            Domain::Store,
            "change",
            obj(&[
                ("source", v_str(source)),
                ("version", json!(self.version())),
                ("subscribers", json!(self.subscriber_count())),
            ]),
        );
    }

    pub fn version(&self) -> u64 {
        *self.inner.tx.borrow()
    }

    pub fn subscriber_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Changes made before this call are not reported to the new handle.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        log_subscription("subscribe", id, active);
        Subscription {
            id,
            rx: self.inner.tx.subscribe(),
            active: Arc::clone(&self.active),
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Live subscription; released when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: watch::Receiver<u64>,
    active: Arc<AtomicUsize>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next change. Returns `false` once the feed is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Whether a change arrived that has not been consumed yet.
    pub fn has_pending(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Mark everything up to now as seen.
    pub fn mark_seen(&mut self) {
        self.rx.borrow_and_update();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let active = self.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        log_subscription("unsubscribe", self.id, active);
    }
}
