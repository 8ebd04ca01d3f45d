//! Push-based change feed for correspondence records.
//!
//! # Responsibility
//! - Fan out every persisted insert/update to live subscribers.
//! - Tie subscription lifetime to a guard value.
//!
//! # Invariants
//! - Dropping a `Subscription` unregisters it; no explicit unsubscribe call.
//! - Publishing never blocks on slow subscribers (unbounded channels).
//! - Subscribers whose receiver is gone are pruned on the next publish.

use crate::model::correspondence::Correspondence;
use log::debug;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// One change observed by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Record was created or patched; carries the stored state.
    Upserted(Correspondence),
}

impl FeedEvent {
    pub fn record(&self) -> &Correspondence {
        match self {
            Self::Upserted(record) => record,
        }
    }
}

#[derive(Default)]
struct FeedInner {
    subscribers: Mutex<BTreeMap<u64, Sender<FeedEvent>>>,
    next_id: AtomicU64,
}

impl FeedInner {
    fn subscribers(&self) -> MutexGuard<'_, BTreeMap<u64, Sender<FeedEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared handle to the change feed. Clones publish to the same subscribers.
#[derive(Clone, Default)]
pub struct CorrespondenceFeed {
    inner: Arc<FeedInner>,
}

impl CorrespondenceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber; events published after this call are delivered.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = channel();
        self.inner.subscribers().insert(id, sender);
        debug!("event=feed_subscribe module=feed status=ok subscription_id={id}");
        Subscription {
            id,
            receiver,
            feed: Arc::downgrade(&self.inner),
        }
    }

    /// Publishes one upsert; returns how many subscribers received it.
    pub fn publish(&self, record: &Correspondence) -> usize {
        let mut subscribers = self.inner.subscribers();
        subscribers.retain(|_, sender| sender.send(FeedEvent::Upserted(record.clone())).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

/// Scoped feed registration. Unregisters on drop.
pub struct Subscription {
    id: u64,
    receiver: Receiver<FeedEvent>,
    feed: Weak<FeedInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the next pending event without blocking.
    pub fn try_next(&self) -> Option<FeedEvent> {
        self.receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<FeedEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes every pending event without blocking.
    pub fn drain(&self) -> Vec<FeedEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            feed.subscribers().remove(&self.id);
            debug!(
                "event=feed_unsubscribe module=feed status=ok subscription_id={}",
                self.id
            );
        }
    }
}
