//! Bounded event queue and the producer-side [`EventSink`].
//!
//! The queue sits between the change source callback (producer) and the
//! watcher's drain loop (single consumer). Pushes never block: when the queue
//! is at capacity the event is rejected and a [`WatchError::Overflow`] is
//! raised through the watcher's error channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::WatchError;
use crate::events::ChangeEvent;
use crate::filter::FileFilter;
use crate::subscribers::Subscribers;

/// Counters describing one watcher's lifetime activity.
#[derive(Debug, Default)]
pub struct WatcherStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    replayed: AtomicU64,
    filtered: AtomicU64,
    overflowed: AtomicU64,
    handler_failures: AtomicU64,
}

impl WatcherStats {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replayed(&self) {
        self.replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overflow(&self) {
        self.overflowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handler_failures(&self, count: usize) {
        self.handler_failures
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`WatcherStats`], suitable for logging or serialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatcherStatsSnapshot {
    /// Live events accepted into the queue.
    pub enqueued: u64,
    /// Events handed to subscribers (live and replayed).
    pub delivered: u64,
    /// Existing files synthesized by the replay.
    pub replayed: u64,
    /// Live events dropped by the file filter.
    pub filtered: u64,
    /// Live events rejected because the queue was full.
    pub overflowed: u64,
    /// Subscriber invocations that returned an error or panicked.
    pub handler_failures: u64,
}

/// Producer handle onto a watcher's bounded queue.
///
/// Change sources receive an `EventSink` on start and call [`push`](Self::push)
/// from whatever thread their notifications arrive on. Cloning is cheap.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ChangeEvent>,
    filter: Arc<dyn FileFilter>,
    subscribers: Arc<Subscribers>,
    stats: Arc<WatcherStats>,
    capacity: usize,
    root: Arc<Utf8PathBuf>,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("root", &self.root)
            .field("capacity", &self.capacity)
            .field("is_closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl EventSink {
    /// Pushes an event without blocking.
    ///
    /// Events rejected by the filter are dropped silently and return `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Overflow`] if the queue is full; the same error
    /// has already been raised through the watcher's error channel. Returns
    /// [`WatchError::ChannelClosed`] once the watcher has stopped.
    pub fn push(&self, event: ChangeEvent) -> Result<(), WatchError> {
        if !self.filter.should_process(&event.path) {
            self.stats.record_filtered();
            tracing::trace!(path = %event.path, "Filtered out change event");
            return Ok(());
        }

        match self.tx.try_send(event) {
            Ok(()) => {
                self.stats.record_enqueued();
                Ok(())
            }
            Err(TrySendError::Full(event)) => {
                self.stats.record_overflow();
                let error = WatchError::Overflow {
                    capacity: self.capacity,
                    path: event.path,
                };
                self.subscribers.report(&error);
                Err(error)
            }
            Err(TrySendError::Closed(_)) => Err(WatchError::ChannelClosed),
        }
    }

    /// Raises a source-side error through the watcher's error channel.
    pub fn report(&self, error: &WatchError) {
        self.subscribers.report(error);
    }

    /// Returns the canonical root of the watcher this sink feeds.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the queue capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` once the consuming watcher has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Creates a queue of `capacity` slots and its producer handle.
///
/// A capacity of zero is bumped to one; tokio channels require at least one slot.
pub(crate) fn bounded(
    root: Utf8PathBuf,
    capacity: usize,
    filter: Arc<dyn FileFilter>,
    subscribers: Arc<Subscribers>,
    stats: Arc<WatcherStats>,
) -> (EventSink, mpsc::Receiver<ChangeEvent>) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let sink = EventSink {
        tx,
        filter,
        subscribers,
        stats,
        capacity,
        root: Arc::new(root),
    };
    (sink, rx)
}
