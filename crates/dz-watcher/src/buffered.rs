//! The buffered watcher: one change source, one bounded queue, one drain loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ ChangeSource (notify thread) │
//! │   translate ─► filter        │
//! └──────────────┬───────────────┘
//!                │ try_send (never blocks; Full ─► Overflow on error channel)
//!                ▼
//! ┌──────────────────────────────┐      ┌────────────────────────────┐
//! │ bounded mpsc (capacity N)    │ ───► │ drain loop (tokio task)    │
//! └──────────────────────────────┘      │  1. replay existing files  │
//!                                       │  2. FIFO drain             │
//!                                       │  ─► subscribers, in order  │
//!                                       └────────────────────────────┘
//! ```
//!
//! The source is enabled before the replay is listed, so a file that lands
//! in between is seen at least once (possibly twice). Subscribers must treat
//! a second arrival for the same path as a no-op.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use dz_core::WatchTarget;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::events::ChangeEvent;
use crate::filter::{FileFilter, GlobFilter};
use crate::notify_source::NotifySource;
use crate::queue::{self, WatcherStats, WatcherStatsSnapshot};
use crate::replay;
use crate::source::ChangeSource;
use crate::subscribers::{HandlerResult, Subscribers};

/// Watches one directory through a bounded, ordered event queue.
///
/// # Lifecycle
///
/// 1. **Creation**: [`new`](Self::new) validates and canonicalizes the root
///    and compiles the filters. Nothing is watched yet.
/// 2. **Subscription**: [`subscribe`](Self::subscribe) and
///    [`subscribe_errors`](Self::subscribe_errors) register callbacks. They
///    may be added at any time; each event sees the list as it was when the
///    event was dequeued.
/// 3. **Start**: [`start`](Self::start) enables the change source and spawns
///    the drain loop, which replays existing files (if configured) before
///    draining live events.
/// 4. **Stop**: [`stop`](Self::stop) cancels the drain loop and disables the
///    source. Events still queued are discarded; the files stay on disk and
///    are replayed on the next start. Dropping the watcher cancels too.
///
/// Event subscribers run on the drain task, one event at a time. Anything
/// slow belongs on a separate task.
///
/// # Examples
///
/// ```no_run
/// use dz_core::WatchTarget;
/// use dz_watcher::BufferedWatcher;
///
/// # async fn example() -> Result<(), dz_watcher::WatchError> {
/// let target = WatchTarget::new("/srv/drop/Output").with_filters(["*.json"]);
/// let mut watcher = BufferedWatcher::new(target, 4096)?;
///
/// watcher.subscribe(|event| {
///     println!("{} {}", event.kind, event.path);
///     Ok(())
/// });
/// watcher.subscribe_errors(|error| eprintln!("watcher error: {error}"));
///
/// watcher.start()?;
/// // ...
/// watcher.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct BufferedWatcher<S: ChangeSource = NotifySource> {
    target: WatchTarget,
    capacity: usize,
    filter: Arc<GlobFilter>,
    source: S,
    subscribers: Arc<Subscribers>,
    stats: Arc<WatcherStats>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl<S: ChangeSource> std::fmt::Debug for BufferedWatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedWatcher")
            .field("root", &self.target.root)
            .field("filters", &self.filter.patterns())
            .field("capacity", &self.capacity)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl BufferedWatcher<NotifySource> {
    /// Creates a watcher backed by the platform change source.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the root is not a directory and
    /// [`WatchError::InvalidFilter`] if a filter pattern does not compile.
    pub fn new(target: WatchTarget, capacity: usize) -> Result<Self, WatchError> {
        Self::with_source(target, capacity, NotifySource::new())
    }
}

impl<S: ChangeSource> BufferedWatcher<S> {
    /// Creates a watcher over an explicit change source.
    ///
    /// A `capacity` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Same as [`BufferedWatcher::new`].
    pub fn with_source(mut target: WatchTarget, capacity: usize, source: S) -> Result<Self, WatchError> {
        if !target.root.is_dir() {
            return Err(WatchError::path_not_found(target.root));
        }
        target.root = target.root.canonicalize_utf8()?;
        let filter = GlobFilter::new(&target.root, &target.filters)?;

        Ok(Self {
            target,
            capacity: capacity.max(1),
            filter: Arc::new(filter),
            source,
            subscribers: Arc::new(Subscribers::default()),
            stats: Arc::new(WatcherStats::default()),
            cancel: None,
            task: None,
        })
    }

    /// Registers an event handler.
    ///
    /// Handlers are invoked sequentially, in registration order, once per
    /// dequeued event. An `Err` or a panic is reported through the error
    /// channel as [`WatchError::Handler`] and does not stop the loop.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&ChangeEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribers.add_event(handler);
    }

    /// Registers an error handler.
    ///
    /// Receives overflow, source and handler errors. When no error handler is
    /// registered, errors are logged at error level instead.
    pub fn subscribe_errors<F>(&self, handler: F)
    where
        F: Fn(&WatchError) + Send + Sync + 'static,
    {
        self.subscribers.add_error(handler);
    }

    /// Enables the change source and spawns the drain loop.
    ///
    /// Calling `start` on a running watcher does nothing.
    ///
    /// # Errors
    ///
    /// Returns the change source's error if it cannot start; the watcher is
    /// left stopped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.is_running() {
            return Ok(());
        }

        let filter: Arc<dyn FileFilter> = Arc::clone(&self.filter) as Arc<dyn FileFilter>;
        let (sink, rx) = queue::bounded(
            self.target.root.clone(),
            self.capacity,
            filter,
            Arc::clone(&self.subscribers),
            Arc::clone(&self.stats),
        );

        // Source first, then replay: a file arriving in between is seen twice
        // rather than never.
        self.source.start(&self.target.root, self.target.recurse, sink)?;

        let replay = self.target.replay_existing.then(|| Replay {
            root: self.target.root.clone(),
            recursive: self.target.recurse,
            oldest_first: self.target.order_by_oldest_first,
            filter: Arc::clone(&self.filter),
        });

        let cancel = CancellationToken::new();
        self.task = Some(tokio::spawn(drain_loop(
            rx,
            replay,
            Arc::clone(&self.subscribers),
            Arc::clone(&self.stats),
            cancel.clone(),
        )));
        self.cancel = Some(cancel);

        tracing::info!(
            path = %self.target.root,
            filters = ?self.filter.patterns(),
            capacity = self.capacity,
            replay = self.target.replay_existing,
            "Buffered watcher started"
        );
        Ok(())
    }

    /// Stops the drain loop and the change source.
    ///
    /// Waits for the event currently being delivered to finish. Events still
    /// in the queue are discarded.
    pub async fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.source.stop();

        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(path = %self.target.root, error = %error, "Drain loop ended abnormally");
            }
            tracing::info!(path = %self.target.root, "Buffered watcher stopped");
        }
    }

    /// Returns `true` while the drain loop is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Returns the canonical watch root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.target.root
    }

    /// Returns the target this watcher was built from, with a canonical root.
    #[must_use]
    pub const fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// Returns the queue capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a snapshot of this watcher's counters.
    #[must_use]
    pub fn stats(&self) -> WatcherStatsSnapshot {
        self.stats.snapshot()
    }
}

impl<S: ChangeSource> Drop for BufferedWatcher<S> {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.source.stop();
    }
}

struct Replay {
    root: Utf8PathBuf,
    recursive: bool,
    oldest_first: bool,
    filter: Arc<GlobFilter>,
}

async fn drain_loop(
    mut rx: mpsc::Receiver<ChangeEvent>,
    replay: Option<Replay>,
    subscribers: Arc<Subscribers>,
    stats: Arc<WatcherStats>,
    cancel: CancellationToken,
) {
    if let Some(replay) = replay {
        let root = replay.root.clone();
        let listing = tokio::task::spawn_blocking(move || {
            replay::existing_files(&replay.root, replay.recursive, replay.oldest_first, &*replay.filter)
        });

        let listed = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            listed = listing => listed,
        };

        match listed {
            Ok(files) => {
                tracing::debug!(path = %root, count = files.len(), "Replaying existing files");
                for path in files {
                    if cancel.is_cancelled() {
                        return;
                    }
                    stats.record_replayed();
                    deliver(&subscribers, &stats, &ChangeEvent::existing(path));
                }
            }
            Err(error) => {
                subscribers.report(&WatchError::Io(std::io::Error::other(error)));
            }
        }
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(event) => deliver(&subscribers, &stats, &event),
                None => break,
            },
        }
    }

    rx.close();
    let discarded = rx.len();
    if discarded > 0 {
        tracing::debug!(discarded, "Discarding queued events on stop");
    }
}

fn deliver(subscribers: &Subscribers, stats: &WatcherStats, event: &ChangeEvent) {
    tracing::trace!(kind = %event.kind, path = %event.path, "Delivering change event");
    let failures = subscribers.deliver(event);
    stats.record_delivered();
    if failures > 0 {
        stats.record_handler_failures(failures);
    }
}
