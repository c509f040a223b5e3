//! The change source abstraction and an in-memory source for tests.
//!
//! A [`ChangeSource`] is the leaf of the watcher: it turns whatever native
//! facility the platform offers into [`ChangeEvent`]s pushed onto an
//! [`EventSink`]. The buffered watcher composes a source rather than
//! extending it, so sources only need to know how to start and stop.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;

use crate::error::WatchError;
use crate::events::ChangeEvent;
use crate::queue::EventSink;

/// A producer of raw change notifications for one directory tree.
///
/// Implementations must never block inside their notification path; they
/// hand events to [`EventSink::push`], which fails fast when the queue is full.
pub trait ChangeSource: Send + 'static {
    /// Begins emitting notifications for `root` into `sink`.
    fn start(&mut self, root: &Utf8Path, recursive: bool, sink: EventSink) -> Result<(), WatchError>;

    /// Stops emitting notifications and releases native resources.
    ///
    /// Must be idempotent.
    fn stop(&mut self);
}

type SharedSink = Arc<Mutex<Option<EventSink>>>;

/// A change source driven entirely by the caller.
///
/// Seeded events are pushed synchronously inside `start`, before the drain
/// loop runs, which makes queue ordering and overflow deterministic.
///
/// # Examples
///
/// ```
/// use dz_watcher::{ChangeEvent, ManualSource};
/// use camino::Utf8PathBuf;
///
/// let source = ManualSource::with_events([
///     ChangeEvent::created(Utf8PathBuf::from("/drop/a.json")),
/// ]);
/// let handle = source.handle();
/// assert!(!handle.is_started());
/// ```
#[derive(Debug, Default)]
pub struct ManualSource {
    seeded: Vec<ChangeEvent>,
    sink: SharedSink,
}

impl ManualSource {
    /// Creates a source with no seeded events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source that pushes `events` as soon as it starts.
    #[must_use]
    pub fn with_events(events: impl IntoIterator<Item = ChangeEvent>) -> Self {
        Self {
            seeded: events.into_iter().collect(),
            sink: SharedSink::default(),
        }
    }

    /// Returns a handle for emitting events after the source has started.
    #[must_use]
    pub fn handle(&self) -> ManualHandle {
        ManualHandle {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl ChangeSource for ManualSource {
    fn start(&mut self, root: &Utf8Path, recursive: bool, sink: EventSink) -> Result<(), WatchError> {
        tracing::debug!(path = %root, recursive, seeded = self.seeded.len(), "Manual source started");
        for event in self.seeded.drain(..) {
            // Overflow has already been raised through the error channel.
            let _ = sink.push(event);
        }
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.sink.lock().take();
    }
}

/// Caller-side handle of a [`ManualSource`].
#[derive(Debug, Clone)]
pub struct ManualHandle {
    sink: SharedSink,
}

impl ManualHandle {
    /// Pushes one event, exactly as a native callback would.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::ChannelClosed`] if the source is not running,
    /// or whatever [`EventSink::push`] returns.
    pub fn emit(&self, event: ChangeEvent) -> Result<(), WatchError> {
        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => sink.push(event),
            None => Err(WatchError::ChannelClosed),
        }
    }

    /// Emits a [`ChangeKind::Created`](crate::ChangeKind::Created) event for `path`.
    pub fn emit_created(&self, path: impl Into<Utf8PathBuf>) -> Result<(), WatchError> {
        self.emit(ChangeEvent::created(path.into()))
    }

    /// Raises a source error through the watcher's error channel.
    ///
    /// Returns `false` if the source is not running.
    pub fn report(&self, error: &WatchError) -> bool {
        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => {
                sink.report(error);
                true
            }
            None => false,
        }
    }

    /// Returns `true` while the owning source is started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.sink.lock().is_some()
    }
}
