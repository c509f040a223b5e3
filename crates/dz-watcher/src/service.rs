//! A collection of buffered watchers sharing one event policy.

use std::sync::Arc;

use camino::Utf8Path;
use dz_core::WatchTarget;
use tokio::sync::mpsc;

use crate::buffered::BufferedWatcher;
use crate::error::{WatchError, WatchFault};
use crate::events::ChangeEvent;
use crate::notify_source::NotifySource;
use crate::source::ChangeSource;
use crate::subscribers::HandlerResult;

/// Per-event handling supplied by the owner of a [`WatcherService`].
///
/// `on_event` runs on the drain task of the watcher that produced the event,
/// so it should hand real work off (for example by spawning) and return.
pub trait EventPolicy: Send + Sync + 'static {
    /// Handles one delivered event.
    fn on_event(&self, event: &ChangeEvent) -> HandlerResult;

    /// Observes an error raised by the watcher rooted at `root`.
    ///
    /// The service has already logged it.
    fn on_error(&self, _root: &Utf8Path, _error: &WatchError) {}
}

/// Owns a set of independent [`BufferedWatcher`]s and starts and stops them
/// together.
///
/// Watchers do not share queues, so an overflow or a failing handler in one
/// never affects another. Overflows are fatal for the affected watcher; with
/// escalation enabled (the default) they are also reported as a
/// [`WatchFault`] through [`next_fault`](Self::next_fault) so the host can
/// shut down.
pub struct WatcherService<P: EventPolicy, S: ChangeSource = NotifySource> {
    policy: Arc<P>,
    queue_capacity: usize,
    escalate_overflow: bool,
    watchers: Vec<BufferedWatcher<S>>,
    fault_tx: mpsc::UnboundedSender<WatchFault>,
    fault_rx: mpsc::UnboundedReceiver<WatchFault>,
    running: bool,
}

impl<P: EventPolicy, S: ChangeSource> std::fmt::Debug for WatcherService<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherService")
            .field("watchers", &self.watchers)
            .field("queue_capacity", &self.queue_capacity)
            .field("escalate_overflow", &self.escalate_overflow)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl<P: EventPolicy> WatcherService<P, NotifySource> {
    /// Registers a watcher on the platform change source.
    ///
    /// # Errors
    ///
    /// See [`BufferedWatcher::new`]. Also fails if the service is running and
    /// the new watcher cannot start.
    pub fn add_watch(&mut self, target: WatchTarget) -> Result<&BufferedWatcher, WatchError> {
        self.add_watch_with(target, NotifySource::new())
    }
}

impl<P: EventPolicy, S: ChangeSource> WatcherService<P, S> {
    /// Creates an empty service whose watchers use `queue_capacity` slots each.
    pub fn new(policy: Arc<P>, queue_capacity: usize) -> Self {
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        Self {
            policy,
            queue_capacity,
            escalate_overflow: true,
            watchers: Vec::new(),
            fault_tx,
            fault_rx,
            running: false,
        }
    }

    /// Sets whether overflows are escalated through [`next_fault`](Self::next_fault).
    #[must_use]
    pub const fn escalate_overflow(mut self, escalate: bool) -> Self {
        self.escalate_overflow = escalate;
        self
    }

    /// Registers a watcher over an explicit change source.
    ///
    /// If the service is already running the watcher starts immediately.
    ///
    /// # Errors
    ///
    /// See [`BufferedWatcher::with_source`] and [`BufferedWatcher::start`].
    pub fn add_watch_with(&mut self, target: WatchTarget, source: S) -> Result<&BufferedWatcher<S>, WatchError> {
        let mut watcher = BufferedWatcher::with_source(target, self.queue_capacity, source)?;
        let root = watcher.root().to_owned();

        let policy = Arc::clone(&self.policy);
        watcher.subscribe(move |event| policy.on_event(event));

        let policy = Arc::clone(&self.policy);
        let faults = self.fault_tx.clone();
        let escalate = self.escalate_overflow;
        watcher.subscribe_errors(move |error| {
            if error.is_overflow() {
                tracing::error!(path = %root, error = %error, "Watcher lost events");
                if escalate {
                    // The receiver lives as long as the service.
                    let _ = faults.send(WatchFault::new(root.clone(), error));
                }
            } else if error.is_fatal() {
                tracing::error!(path = %root, error = %error, "Watcher error");
            } else {
                tracing::warn!(path = %root, error = %error, "Watcher event failed");
            }
            policy.on_error(&root, error);
        });

        if self.running {
            watcher.start()?;
        }

        tracing::debug!(path = %watcher.root(), "Watch registered");
        self.watchers.push(watcher);
        Ok(&self.watchers[self.watchers.len() - 1])
    }

    /// Starts every registered watcher.
    ///
    /// # Errors
    ///
    /// Returns the first start failure. Watchers started before it keep
    /// running; call [`stop`](Self::stop) to tear them down.
    pub fn start(&mut self) -> Result<(), WatchError> {
        for watcher in &mut self.watchers {
            watcher.start()?;
        }
        self.running = true;
        tracing::info!(watchers = self.watchers.len(), "Watcher service started");
        Ok(())
    }

    /// Stops every registered watcher.
    pub async fn stop(&mut self) {
        for watcher in &mut self.watchers {
            watcher.stop().await;
        }
        self.running = false;
        tracing::info!(watchers = self.watchers.len(), "Watcher service stopped");
    }

    /// Waits for the next escalated fault.
    ///
    /// Never resolves if no watcher faults.
    pub async fn next_fault(&mut self) -> Option<WatchFault> {
        self.fault_rx.recv().await
    }

    /// Returns the registered watchers.
    #[must_use]
    pub fn watchers(&self) -> &[BufferedWatcher<S>] {
        &self.watchers
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Returns the shared policy.
    #[must_use]
    pub fn policy(&self) -> &Arc<P> {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    use super::*;
    use crate::source::ManualSource;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Utf8PathBuf>>,
        errors: Mutex<Vec<String>>,
    }

    impl EventPolicy for Recorder {
        fn on_event(&self, event: &ChangeEvent) -> HandlerResult {
            self.events.lock().push(event.path.clone());
            Ok(())
        }

        fn on_error(&self, _root: &Utf8Path, error: &WatchError) {
            self.errors.lock().push(error.to_string());
        }
    }

    fn target(dir: &TempDir) -> WatchTarget {
        WatchTarget::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()).replay_existing(false)
    }

    fn created(dir: &TempDir, name: &str) -> ChangeEvent {
        let root = Utf8PathBuf::from_path_buf(dir.path().canonicalize().unwrap()).unwrap();
        ChangeEvent::created(root.join(name))
    }

    #[tokio::test]
    async fn test_overflow_escalates_fault() {
        let dir = TempDir::new().unwrap();
        let policy = Arc::new(Recorder::default());
        let mut service = WatcherService::<_, ManualSource>::new(Arc::clone(&policy), 1);

        // Seeding two events into a one-slot queue overflows during start.
        let source = ManualSource::with_events([created(&dir, "a.json"), created(&dir, "b.json")]);
        service.add_watch_with(target(&dir), source).unwrap();
        service.start().unwrap();

        let fault = tokio::time::timeout(Duration::from_secs(2), service.next_fault())
            .await
            .unwrap()
            .unwrap();
        service.stop().await;

        assert!(fault.reason.contains("capacity of 1"));
        assert_eq!(policy.errors.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_overflow_without_escalation() {
        let dir = TempDir::new().unwrap();
        let policy = Arc::new(Recorder::default());
        let mut service =
            WatcherService::<_, ManualSource>::new(Arc::clone(&policy), 1).escalate_overflow(false);

        let source = ManualSource::with_events([created(&dir, "a.json"), created(&dir, "b.json")]);
        service.add_watch_with(target(&dir), source).unwrap();
        service.start().unwrap();

        let fault = tokio::time::timeout(Duration::from_millis(200), service.next_fault()).await;
        service.stop().await;

        assert!(fault.is_err());
        assert_eq!(policy.errors.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_watchers_are_independent() {
        let busy = TempDir::new().unwrap();
        let quiet = TempDir::new().unwrap();
        let policy = Arc::new(Recorder::default());
        let mut service = WatcherService::<_, ManualSource>::new(Arc::clone(&policy), 1);

        let overflowing = ManualSource::with_events([created(&busy, "a.json"), created(&busy, "b.json")]);
        let healthy = ManualSource::new();
        let handle = healthy.handle();
        service.add_watch_with(target(&busy), overflowing).unwrap();
        service.add_watch_with(target(&quiet), healthy).unwrap();
        service.start().unwrap();

        handle.emit(created(&quiet, "c.json")).unwrap();
        for _ in 0..200 {
            if policy.events.lock().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        service.stop().await;

        let events = policy.events.lock();
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|p| p.ends_with("c.json")));
        assert_eq!(service.watchers().len(), 2);
    }

    /// Relies on the default `on_error`.
    struct EventsOnly;

    impl EventPolicy for EventsOnly {
        fn on_event(&self, _event: &ChangeEvent) -> HandlerResult {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_error_hook_still_escalates() {
        let dir = TempDir::new().unwrap();
        let mut service = WatcherService::<_, ManualSource>::new(Arc::new(EventsOnly), 1);

        let source = ManualSource::with_events([created(&dir, "a.json"), created(&dir, "b.json")]);
        service.add_watch_with(target(&dir), source).unwrap();
        service.start().unwrap();

        let fault = tokio::time::timeout(Duration::from_secs(2), service.next_fault())
            .await
            .unwrap()
            .unwrap();
        service.stop().await;

        assert!(fault.reason.contains("capacity of 1"));
    }

    #[tokio::test]
    async fn test_watch_added_while_running_starts() {
        let dir = TempDir::new().unwrap();
        let mut service = WatcherService::<_, ManualSource>::new(Arc::new(Recorder::default()), 4);
        service.start().unwrap();

        let watcher = service.add_watch_with(target(&dir), ManualSource::new()).unwrap();
        assert!(watcher.is_running());

        service.stop().await;
        assert!(!service.is_running());
    }
}
