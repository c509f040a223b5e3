//! Subscriber registry shared between a watcher's producers and drain loop.
//!
//! Callbacks are stored behind `Arc` so a delivery can snapshot the list and
//! release the lock before running user code; subscribing from inside a
//! handler therefore never deadlocks.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::WatchError;
use crate::events::ChangeEvent;

/// Error type subscribers may return from an event callback.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of handling one event.
pub type HandlerResult = Result<(), HandlerError>;

type EventCallback = Arc<dyn Fn(&ChangeEvent) -> HandlerResult + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&WatchError) + Send + Sync>;

/// Event and error subscribers of one buffered watcher.
#[derive(Default)]
pub(crate) struct Subscribers {
    events: RwLock<Vec<EventCallback>>,
    errors: RwLock<Vec<ErrorCallback>>,
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("events", &self.events.read().len())
            .field("errors", &self.errors.read().len())
            .finish()
    }
}

impl Subscribers {
    pub(crate) fn add_event<F>(&self, callback: F)
    where
        F: Fn(&ChangeEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.events.write().push(Arc::new(callback));
    }

    pub(crate) fn add_error<F>(&self, callback: F)
    where
        F: Fn(&WatchError) + Send + Sync + 'static,
    {
        self.errors.write().push(Arc::new(callback));
    }

    /// Invokes every event subscriber in registration order.
    ///
    /// Returns the number of subscribers that failed. Each failure is
    /// reported through the error channel and never interrupts the others.
    pub(crate) fn deliver(&self, event: &ChangeEvent) -> usize {
        let callbacks = self.events.read().clone();
        let mut failures = 0;

        for callback in &callbacks {
            let message = match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error.to_string(),
                Err(payload) => format!("handler panicked: {}", panic_message(&*payload)),
            };
            failures += 1;
            self.report(&WatchError::handler(event.path.clone(), message));
        }

        failures
    }

    /// Raises an error through the error channel.
    ///
    /// Without error subscribers the error is logged so it never vanishes.
    pub(crate) fn report(&self, error: &WatchError) {
        let callbacks = self.errors.read().clone();
        if callbacks.is_empty() {
            tracing::error!(error = %error, "Unobserved watcher error");
            return;
        }

        for callback in &callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(error))).is_err() {
                tracing::error!(error = %error, "Error subscriber panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use camino::Utf8PathBuf;

    use super::*;

    fn event() -> ChangeEvent {
        ChangeEvent::created(Utf8PathBuf::from("/drop/a.json"))
    }

    #[test]
    fn test_failures_are_reported_and_isolated() {
        let subscribers = Subscribers::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        subscribers.add_event(|_| Err("boom".into()));
        #[allow(clippy::panic)]
        subscribers.add_event(|_| panic!("kaboom"));
        let counter = Arc::clone(&calls);
        subscribers.add_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let counter = Arc::clone(&errors);
        subscribers.add_error(move |err| {
            assert!(matches!(err, WatchError::Handler { .. }));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(subscribers.deliver(&event()), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_report_without_subscribers_does_not_panic() {
        Subscribers::default().report(&WatchError::ChannelClosed);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }
}
