//! Error types for the dz-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors raised while
//! watching, buffering, or delivering change events, and [`WatchFault`], the
//! owned summary a [`WatcherService`](crate::WatcherService) escalates to the
//! host when a watcher can no longer guarantee it saw every event.

use camino::Utf8PathBuf;

/// Errors that can occur during file watching operations.
///
/// # Error Recovery Strategy
///
/// - **Overflow** ([`WatchError::Overflow`], [`WatchError::SourceOverflow`]):
///   events were lost; fatal for the watcher, never retried
/// - **Handler** ([`WatchError::Handler`]): one subscriber failed on one
///   event; the drain loop keeps going
/// - **Non-UTF-8 path** ([`WatchError::NonUtf8Path`]): skipped and logged
/// - Everything else: fatal, propagate immediately
///
/// # Examples
///
/// ```
/// use dz_watcher::WatchError;
/// use camino::Utf8PathBuf;
///
/// let err = WatchError::Overflow {
///     capacity: 8,
///     path: Utf8PathBuf::from("/drop/Output/a.json"),
/// };
/// assert!(err.is_overflow());
/// assert!(err.is_fatal());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize or operate the notify watcher.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The specified path does not exist or is not a directory.
    #[error("watch path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The bounded event queue was full and an event was rejected.
    #[error("event queue capacity of {capacity} exceeded, dropped event for {path}")]
    Overflow {
        /// Capacity of the queue that overflowed.
        capacity: usize,
        /// Path of the rejected event.
        path: Utf8PathBuf,
    },

    /// The OS change source reported that it dropped notifications.
    #[error("change source for {0} dropped notifications and requires a rescan")]
    SourceOverflow(Utf8PathBuf),

    /// A subscribed handler failed or panicked while handling an event.
    #[error("handler failed for {path}: {message}")]
    Handler {
        /// Path of the event being handled.
        path: Utf8PathBuf,
        /// Failure description.
        message: String,
    },

    /// The event queue was closed while a producer was still pushing.
    #[error("event queue closed")]
    ChannelClosed,

    /// A filter pattern could not be compiled.
    #[error("invalid watch filter: {0}")]
    InvalidFilter(#[from] ignore::Error),

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::Handler`] error.
    pub fn handler(path: impl Into<Utf8PathBuf>, message: impl Into<String>) -> Self {
        Self::Handler {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if events were lost and catch-up is impossible.
    #[inline]
    #[must_use]
    pub const fn is_overflow(&self) -> bool {
        matches!(self, Self::Overflow { .. } | Self::SourceOverflow(_))
    }

    /// Returns `true` if this error is recoverable (watching can continue).
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Handler { .. } | Self::NonUtf8Path(_))
    }

    /// Returns `true` if this error is fatal for the watcher.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path) | Self::SourceOverflow(path) => Some(path),
            Self::Overflow { path, .. } | Self::Handler { path, .. } => Some(path),
            Self::Notify(_)
            | Self::ChannelClosed
            | Self::InvalidFilter(_)
            | Self::NonUtf8Path(_)
            | Self::Io(_) => None,
        }
    }
}

/// A fatal watcher condition escalated to the host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("watcher for {root} faulted: {reason}")]
pub struct WatchFault {
    /// Root directory of the faulted watcher.
    pub root: Utf8PathBuf,
    /// Rendered description of the underlying error.
    pub reason: String,
}

impl WatchFault {
    /// Builds a fault from the error that caused it.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, error: &WatchError) -> Self {
        Self {
            root: root.into(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_overflow_is_fatal() {
        let err = WatchError::Overflow {
            capacity: 4,
            path: Utf8PathBuf::from("/drop/a.json"),
        };
        assert!(err.is_overflow());
        assert!(err.is_fatal());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/drop/a.json"));
        assert!(err.to_string().contains("capacity of 4"));
    }

    #[test]
    fn test_source_overflow() {
        let err = WatchError::SourceOverflow(Utf8PathBuf::from("/drop"));
        assert!(err.is_overflow());
        assert!(err.to_string().contains("rescan"));
    }

    #[test]
    fn test_handler_error_is_recoverable() {
        let err = WatchError::handler("/drop/a.json", "boom");
        assert!(err.is_recoverable());
        assert!(!err.is_overflow());
        assert_eq!(err.to_string(), "handler failed for /drop/a.json: boom");
    }

    #[test]
    fn test_non_utf8_is_recoverable() {
        let err = WatchError::NonUtf8Path(PathBuf::from("test"));
        assert!(err.is_recoverable());
        assert!(err.path().is_none());
    }

    #[test]
    fn test_io_is_fatal() {
        let err = WatchError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_fault_display() {
        let err = WatchError::SourceOverflow(Utf8PathBuf::from("/drop/Output"));
        let fault = WatchFault::new("/drop/Output", &err);
        assert!(fault.to_string().starts_with("watcher for /drop/Output faulted"));
    }
}
