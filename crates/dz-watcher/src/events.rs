//! Event types for file change notifications.
//!
//! # Event Flow
//!
//! ```text
//!  notify callback ──► ChangeEvent ──► EventSink::push ──► bounded queue
//!                                                              │
//!  existing-file replay ──► ChangeEvent (Existing) ──┐         │
//!                                                    ▼         ▼
//!                                              drain loop ──► subscribers
//! ```

use std::time::Instant;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A file appeared (created, or moved in from elsewhere).
    Created,
    /// A file's content or metadata changed.
    Changed,
    /// A file was removed or moved away.
    Deleted,
    /// A file was renamed within the watched tree.
    Renamed,
    /// A file was already present when watching started.
    Existing,
}

impl ChangeKind {
    /// Returns a short label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Changed => "changed",
            Self::Deleted => "deleted",
            Self::Renamed => "renamed",
            Self::Existing => "existing",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single change notification with a UTF-8 path guarantee.
///
/// # Examples
///
/// ```
/// use dz_watcher::{ChangeEvent, ChangeKind};
/// use camino::Utf8PathBuf;
///
/// let event = ChangeEvent::created(Utf8PathBuf::from("/drop/Output/order.json"));
/// assert_eq!(event.kind, ChangeKind::Created);
/// assert!(event.is_arrival());
/// assert_eq!(event.file_name(), Some("order.json"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened.
    pub kind: ChangeKind,

    /// Absolute path of the affected file (the new name for renames).
    pub path: Utf8PathBuf,

    /// Previous path, only set for [`ChangeKind::Renamed`].
    pub old_path: Option<Utf8PathBuf>,

    /// When the notification was received or synthesized.
    pub timestamp: Instant,
}

impl ChangeEvent {
    /// Creates an event of the given kind stamped with the current instant.
    #[must_use]
    pub fn new(kind: ChangeKind, path: Utf8PathBuf) -> Self {
        Self {
            kind,
            path,
            old_path: None,
            timestamp: Instant::now(),
        }
    }

    /// Creates a [`ChangeKind::Created`] event.
    #[inline]
    #[must_use]
    pub fn created(path: Utf8PathBuf) -> Self {
        Self::new(ChangeKind::Created, path)
    }

    /// Creates a [`ChangeKind::Changed`] event.
    #[inline]
    #[must_use]
    pub fn changed(path: Utf8PathBuf) -> Self {
        Self::new(ChangeKind::Changed, path)
    }

    /// Creates a [`ChangeKind::Deleted`] event.
    #[inline]
    #[must_use]
    pub fn deleted(path: Utf8PathBuf) -> Self {
        Self::new(ChangeKind::Deleted, path)
    }

    /// Creates a [`ChangeKind::Existing`] event.
    #[inline]
    #[must_use]
    pub fn existing(path: Utf8PathBuf) -> Self {
        Self::new(ChangeKind::Existing, path)
    }

    /// Creates a [`ChangeKind::Renamed`] event.
    #[must_use]
    pub fn renamed(old_path: Utf8PathBuf, path: Utf8PathBuf) -> Self {
        Self {
            old_path: Some(old_path),
            ..Self::new(ChangeKind::Renamed, path)
        }
    }

    /// Returns `true` if a new file is available at [`path`](Self::path).
    ///
    /// Only arrivals are candidates for processing.
    #[inline]
    #[must_use]
    pub const fn is_arrival(&self) -> bool {
        matches!(self.kind, ChangeKind::Created | ChangeKind::Existing)
    }

    /// Returns the file name without the directory path.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrivals() {
        let path = Utf8PathBuf::from("/drop/a.json");
        assert!(ChangeEvent::created(path.clone()).is_arrival());
        assert!(ChangeEvent::existing(path.clone()).is_arrival());
        assert!(!ChangeEvent::changed(path.clone()).is_arrival());
        assert!(!ChangeEvent::deleted(path.clone()).is_arrival());
        assert!(!ChangeEvent::renamed(Utf8PathBuf::from("/drop/a.tmp"), path).is_arrival());
    }

    #[test]
    fn test_renamed_keeps_old_path() {
        let event = ChangeEvent::renamed(
            Utf8PathBuf::from("/drop/a.tmp"),
            Utf8PathBuf::from("/drop/a.json"),
        );
        assert_eq!(event.kind, ChangeKind::Renamed);
        assert_eq!(event.old_path.as_deref().map(|p| p.as_str()), Some("/drop/a.tmp"));
        assert_eq!(event.path, "/drop/a.json");
    }

    #[test]
    fn test_only_renames_carry_old_path() {
        assert!(ChangeEvent::created(Utf8PathBuf::from("a")).old_path.is_none());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ChangeKind::Existing.to_string(), "existing");
        assert_eq!(ChangeKind::Renamed.label(), "renamed");
    }
}
