//! Watch target description.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Filter used when no pattern is configured.
pub const DEFAULT_FILTER: &str = "*.json";

/// A directory to monitor together with how to monitor it.
///
/// Built once from configuration when the service starts and immutable for
/// the lifetime of the watcher that owns it.
///
/// # Examples
///
/// ```
/// use dz_core::WatchTarget;
///
/// let target = WatchTarget::new("/srv/drop/Output")
///     .with_filters(["*.json", "*.xml"])
///     .recursive(false);
/// assert_eq!(target.filters.len(), 2);
/// assert!(target.replay_existing);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTarget {
    /// Root directory to watch.
    pub root: Utf8PathBuf,

    /// Glob patterns a file name must match (any of them).
    pub filters: SmallVec<[String; 2]>,

    /// Whether subdirectories are watched as well.
    pub recurse: bool,

    /// Whether files already present at start are replayed as `Existing` events.
    pub replay_existing: bool,

    /// Whether replayed files are delivered oldest-modified first.
    pub order_by_oldest_first: bool,
}

impl WatchTarget {
    /// Creates a non-recursive target for `*.json` files with replay enabled.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            filters: SmallVec::from_iter([DEFAULT_FILTER.to_owned()]),
            recurse: false,
            replay_existing: true,
            order_by_oldest_first: true,
        }
    }

    /// Replaces the filter patterns. An empty list keeps the default filter.
    #[must_use]
    pub fn with_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filters: SmallVec<[String; 2]> = filters
            .into_iter()
            .map(Into::into)
            .filter(|f| !f.trim().is_empty())
            .collect();
        if !filters.is_empty() {
            self.filters = filters;
        }
        self
    }

    /// Sets whether subdirectories are watched.
    #[must_use]
    pub const fn recursive(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    /// Sets whether existing files are replayed on start.
    #[must_use]
    pub const fn replay_existing(mut self, replay: bool) -> Self {
        self.replay_existing = replay;
        self
    }

    /// Sets whether replayed files are ordered oldest first.
    #[must_use]
    pub const fn order_by_oldest_first(mut self, oldest_first: bool) -> Self {
        self.order_by_oldest_first = oldest_first;
        self
    }

    /// Returns the watched root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

/// Splits a `;` or `,` separated filter list into individual patterns.
///
/// ```
/// use dz_core::types::split_filters;
///
/// assert_eq!(split_filters("*.json; *.xml"), vec!["*.json", "*.xml"]);
/// assert!(split_filters(" ").is_empty());
/// ```
#[must_use]
pub fn split_filters(raw: &str) -> Vec<String> {
    raw.split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
