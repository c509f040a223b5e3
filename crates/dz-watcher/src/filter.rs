//! File filtering for watch events.
//!
//! Events are filtered in the change source callback, before they reach the
//! bounded queue, so files nobody cares about never count against capacity.
//!
//! # Examples
//!
//! ```
//! use dz_watcher::{FileFilter, GlobFilter};
//! use camino::Utf8Path;
//!
//! let filter = GlobFilter::new(Utf8Path::new("/drop/Output"), &["*.json"]).unwrap();
//!
//! assert!(filter.should_process(Utf8Path::new("/drop/Output/order.json")));
//! assert!(!filter.should_process(Utf8Path::new("/drop/Output/order.zip")));
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use ignore::overrides::{Override, OverrideBuilder};
use smallvec::SmallVec;

use crate::error::WatchError;

/// A filter for determining which file events to process.
///
/// Filters must be [`Send`] and [`Sync`] because they run on the change
/// source's callback thread and on the replay thread.
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if the file at the given path should be processed.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// A filter that accepts all files.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl FileFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _path: &Utf8Path) -> bool {
        true
    }
}

/// Matches file names against one or more glob patterns.
///
/// Patterns follow gitignore glob syntax relative to the watch root: a
/// pattern without a slash (`*.json`) matches the file name at any depth.
/// Matching is case-insensitive, like the drop-zone producers expect.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    root: Utf8PathBuf,
    patterns: SmallVec<[String; 2]>,
    overrides: Override,
}

impl GlobFilter {
    /// Compiles `patterns` relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidFilter`] if a pattern is not a valid glob.
    pub fn new<S: AsRef<str>>(root: &Utf8Path, patterns: &[S]) -> Result<Self, WatchError> {
        let mut builder = OverrideBuilder::new(root.as_std_path());
        builder.case_insensitive(true)?;
        for pattern in patterns {
            builder.add(pattern.as_ref())?;
        }

        Ok(Self {
            root: root.to_owned(),
            patterns: patterns.iter().map(|p| p.as_ref().to_owned()).collect(),
            overrides: builder.build()?,
        })
    }

    /// Returns the compiled patterns.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns the root the patterns are relative to.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl FileFilter for GlobFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        self.overrides
            .matched(path.as_std_path(), false)
            .is_whitelist()
    }
}
