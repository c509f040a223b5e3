//! Directory layout shared with the external producer.
//!
//! ```text
//! <root>/Input/                        responses written by this system
//! <root>/Output/                       requests dropped by the producer
//! <root>/Output/Processing|Processed|Error/   legacy outcome directories
//! <root>/Output/<dir>/done/            per-directory Success placement
//! <root>/Output/<dir>/error/           per-directory Failure placement
//! ```

use std::io;

use camino::{Utf8Path, Utf8PathBuf};

/// Subdirectory that receives successfully processed files.
pub const DONE_DIR: &str = "done";

/// Subdirectory that receives files whose processing failed.
pub const ERROR_DIR: &str = "error";

/// Producer-inbound directory name.
pub const INPUT_DIR: &str = "Input";

/// System-inbound directory name.
pub const OUTPUT_DIR: &str = "Output";

const LEGACY_DIRS: [&str; 3] = ["Processing", "Processed", "Error"];

/// Resolves every directory of the drop-zone contract from one root.
///
/// # Examples
///
/// ```
/// use dz_core::DropLayout;
/// use camino::Utf8Path;
///
/// let layout = DropLayout::new("/srv/drop");
/// assert_eq!(layout.input_dir(), "/srv/drop/Input");
/// assert_eq!(
///     layout.done_dir_for(Utf8Path::new("/srv/drop/Output/order.json")),
///     "/srv/drop/Output/done"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropLayout {
    root: Utf8PathBuf,
}

impl DropLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory the producer picks responses up from.
    #[must_use]
    pub fn input_dir(&self) -> Utf8PathBuf {
        self.root.join(INPUT_DIR)
    }

    /// Directory the producer drops requests into.
    #[must_use]
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Output directory of a named integration sub-root.
    #[must_use]
    pub fn integration_output_dir(&self, integration: &str) -> Utf8PathBuf {
        self.root.join(integration).join(OUTPUT_DIR)
    }

    /// Legacy `Output/Processing` directory.
    #[must_use]
    pub fn processing_dir(&self) -> Utf8PathBuf {
        self.output_dir().join(LEGACY_DIRS[0])
    }

    /// Legacy `Output/Processed` directory.
    #[must_use]
    pub fn processed_dir(&self) -> Utf8PathBuf {
        self.output_dir().join(LEGACY_DIRS[1])
    }

    /// Legacy `Output/Error` directory.
    #[must_use]
    pub fn error_dir(&self) -> Utf8PathBuf {
        self.output_dir().join(LEGACY_DIRS[2])
    }

    /// Inbound directory that answers a request found at `event_path`.
    ///
    /// The nearest `Output` ancestor under the root decides: a request from
    /// `<x>/Output/...` is answered in `<x>/Input`. Paths outside any
    /// `Output` directory fall back to [`input_dir`](Self::input_dir).
    #[must_use]
    pub fn input_dir_for(&self, event_path: &Utf8Path) -> Utf8PathBuf {
        event_path
            .ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(&self.root))
            .find(|dir| dir.file_name() == Some(OUTPUT_DIR))
            .and_then(Utf8Path::parent)
            .map_or_else(|| self.input_dir(), |owner| owner.join(INPUT_DIR))
    }

    /// `done/` directory next to the given event path.
    #[must_use]
    pub fn done_dir_for(&self, event_path: &Utf8Path) -> Utf8PathBuf {
        sibling_dir(event_path, DONE_DIR)
    }

    /// `error/` directory next to the given event path.
    #[must_use]
    pub fn error_dir_for(&self, event_path: &Utf8Path) -> Utf8PathBuf {
        sibling_dir(event_path, ERROR_DIR)
    }

    /// Creates `Input/`, `Output/` and the legacy outcome directories.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if a directory cannot be created.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.input_dir())?;
        std::fs::create_dir_all(self.output_dir())?;
        for dir in [self.processing_dir(), self.processed_dir(), self.error_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Returns `true` if the path already sits in a terminal directory.
///
/// Recursive watches see their own relocations; this keeps them from being
/// processed a second time.
///
/// ```
/// use dz_core::layout::is_terminal_path;
/// use camino::Utf8Path;
///
/// assert!(is_terminal_path(Utf8Path::new("/drop/Output/done/a.json")));
/// assert!(!is_terminal_path(Utf8Path::new("/drop/Output/a.json")));
/// ```
#[must_use]
pub fn is_terminal_path(path: &Utf8Path) -> bool {
    path.parent()
        .and_then(Utf8Path::file_name)
        .is_some_and(|dir| dir == DONE_DIR || dir == ERROR_DIR)
}

fn sibling_dir(event_path: &Utf8Path, name: &str) -> Utf8PathBuf {
    event_path
        .parent()
        .map_or_else(|| Utf8PathBuf::from(name), |parent| parent.join(name))
}
