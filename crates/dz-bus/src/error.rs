//! Error types for the dz-bus crate.
//!
//! Every per-file error ends inside the orchestrator, where it is mapped to a
//! [`ProcessingOutcome`](dz_core::ProcessingOutcome). None of them reach the
//! watcher.

use std::io;

use camino::Utf8PathBuf;

/// Errors from the exclusive-open probe.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The file vanished before it could be probed.
    #[error("file not found: {0}")]
    NotFound(Utf8PathBuf),

    /// Opening failed for a reason that retrying will not fix.
    #[error("cannot open {path}: {source}")]
    Io {
        /// File being probed.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Shutdown was requested while waiting for the file.
    #[error("gave up waiting for {0}: shutting down")]
    Cancelled(Utf8PathBuf),
}

/// Errors from [`move_to_directory`](crate::move_to_directory).
#[derive(Debug, thiserror::Error)]
pub enum RelocateError {
    /// The source no longer exists, usually because a racing move won.
    #[error("source file not found: {0}")]
    SourceNotFound(Utf8PathBuf),

    /// The source path has no file name component.
    #[error("source path has no file name: {0}")]
    NoFileName(Utf8PathBuf),

    /// The copy did not end up the same length as the source.
    #[error("incomplete copy to {path}: expected {expected} bytes, wrote {written}")]
    Incomplete {
        /// Destination that was removed again.
        path: Utf8PathBuf,
        /// Source length.
        expected: u64,
        /// Bytes copied.
        written: u64,
    },

    /// An I/O operation failed.
    #[error("I/O error relocating {path}: {source}")]
    Io {
        /// Path the failing operation was applied to.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl RelocateError {
    pub(crate) fn io(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors a [`RequestHandler`](crate::RequestHandler) may return.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The message decoded but is unusable.
    #[error("invalid {message_type}: {reason}")]
    InvalidMessage {
        /// Message type tag.
        message_type: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The handler's downstream work failed.
    #[error("handler failed: {0}")]
    Failed(String),
}

/// Errors that turn a file's outcome into a failure.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The file could not be opened exclusively.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The request could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The request is not valid JSON for its pipeline.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// File being parsed.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The companion archive could not be read.
    #[error("cannot read archive {path}: {source}")]
    Archive {
        /// Archive path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: zip::result::ZipError,
    },

    /// The handler rejected or failed the request.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The response could not be written to the inbound directory.
    #[error("cannot write response to {dir}: {source}")]
    Respond {
        /// Inbound directory.
        dir: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The file could not be moved to its terminal directory.
    #[error(transparent)]
    Relocate(#[from] RelocateError),

    /// A blocking task died before finishing.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
