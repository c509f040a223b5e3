//! Processing outcome types.
//!
//! This module provides the [`ProcessingOutcome`] enum that drives where a
//! file ends up once the orchestrator is done with it.

use serde::{Deserialize, Serialize};

/// The result of processing one file event.
///
/// Computed once per event and never persisted: the file's final location
/// is the only durable record of the outcome.
///
/// # Examples
///
/// ```
/// use dz_core::ProcessingOutcome;
///
/// assert_eq!(ProcessingOutcome::Success.terminal_dir_name(), Some("done"));
/// assert_eq!(ProcessingOutcome::Failure.terminal_dir_name(), Some("error"));
/// assert_eq!(ProcessingOutcome::Skipped.terminal_dir_name(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingOutcome {
    /// The handler completed and the file moves to `done/`.
    Success,

    /// Something broke along the way and the file moves to `error/`.
    Failure,

    /// The file was intentionally not handled and stays where it is.
    ///
    /// Covers disabled message types, unknown message types, and duplicate
    /// notifications for a file that is already claimed or already moved.
    Skipped,
}

impl ProcessingOutcome {
    /// Name of the terminal subdirectory for this outcome, if it relocates.
    #[inline]
    #[must_use]
    pub const fn terminal_dir_name(self) -> Option<&'static str> {
        match self {
            Self::Success => Some(crate::layout::DONE_DIR),
            Self::Failure => Some(crate::layout::ERROR_DIR),
            Self::Skipped => None,
        }
    }

    /// Returns a short human-readable label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ProcessingOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_skipped_stays_in_place() {
        assert!(ProcessingOutcome::Success.terminal_dir_name().is_some());
        assert!(ProcessingOutcome::Failure.terminal_dir_name().is_some());
        assert!(ProcessingOutcome::Skipped.terminal_dir_name().is_none());
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_string(&ProcessingOutcome::Skipped).unwrap(),
            r#""skipped""#
        );
        assert_eq!(ProcessingOutcome::Failure.to_string(), "failure");
    }
}
