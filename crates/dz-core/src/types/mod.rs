//! Domain types shared by the watcher and the orchestration layer.
//!
//! - [`target`] - What a single buffered watcher monitors
//! - [`outcome`] - The tri-state result recorded for every processed file

mod outcome;
mod target;

pub use outcome::ProcessingOutcome;
pub use target::{split_filters, WatchTarget, DEFAULT_FILTER};
