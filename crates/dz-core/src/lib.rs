//! Core types, configuration, and utilities for the dropzone integration bus.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`Config`] and its sections, loaded from a JSON settings file
//! - [`ConfigError`] for configuration failures that must abort startup
//! - [`DropLayout`] describing the `Input/` and `Output/` directory contract
//! - Domain types ([`WatchTarget`], [`ProcessingOutcome`])
//! - `FxHashSet` alias (faster than std for path keys)
//!
//! # Crate Dependencies
//!
//! ```text
//! dz-cli ──► dz-bus ──► dz-watcher ──► dz-core
//!                  └───────────────────►
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod layout;
pub mod types;

pub use config::{Config, FeatureFlags, IntegrationConfig, WatchConfig};
pub use error::ConfigError;
pub use hash::FxHashSet;
pub use layout::DropLayout;
pub use types::{ProcessingOutcome, WatchTarget};
