//! Configuration structures for the dropzone integration bus.
//!
//! This module provides configuration types for all components:
//!
//! - [`IntegrationConfig`] - Root directory, watch overrides, concurrency
//! - [`WatchConfig`] - Queue capacity, replay and access-retry behaviour
//! - [`FeatureFlags`] - Which message types are actually handled
//! - [`Config`] - Root configuration combining all settings
//!
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! values it changes. The one setting without a usable default is
//! `integration.root_directory`, which [`Config::validate`] enforces.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::layout::DropLayout;
use crate::types::{split_filters, WatchTarget, DEFAULT_FILTER};

/// Integration-level settings.
///
/// # Examples
///
/// ```
/// use dz_core::IntegrationConfig;
///
/// let config = IntegrationConfig::default();
/// assert_eq!(config.effective_concurrency(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Root directory containing `Input/`, `Output/` and integration sub-roots.
    pub root_directory: Utf8PathBuf,

    /// Overrides the watched directory. Relative paths resolve against the root.
    pub watch_directory: Option<Utf8PathBuf>,

    /// Overrides the watch filter; `;` or `,` separated glob patterns.
    pub watch_filter: Option<String>,

    /// Number of files processed concurrently. Values ≤ 1 mean 1.
    pub concurrency: usize,

    /// Named integration sub-roots whose `Output/` is watched when present.
    pub integration_directories: Vec<String>,
}

impl IntegrationConfig {
    /// Concurrency clamped to at least one slot.
    #[inline]
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Filter patterns after applying the override.
    #[must_use]
    pub fn filters(&self) -> Vec<String> {
        let filters = self
            .watch_filter
            .as_deref()
            .map(split_filters)
            .unwrap_or_default();
        if filters.is_empty() {
            vec![DEFAULT_FILTER.to_owned()]
        } else {
            filters
        }
    }
}

/// Buffered watcher and orchestrator behaviour.
///
/// # Examples
///
/// ```
/// use dz_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert_eq!(config.access_retry_interval_ms, 5000);
/// assert!(config.replay_existing);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Capacity of each watcher's event queue.
    pub queue_capacity: usize,

    /// Whether subdirectories are watched.
    pub recursive: bool,

    /// Whether files present at start are replayed.
    pub replay_existing: bool,

    /// Whether replayed files are delivered oldest first.
    pub order_by_oldest_first: bool,

    /// Delay between exclusive-open attempts on a locked file.
    pub access_retry_interval_ms: u64,

    /// Retry count after which a locked file is logged at warn level.
    pub access_retry_warn_after: u32,

    /// Whether a queue overflow stops the whole service.
    pub shutdown_on_overflow: bool,
}

impl WatchConfig {
    /// Access retry interval as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn access_retry_interval(&self) -> Duration {
        Duration::from_millis(self.access_retry_interval_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            recursive: false,
            replay_existing: true,
            order_by_oldest_first: true,
            access_retry_interval_ms: 5000,
            access_retry_warn_after: 24,
            shutdown_on_overflow: true,
        }
    }
}

/// Per message type enable flags.
///
/// A disabled type is reported as skipped and its file stays in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureFlags {
    /// `RequestAddressBookSyncMessage`.
    pub address_book_sync: bool,
    /// `RequestArticlesSyncMessage`.
    pub article_sync: bool,
    /// `RequestAdditionalCostsOfPartTypeMessage`.
    pub additional_costs_of_part_type: bool,
    /// `RequestProductionTimeEstimationOfPartTypeMessage`.
    pub production_time_estimation_of_part_type: bool,
    /// `RequestSellingBuyingPartyArticleMessage`.
    pub selling_buying_party_article: bool,
    /// `ProjectStatusChangedMessage`.
    pub project_status_changed: bool,
    /// Project export pairs (`*.json` + `*.zip`).
    pub project_files: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            address_book_sync: false,
            article_sync: false,
            additional_costs_of_part_type: false,
            production_time_estimation_of_part_type: false,
            selling_buying_party_article: false,
            project_status_changed: false,
            project_files: true,
        }
    }
}

/// Root configuration.
///
/// # Examples
///
/// ```
/// use dz_core::Config;
///
/// let config: Config = serde_json::from_str(
///     r#"{"integration": {"root_directory": "/srv/drop", "concurrency": 4}}"#,
/// ).unwrap();
/// assert!(config.validate().is_ok());
/// assert_eq!(config.integration.effective_concurrency(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Integration settings.
    pub integration: IntegrationConfig,

    /// Watcher settings.
    pub watch: WatchConfig,

    /// Message type enable flags.
    pub features: FeatureFlags,
}

impl Config {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid JSON for this schema.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Checks settings that have no usable default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingOption`] when the root directory is
    /// unset and [`ConfigError::InvalidOption`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.integration.root_directory.as_str().trim().is_empty() {
            return Err(ConfigError::MissingOption("integration.root_directory"));
        }
        if self.watch.queue_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "watch.queue_capacity",
                "must be at least 1",
            ));
        }
        if self.watch.access_retry_interval_ms == 0 {
            return Err(ConfigError::invalid_option(
                "watch.access_retry_interval_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Directory layout rooted at the configured root directory.
    #[must_use]
    pub fn layout(&self) -> DropLayout {
        DropLayout::new(self.integration.root_directory.clone())
    }

    /// Primary watched directory after applying the override.
    #[must_use]
    pub fn watch_directory(&self) -> Utf8PathBuf {
        match &self.integration.watch_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.integration.root_directory.join(dir),
            None => self.layout().output_dir(),
        }
    }

    /// Every directory to watch.
    ///
    /// The primary watch directory always comes first. Integration sub-roots
    /// are included only when their `Output/` directory exists.
    #[must_use]
    pub fn watch_targets(&self) -> Vec<WatchTarget> {
        let layout = self.layout();
        let filters = self.integration.filters();
        let primary = self.watch_directory();

        std::iter::once(primary.clone())
            .chain(
                self.integration
                    .integration_directories
                    .iter()
                    .map(|name| layout.integration_output_dir(name))
                    .filter(|dir| dir.is_dir() && *dir != primary),
            )
            .map(|root| {
                WatchTarget::new(root)
                    .with_filters(filters.iter().cloned())
                    .recursive(self.watch.recursive)
                    .replay_existing(self.watch.replay_existing)
                    .order_by_oldest_first(self.watch.order_by_oldest_first)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_watch_config_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.queue_capacity, 4096);
        assert_eq!(config.access_retry_warn_after, 24);
        assert_eq!(config.access_retry_interval(), Duration::from_secs(5));
        assert!(!config.recursive);
    }

    #[test]
    fn test_feature_defaults() {
        let flags = FeatureFlags::default();
        assert!(flags.project_files);
        assert!(!flags.address_book_sync);
    }

    #[test]
    fn test_concurrency_clamped() {
        let mut config = IntegrationConfig::default();
        assert_eq!(config.effective_concurrency(), 1);
        config.concurrency = 0;
        assert_eq!(config.effective_concurrency(), 1);
        config.concurrency = 8;
        assert_eq!(config.effective_concurrency(), 8);
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingOption("integration.root_directory"))
        ));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let mut config = Config::default();
        config.integration.root_directory = Utf8PathBuf::from("/drop");
        config.watch.queue_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"integration": {"root_directory": "/drop"}, "features": {"article_sync": true}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.integration.root_directory, "/drop");
        assert!(config.features.article_sync);
        assert!(config.features.project_files);
        assert_eq!(config.watch.queue_capacity, 4096);
    }

    #[test]
    fn test_watch_directory_override() {
        let mut config = Config::default();
        config.integration.root_directory = Utf8PathBuf::from("/drop");
        assert_eq!(config.watch_directory(), "/drop/Output");

        config.integration.watch_directory = Some(Utf8PathBuf::from("Custom/Out"));
        assert_eq!(config.watch_directory(), "/drop/Custom/Out");

        config.integration.watch_directory = Some(Utf8PathBuf::from("/elsewhere"));
        assert_eq!(config.watch_directory(), "/elsewhere");
    }

    #[test]
    fn test_filter_override() {
        let mut config = IntegrationConfig::default();
        assert_eq!(config.filters(), vec!["*.json"]);
        config.watch_filter = Some("*.xml;*.json".to_owned());
        assert_eq!(config.filters(), vec!["*.xml", "*.json"]);
        config.watch_filter = Some(String::new());
        assert_eq!(config.filters(), vec!["*.json"]);
    }

    #[test]
    fn test_watch_targets_include_existing_integrations_only() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("MKG5").join("Output")).unwrap();

        let mut config = Config::default();
        config.integration.root_directory = root.clone();
        config.integration.integration_directories = vec!["MKG5".to_owned(), "Ridder IQ".to_owned()];
        config.watch.recursive = true;

        let targets = config.watch_targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].root, root.join("Output"));
        assert_eq!(targets[1].root, root.join("MKG5").join("Output"));
        assert!(targets.iter().all(|t| t.recurse));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("settings.json")).unwrap();
        std::fs::write(&path, r#"{"integration": {"root_directory": "/drop"}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.integration.root_directory, "/drop");

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }
}
