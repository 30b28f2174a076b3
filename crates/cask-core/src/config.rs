//! Cask configuration.
//!
//! Provides [`CaskConfig`] for tuning the storage spillover threshold and
//! the batch engine. Values can be loaded from `CASK_`-prefixed environment
//! variables via [`CaskConfig::from_env`].

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Cask core configuration.
///
/// All fields have sensible defaults for in-process use. Configuration can
/// be loaded from environment variables via [`CaskConfig::from_env`].
///
/// # Examples
///
/// ```
/// use cask_core::config::CaskConfig;
///
/// let config = CaskConfig::default();
/// assert_eq!(config.batch_workers, 4);
/// assert_eq!(config.max_memory_object_size, 524_288);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct CaskConfig {
    /// Maximum object size (in bytes) kept entirely in memory before spilling to disk.
    #[builder(default = 524_288)]
    pub max_memory_object_size: usize,

    /// Number of worker tasks draining the batch job queue.
    #[builder(default = 4)]
    pub batch_workers: usize,

    /// Capacity of the batch job queue; submissions wait when it is full.
    #[builder(default = 1024)]
    pub batch_queue_depth: usize,

    /// Maximum number of per-item errors retained on a batch operation record.
    #[builder(default = 1000)]
    pub max_batch_errors: usize,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for CaskConfig {
    fn default() -> Self {
        Self {
            max_memory_object_size: 524_288,
            batch_workers: 4,
            batch_queue_depth: 1024,
            max_batch_errors: 1000,
            log_level: String::from("info"),
        }
    }
}

impl CaskConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `CASK_MAX_MEMORY_OBJECT_SIZE` | `524288` |
    /// | `CASK_BATCH_WORKERS` | `4` |
    /// | `CASK_BATCH_QUEUE_DEPTH` | `1024` |
    /// | `CASK_MAX_BATCH_ERRORS` | `1000` |
    /// | `CASK_LOG_LEVEL` | `info` |
    ///
    /// # Examples
    ///
    /// ```
    /// use cask_core::config::CaskConfig;
    ///
    /// let config = CaskConfig::from_env();
    /// assert!(config.batch_workers > 0);
    /// ```
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("CASK_MAX_MEMORY_OBJECT_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                config.max_memory_object_size = n;
            }
        }
        if let Ok(v) = std::env::var("CASK_BATCH_WORKERS") {
            if let Ok(n) = v.parse::<usize>() {
                config.batch_workers = n.max(1);
            }
        }
        if let Ok(v) = std::env::var("CASK_BATCH_QUEUE_DEPTH") {
            if let Ok(n) = v.parse::<usize>() {
                config.batch_queue_depth = n.max(1);
            }
        }
        if let Ok(v) = std::env::var("CASK_MAX_BATCH_ERRORS") {
            if let Ok(n) = v.parse::<usize>() {
                config.max_batch_errors = n;
            }
        }
        if let Ok(v) = std::env::var("CASK_LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }
}
