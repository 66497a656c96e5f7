//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RetentionPolicy;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Item store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP and fetching behavior settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Periodic batch fetching settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Feed URLs used when none are given on the command line
    #[serde(default = "defaults::feeds")]
    pub feeds: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.store.file_name.trim().is_empty() {
            return Err(AppError::validation("store.file_name is empty"));
        }
        if self.store.max_items == 0 {
            return Err(AppError::validation("store.max_items must be > 0"));
        }
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.fetcher.max_concurrent == 0 {
            return Err(AppError::validation("fetcher.max_concurrent must be > 0"));
        }
        if self.scheduler.batch_size == 0 {
            return Err(AppError::validation("scheduler.batch_size must be > 0"));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(AppError::validation("scheduler.interval_secs must be > 0"));
        }
        for feed in &self.feeds {
            let url = url::Url::parse(feed)
                .map_err(|e| AppError::validation(format!("invalid feed URL {feed:?}: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AppError::validation(format!(
                    "unsupported scheme for feed {feed:?}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            fetcher: FetcherConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
            feeds: defaults::feeds(),
        }
    }
}

/// On-disk store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// File name of the store inside the storage directory
    #[serde(default = "defaults::file_name")]
    pub file_name: String,

    /// Items kept per source
    #[serde(default = "defaults::max_items")]
    pub max_items: usize,

    /// Drop items published longer ago than this (0 disables)
    #[serde(default)]
    pub max_age_secs: u64,
}

impl StoreConfig {
    pub fn path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.file_name)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.max_items, Some(Duration::from_secs(self.max_age_secs)))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file_name: defaults::file_name(),
            max_items: defaults::max_items(),
            max_age_secs: 0,
        }
    }
}

/// HTTP client and fetching behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent fetches
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Deadline for a whole update run in seconds (0 disables)
    #[serde(default = "defaults::deadline")]
    pub deadline_secs: u64,
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            deadline_secs: defaults::deadline(),
        }
    }
}

/// Batch scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Sources fetched per sub-batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Pause between sub-batches in milliseconds
    #[serde(default = "defaults::batch_pause")]
    pub batch_pause_ms: u64,

    /// Seconds between full passes
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl SchedulerConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            batch_pause_ms: defaults::batch_pause(),
            interval_secs: defaults::interval(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Store defaults
    pub fn file_name() -> String {
        "feeds.json".into()
    }
    pub fn max_items() -> usize {
        100
    }

    // Fetcher defaults
    pub fn user_agent() -> String {
        format!("feedstore/{}", env!("CARGO_PKG_VERSION"))
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn deadline() -> u64 {
        60
    }

    // Scheduler defaults
    pub fn batch_size() -> usize {
        10
    }
    pub fn batch_pause() -> u64 {
        100
    }
    pub fn interval() -> u64 {
        15 * 60
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn feeds() -> Vec<String> {
        vec!["https://blog.rust-lang.org/feed.xml".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.fetcher.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_retention() {
        let mut config = Config::default();
        config.store.max_items = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_feed_urls() {
        let mut config = Config::default();
        config.feeds = vec!["not a url".to_string()];
        assert!(config.validate().is_err());

        config.feeds = vec!["ftp://example.com/feed".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            feeds = ["https://example.com/a.xml", "https://example.com/b.xml"]

            [store]
            max_items = 20
            max_age_secs = 86400

            [scheduler]
            batch_size = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.store.file_name, "feeds.json");
        assert_eq!(config.store.retention().max_items, 20);
        assert_eq!(
            config.store.retention().max_age,
            Some(Duration::from_secs(86_400))
        );
        assert_eq!(config.fetcher.max_concurrent, 5);
        assert_eq!(config.scheduler.batch_size, 2);
        assert_eq!(config.scheduler.interval(), Duration::from_secs(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_is_an_error_and_defaults_hold() {
        assert!(Config::load("/definitely/not/here/config.toml").is_err());
        let config = Config::default();
        assert_eq!(config.store.max_items, 100);
        assert_eq!(config.fetcher.deadline(), Some(Duration::from_secs(60)));
    }
}
