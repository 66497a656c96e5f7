// src/pipeline/validate.rs

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load and check the configuration at `path`.
pub fn run_validate(path: &Path) -> Result<Config> {
    log::info!("Validating {}", path.display());

    let config = Config::load(path).and_then(|config| {
        config.validate()?;
        Ok(config)
    });

    match config {
        Ok(config) => {
            log::info!("Configuration OK");
            log::info!("  store: {}", config.store.file_name);
            log::info!("  max items per source: {}", config.store.max_items);
            log::info!("  user agent: {}", config.fetcher.user_agent);
            log::info!("  timeout: {}s", config.fetcher.timeout_secs);
            log::info!("  max concurrent: {}", config.fetcher.max_concurrent);
            log::info!("  feeds: {}", config.feeds.len());
            Ok(config)
        }
        Err(e) => {
            log::error!("Validation failed: {}", e);
            Err(e)
        }
    }
}
