// src/error.rs

//! Unified error handling for the feed store.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for feed store operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Feed payload could not be parsed
    #[error("Feed parse error: {0}")]
    Feed(#[from] rss::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The store could not be written to disk
    #[error("Failed to persist store to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A fetch task failed outside of the request itself
    #[error("Fetch error for {source_id}: {message}")]
    Fetch { source_id: String, message: String },

    /// Scheduler misuse
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error with context.
    pub fn fetch(source_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a scheduler error.
    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::Scheduler(message.into())
    }

    /// Whether durability of the store can no longer be guaranteed.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persist { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_classification() {
        let err = AppError::Persist {
            path: PathBuf::from("/tmp/feeds.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.is_persistence());
        assert!(err.to_string().contains("/tmp/feeds.json"));

        let err = AppError::Status {
            url: "https://example.com/feed".to_string(),
            status: 503,
        };
        assert!(!err.is_persistence());
        assert_eq!(err.to_string(), "HTTP 503 from https://example.com/feed");
    }

    #[test]
    fn test_fetch_helper() {
        let err = AppError::fetch("https://example.com/rss", "task panicked");
        assert_eq!(
            err.to_string(),
            "Fetch error for https://example.com/rss: task panicked"
        );
    }
}
