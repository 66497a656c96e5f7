// src/utils/http.rs

//! HTTP client utilities.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::FetcherConfig;

/// Create a configured asynchronous HTTP client.
///
/// Every request carries the configured User-Agent, the `accept` hint and
/// the per-request timeout.
pub fn create_async_client(config: &FetcherConfig, accept: &str) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    let accept = HeaderValue::from_str(accept)
        .map_err(|e| AppError::config(format!("invalid Accept header {accept:?}: {e}")))?;
    headers.insert(ACCEPT, accept);

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client() {
        let config = FetcherConfig::default();
        assert!(create_async_client(&config, "application/rss+xml").is_ok());
    }

    #[test]
    fn test_rejects_invalid_accept() {
        let config = FetcherConfig::default();
        assert!(create_async_client(&config, "bad\nheader").is_err());
    }
}
