//! Utility functions and helpers.

pub mod cancel;
pub mod date;
pub mod http;
pub mod text;

use url::Url;

/// Resolve a potentially relative URL against a base URL string.
///
/// Returns `href` unchanged when either side cannot be parsed.
pub fn resolve_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
