//! Storage abstractions for feed item persistence.
//!
//! The store keeps one bucket per source, keyed by the source's fetch URL.
//! Every bucket is ordered ascending by publication time, deduplicated by
//! item id and capped to the configured retention.
//!
//! ## File Layout
//!
//! ```text
//! {storage_dir}/
//! ├── config.toml           # Application configuration
//! └── feeds.json            # { "<source url>": { "items": [...], "meta": {...} } }
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{FeedItem, FeedMeta, FlagUpdate, ListQuery};

pub use local::LocalStore;

/// Trait for feed item storage backends.
///
/// Reads return copies; callers never see the underlying buckets.
#[async_trait]
pub trait ItemStorage: Send + Sync {
    /// Merge `items` into the bucket of `source_id` and persist.
    ///
    /// Returns the number of new items retained. On a persistence error the
    /// in-memory state has still been updated.
    async fn add_items(&self, source_id: &str, items: Vec<FeedItem>) -> Result<usize> {
        self.add_fetched(source_id, items, None).await
    }

    /// Like [`add_items`](Self::add_items), also recording the response's ETag.
    async fn add_fetched(
        &self,
        source_id: &str,
        items: Vec<FeedItem>,
        etag: Option<String>,
    ) -> Result<usize>;

    /// Items of one source published at or after `since`, most recent `limit`.
    async fn get_items(
        &self,
        source_id: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Vec<FeedItem>;

    /// Items of all sources merged ascending, most recent `limit`.
    async fn get_all_items(&self, limit: usize, since: Option<DateTime<Utc>>) -> Vec<FeedItem>;

    /// Filtered listing for renderers.
    async fn list(&self, query: &ListQuery) -> Vec<FeedItem>;

    /// Metadata of one source.
    async fn meta(&self, source_id: &str) -> Option<FeedMeta>;

    /// Metadata of every source, sorted by source id.
    async fn sources(&self) -> Vec<FeedMeta>;

    /// Update read/starred flags of one item and persist.
    ///
    /// Returns `false` when the item does not exist.
    async fn set_flags(&self, source_id: &str, id: &str, update: FlagUpdate) -> Result<bool>;
}
