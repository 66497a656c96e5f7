//! Feed item data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single record fetched from a source.
///
/// `id` is the de-duplication key within a source bucket. `published` drives
/// ordering and retention; `added` is the local ingestion time and is never
/// used for either.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    /// Source-reported name of the feed (e.g. the channel title)
    #[serde(rename = "feed", alias = "source", default)]
    pub source: String,

    /// Item headline
    pub title: String,

    /// Link to the full content
    #[serde(default)]
    pub link: String,

    /// Publication time; epoch when the source gave no usable date
    #[serde(default)]
    pub published: DateTime<Utc>,

    /// Local ingestion time
    #[serde(default)]
    pub added: DateTime<Utc>,

    /// Stable identifier (guid, link, or a derived hash)
    pub id: String,

    #[serde(default)]
    pub read: bool,

    #[serde(default)]
    pub starred: bool,
}

impl FeedItem {
    /// Create an unread, unstarred item.
    pub fn new(
        source: impl Into<String>,
        id: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        published: DateTime<Utc>,
        added: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            link: link.into(),
            published,
            added,
            id: id.into(),
            read: false,
            starred: false,
        }
    }

    /// Whether the source supplied a usable publication date.
    pub fn has_date(&self) -> bool {
        self.published != DateTime::<Utc>::UNIX_EPOCH
    }
}
