//! Read-side filters.

use chrono::{DateTime, Utc};

use super::FeedItem;

/// Filter for [`ItemStorage::list`](crate::storage::ItemStorage::list).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Keep only the most recent `limit` items (0 = no limit)
    pub limit: usize,
    /// Case-insensitive substring of the source id or title
    pub source: Option<String>,
    /// Keep items published at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Return newest first instead of ascending
    pub newest_first: bool,
}

impl ListQuery {
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether a bucket with this id and title is selected.
    pub fn matches_source(&self, source_id: &str, title: &str) -> bool {
        match self.source.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                source_id.to_lowercase().contains(&needle)
                    || title.to_lowercase().contains(&needle)
            }
        }
    }
}

/// Flag changes for a single item; `None` leaves a flag untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagUpdate {
    pub read: Option<bool>,
    pub starred: Option<bool>,
}

impl FlagUpdate {
    pub fn read(read: bool) -> Self {
        Self {
            read: Some(read),
            starred: None,
        }
    }

    pub fn starred(starred: bool) -> Self {
        Self {
            read: None,
            starred: Some(starred),
        }
    }

    /// Apply to `item`; returns whether anything changed.
    pub fn apply(&self, item: &mut FeedItem) -> bool {
        let before = (item.read, item.starred);
        if let Some(read) = self.read {
            item.read = read;
        }
        if let Some(starred) = self.starred {
            item.starred = starred;
        }
        before != (item.read, item.starred)
    }
}

/// Items published at or after `since`, cloned.
pub fn filter_since<'a>(
    items: impl IntoIterator<Item = &'a FeedItem>,
    since: Option<DateTime<Utc>>,
) -> Vec<FeedItem> {
    items
        .into_iter()
        .filter(|item| since.is_none_or(|since| item.published >= since))
        .cloned()
        .collect()
}

/// Keep the last `limit` items of an ascending sequence (0 = all).
pub fn tail(mut items: Vec<FeedItem>, limit: usize) -> Vec<FeedItem> {
    if limit > 0 && items.len() > limit {
        items.drain(..items.len() - limit);
    }
    items
}
