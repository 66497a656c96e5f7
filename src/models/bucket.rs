//! Per-source item buckets and their retention rules.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FeedItem;

/// Retention limits applied to every bucket on the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum items kept per bucket
    pub max_items: usize,
    /// Items published before `now - max_age` are dropped
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    pub fn new(max_items: usize, max_age: Option<Duration>) -> Self {
        Self {
            max_items: max_items.max(1),
            max_age: max_age.filter(|age| !age.is_zero()),
        }
    }

    /// Oldest publication time still retained, if age retention is enabled.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let age = chrono::Duration::from_std(self.max_age?).ok()?;
        now.checked_sub_signed(age)
    }
}

/// Denormalized metadata about a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FeedMeta {
    pub url: String,

    /// Source-reported title, filled from the first stored item
    #[serde(default)]
    pub title: String,

    /// Publication time of the newest item seen
    #[serde(default)]
    pub updated: DateTime<Utc>,

    /// Validator for conditional requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(default)]
    pub last_fetch: DateTime<Utc>,
}

/// All retained items of one source, ascending by `published`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FeedBucket {
    #[serde(default)]
    pub items: Vec<FeedItem>,
    #[serde(default)]
    pub meta: FeedMeta,
}

impl FeedBucket {
    /// Create an empty bucket for `url`.
    pub fn new(url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            items: Vec::new(),
            meta: FeedMeta {
                url: url.into(),
                last_fetch: now,
                ..FeedMeta::default()
            },
        }
    }

    /// Merge candidates into the bucket.
    ///
    /// Candidates whose id is already present (or repeated within the batch)
    /// are ignored. The bucket is then re-sorted, cleaned and capped. Returns
    /// how many of the new items survived retention.
    pub fn merge(
        &mut self,
        candidates: Vec<FeedItem>,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> usize {
        let mut known: HashSet<String> = self.items.iter().map(|i| i.id.clone()).collect();
        // New ids with their source name, in arrival order.
        let mut fresh = Vec::new();

        for item in candidates {
            if !known.insert(item.id.clone()) {
                continue;
            }
            fresh.push((item.id.clone(), item.source.clone()));
            self.items.push(item);
        }

        self.sort();
        self.enforce(policy, now);

        let kept: HashSet<&str> = self.items.iter().map(|i| i.id.as_str()).collect();
        let survivors: Vec<&(String, String)> = fresh
            .iter()
            .filter(|(id, _)| kept.contains(id.as_str()))
            .collect();

        self.meta.last_fetch = now;
        if self.meta.title.is_empty() {
            if let Some(source) = survivors
                .first()
                .map(|(_, source)| source.as_str())
                .filter(|source| !source.is_empty())
            {
                self.meta.title = source.to_string();
            }
        }

        let retained = survivors.len();
        if retained > 0 {
            if let Some(newest) = self.items.last() {
                self.meta.updated = self.meta.updated.max(newest.published);
            }
        }
        retained
    }

    /// Stable sort ascending by publication time.
    pub fn sort(&mut self) {
        self.items.sort_by(|a, b| a.published.cmp(&b.published));
    }

    /// Drop expired items, then keep only the newest `max_items`.
    ///
    /// Expects `items` to be sorted.
    pub fn enforce(&mut self, policy: &RetentionPolicy, now: DateTime<Utc>) {
        if let Some(cutoff) = policy.cutoff(now) {
            self.items.retain(|item| item.published >= cutoff);
        }
        if self.items.len() > policy.max_items {
            let excess = self.items.len() - policy.max_items;
            self.items.drain(..excess);
        }
    }

    /// Find an item by id.
    pub fn item_mut(&mut self, id: &str) -> Option<&mut FeedItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn item(id: &str, day: u32) -> FeedItem {
        FeedItem::new("Feed", id, id.to_uppercase(), "", at(day), at(28))
    }

    fn ids(bucket: &FeedBucket) -> Vec<&str> {
        bucket.items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_merge_evicts_oldest_beyond_cap() {
        let policy = RetentionPolicy::new(2, None);
        let mut bucket = FeedBucket::new("https://example.com/rss", at(1));

        assert_eq!(bucket.merge(vec![item("a", 1)], &policy, at(10)), 1);
        assert_eq!(
            bucket.merge(vec![item("b", 2), item("c", 3)], &policy, at(10)),
            2
        );
        assert_eq!(ids(&bucket), ["b", "c"]);

        assert_eq!(bucket.merge(vec![item("b", 2)], &policy, at(11)), 0);
        assert_eq!(ids(&bucket), ["b", "c"]);
    }

    #[test]
    fn test_merge_sorts_and_keeps_insertion_order_on_ties() {
        let policy = RetentionPolicy::new(10, None);
        let mut bucket = FeedBucket::new("u", at(1));

        bucket.merge(
            vec![item("late", 5), item("tie-1", 3), item("early", 1), item("tie-2", 3)],
            &policy,
            at(10),
        );
        assert_eq!(ids(&bucket), ["early", "tie-1", "tie-2", "late"]);

        bucket.merge(vec![item("tie-3", 3)], &policy, at(10));
        assert_eq!(ids(&bucket), ["early", "tie-1", "tie-2", "tie-3", "late"]);
    }

    #[test]
    fn test_duplicates_within_one_batch_are_dropped() {
        let policy = RetentionPolicy::new(10, None);
        let mut bucket = FeedBucket::new("u", at(1));

        let mut copy = item("a", 2);
        copy.title = "second copy".to_string();
        assert_eq!(bucket.merge(vec![item("a", 1), copy], &policy, at(10)), 1);
        assert_eq!(bucket.items.len(), 1);
        assert_eq!(bucket.items[0].title, "A");
    }

    #[test]
    fn test_age_cleanup_runs_before_cap() {
        let policy = RetentionPolicy::new(3, Some(Duration::from_secs(5 * 86_400)));
        let mut bucket = FeedBucket::new("u", at(1));

        let added = bucket.merge(
            vec![item("old", 1), item("x", 6), item("y", 7), item("z", 8), item("w", 9)],
            &policy,
            at(10),
        );
        assert_eq!(ids(&bucket), ["y", "z", "w"]);
        assert_eq!(added, 3);
    }

    #[test]
    fn test_meta_title_and_updated() {
        let policy = RetentionPolicy::new(5, None);
        let mut bucket = FeedBucket::new("u", at(1));
        assert_eq!(bucket.meta.last_fetch, at(1));

        bucket.merge(vec![item("a", 4)], &policy, at(5));
        assert_eq!(bucket.meta.title, "Feed");
        assert_eq!(bucket.meta.updated, at(4));
        assert_eq!(bucket.meta.last_fetch, at(5));

        let mut renamed = item("b", 2);
        renamed.source = "Other".to_string();
        bucket.merge(vec![renamed], &policy, at(6));
        assert_eq!(bucket.meta.title, "Feed");
        assert_eq!(bucket.meta.updated, at(4));
    }

    #[test]
    fn test_title_comes_from_a_retained_item() {
        let policy = RetentionPolicy::new(5, Some(Duration::from_secs(5 * 86_400)));
        let mut bucket = FeedBucket::new("u", at(1));

        let mut stale = item("stale", 1);
        stale.source = "Stale Name".to_string();
        assert_eq!(bucket.merge(vec![stale.clone()], &policy, at(10)), 0);
        assert!(bucket.items.is_empty());
        assert_eq!(bucket.meta.title, "");

        let mut kept = item("kept", 8);
        kept.source = "Live Name".to_string();
        assert_eq!(bucket.merge(vec![stale, kept], &policy, at(10)), 1);
        assert_eq!(ids(&bucket), ["kept"]);
        assert_eq!(bucket.meta.title, "Live Name");
    }

    #[test]
    fn test_zero_policy_values_are_normalized() {
        let policy = RetentionPolicy::new(0, Some(Duration::ZERO));
        assert_eq!(policy.max_items, 1);
        assert!(policy.max_age.is_none());
        assert!(policy.cutoff(at(1)).is_none());
    }
}
