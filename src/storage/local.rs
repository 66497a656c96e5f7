//! Local filesystem storage implementation.
//!
//! All buckets live in memory behind one reader/writer lock and are written
//! out as a single pretty-printed JSON document after every mutation.
//!
//! ## Write Protocol
//!
//! 1. Serialize the whole map while holding the lock.
//! 2. Write it to `{file}.tmp` next to the canonical file and fsync.
//! 3. Rename the temp file over the canonical path.
//!
//! A crash before step 3 leaves the previous file untouched.
//!
//! ## Loading
//!
//! - Missing file: empty store
//! - Flat array of items (older single-list layout): migrated into buckets
//!   keyed by source name. The first fetch of a URL whose feed carries that
//!   name takes the bucket over under the URL key.
//! - Anything else unparseable: empty store, logged as a warning

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::{
    Config, FeedBucket, FeedItem, FeedMeta, FlagUpdate, ListQuery, RetentionPolicy, filter_since,
    tail,
};
use crate::storage::ItemStorage;

type Buckets = BTreeMap<String, FeedBucket>;

/// JSON-file backed item store.
pub struct LocalStore {
    path: PathBuf,
    policy: RetentionPolicy,
    feeds: RwLock<Buckets>,
}

impl LocalStore {
    /// Open the store at `path`, loading whatever is on disk.
    pub async fn open(path: impl Into<PathBuf>, policy: RetentionPolicy) -> Result<Self> {
        let path = path.into();
        let feeds = Self::load(&path, &policy).await?;

        log::info!(
            "Opened store {} ({} sources, {} items)",
            path.display(),
            feeds.len(),
            feeds.values().map(|b| b.items.len()).sum::<usize>()
        );

        Ok(Self {
            path,
            policy,
            feeds: RwLock::new(feeds),
        })
    }

    /// Open the store configured for `storage_dir`.
    pub async fn from_config(config: &Config, storage_dir: &Path) -> Result<Self> {
        Self::open(config.store.path(storage_dir), config.store.retention()).await
    }

    /// Canonical file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    async fn load(path: &Path, policy: &RetentionPolicy) -> Result<Buckets> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No store at {}, starting empty", path.display());
                return Ok(Buckets::new());
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        match Self::decode(&bytes, policy) {
            Some(feeds) => Ok(feeds),
            None => {
                log::warn!(
                    "Store at {} is unreadable, starting with an empty store",
                    path.display()
                );
                Ok(Buckets::new())
            }
        }
    }

    fn decode(bytes: &[u8], policy: &RetentionPolicy) -> Option<Buckets> {
        if let Ok(mut feeds) = serde_json::from_slice::<Buckets>(bytes) {
            for bucket in feeds.values_mut() {
                bucket.sort();
            }
            return Some(feeds);
        }

        let legacy: Vec<FeedItem> = serde_json::from_slice(bytes).ok()?;
        log::info!("Migrating {} items from flat store layout", legacy.len());
        Some(Self::migrate(legacy, policy))
    }

    /// Group a flat item list into buckets keyed by each item's source name.
    fn migrate(items: Vec<FeedItem>, policy: &RetentionPolicy) -> Buckets {
        let now = Utc::now();
        let mut grouped: BTreeMap<String, Vec<FeedItem>> = BTreeMap::new();
        for item in items {
            grouped.entry(item.source.clone()).or_default().push(item);
        }

        grouped
            .into_iter()
            .map(|(source, items)| {
                let last_fetch = items
                    .iter()
                    .map(|i| i.added)
                    .max()
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                let mut bucket = FeedBucket::new(source.clone(), last_fetch);
                bucket.merge(items, policy, now);
                bucket.meta.last_fetch = last_fetch;
                (source, bucket)
            })
            .collect()
    }

    /// Re-key a bucket migrated from the flat layout under the URL its items
    /// now arrive from. Only a non-URL key equal to the feed's name qualifies.
    fn adopt_migrated(feeds: &mut Buckets, source_id: &str, items: &[FeedItem]) {
        if feeds.contains_key(source_id) {
            return;
        }
        let Some(name) = items.first().map(|i| i.source.as_str()) else {
            return;
        };
        if name.is_empty() || url::Url::parse(name).is_ok() {
            return;
        }
        let Some(mut bucket) = feeds.remove(name) else {
            return;
        };
        log::info!("Moving migrated items of {name:?} under {source_id}");
        bucket.meta.url = source_id.to_string();
        feeds.insert(source_id.to_string(), bucket);
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("store"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persist_error(&self, source: std::io::Error) -> AppError {
        AppError::Persist {
            path: self.path.clone(),
            source,
        }
    }

    /// Serialize and atomically replace the canonical file.
    async fn persist(&self, feeds: &Buckets) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(feeds).map_err(|e| self.persist_error(e.into()))?;
        let tmp = self.stage(&bytes).await?;
        self.commit(&tmp).await
    }

    /// Write `bytes` fully to the temp file next to the canonical path.
    async fn stage(&self, bytes: &[u8]) -> Result<PathBuf> {
        let tmp = self.temp_path();
        let written = async {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        match written {
            Ok(()) => Ok(tmp),
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(self.persist_error(e))
            }
        }
    }

    /// Rename the staged file over the canonical path.
    async fn commit(&self, tmp: &Path) -> Result<()> {
        if let Err(e) = tokio::fs::rename(tmp, &self.path).await {
            let _ = tokio::fs::remove_file(tmp).await;
            return Err(self.persist_error(e));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStorage for LocalStore {
    async fn add_fetched(
        &self,
        source_id: &str,
        items: Vec<FeedItem>,
        etag: Option<String>,
    ) -> Result<usize> {
        let now = Utc::now();
        let candidates = items.len();

        let mut feeds = self.feeds.write().await;
        Self::adopt_migrated(&mut feeds, source_id, &items);
        let bucket = feeds
            .entry(source_id.to_string())
            .or_insert_with(|| FeedBucket::new(source_id, now));
        let added = bucket.merge(items, &self.policy, now);
        if etag.is_some() {
            bucket.meta.etag = etag;
        }
        let retained = bucket.items.len();

        // Readers may proceed while the file is written; writers keep waiting.
        let feeds = feeds.downgrade();
        self.persist(&feeds).await?;

        log::debug!(
            "{source_id}: {added} new of {candidates} candidates, {retained} retained"
        );
        Ok(added)
    }

    async fn get_items(
        &self,
        source_id: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Vec<FeedItem> {
        let feeds = self.feeds.read().await;
        match feeds.get(source_id) {
            Some(bucket) => tail(filter_since(&bucket.items, since), limit),
            None => Vec::new(),
        }
    }

    async fn get_all_items(&self, limit: usize, since: Option<DateTime<Utc>>) -> Vec<FeedItem> {
        let feeds = self.feeds.read().await;
        let mut items = filter_since(feeds.values().flat_map(|b| b.items.iter()), since);
        items.sort_by(|a, b| a.published.cmp(&b.published));
        tail(items, limit)
    }

    async fn list(&self, query: &ListQuery) -> Vec<FeedItem> {
        let feeds = self.feeds.read().await;
        let selected = feeds
            .iter()
            .filter(|(id, bucket)| query.matches_source(id, &bucket.meta.title))
            .flat_map(|(_, bucket)| bucket.items.iter());

        let mut items = filter_since(selected, query.since);
        items.sort_by(|a, b| a.published.cmp(&b.published));
        let mut items = tail(items, query.limit);
        if query.newest_first {
            items.reverse();
        }
        items
    }

    async fn meta(&self, source_id: &str) -> Option<FeedMeta> {
        let feeds = self.feeds.read().await;
        feeds.get(source_id).map(|bucket| bucket.meta.clone())
    }

    async fn sources(&self) -> Vec<FeedMeta> {
        let feeds = self.feeds.read().await;
        feeds.values().map(|bucket| bucket.meta.clone()).collect()
    }

    async fn set_flags(&self, source_id: &str, id: &str, update: FlagUpdate) -> Result<bool> {
        let mut feeds = self.feeds.write().await;
        let Some(item) = feeds.get_mut(source_id).and_then(|b| b.item_mut(id)) else {
            return Ok(false);
        };
        if update.apply(item) {
            let feeds = feeds.downgrade();
            self.persist(&feeds).await?;
        }
        Ok(true)
    }
}
