// src/services/parser.rs

//! Source parsers turn raw response bodies into [`FeedItem`]s.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::FeedItem;
use crate::utils::date::parse_date_or_epoch;
use crate::utils::resolve_url;
use crate::utils::text::clean_text;

/// Converts a fetched payload into candidate items.
pub trait SourceParser: Send + Sync {
    /// Media types understood, sent as the request's `Accept` header.
    fn accept(&self) -> &str;

    /// Parse `raw` fetched from `location`.
    ///
    /// Items without a usable date get the Unix epoch; only a payload that
    /// cannot be read at all is an error.
    fn parse(&self, raw: &[u8], location: &str) -> Result<Vec<FeedItem>>;
}

/// Atom 1.0 and RSS 2.0 parser backed by [`atom_syndication`] and [`rss`].
///
/// Atom is tried first; anything that is not an Atom document is read as RSS.
#[derive(Debug, Clone, Default)]
pub struct FeedParser;

impl FeedParser {
    pub const ACCEPT: &'static str =
        "application/atom+xml, application/rss+xml, application/xml;q=0.9, text/xml;q=0.8";

    pub fn new() -> Self {
        Self
    }

    /// Convert an already-parsed RSS channel.
    pub fn parse_channel(
        channel: &rss::Channel,
        location: &str,
        now: DateTime<Utc>,
    ) -> Vec<FeedItem> {
        let source = clean_text(channel.title());

        channel
            .items()
            .iter()
            .map(|item| {
                let title = entry_title(item.title());
                let link = item
                    .link()
                    .map(|l| resolve_url(location, l))
                    .unwrap_or_default();
                let published = parse_date_or_epoch(item.pub_date());
                let guid = item.guid().map(|g| g.value());
                let id = entry_id(guid, &link, location, &title, published);

                FeedItem::new(source.clone(), id, title, link, published, now)
            })
            .collect()
    }

    /// Convert an already-parsed Atom feed.
    pub fn parse_atom(
        feed: &atom_syndication::Feed,
        location: &str,
        now: DateTime<Utc>,
    ) -> Vec<FeedItem> {
        let source = clean_text(&feed.title().value);

        feed.entries()
            .iter()
            .map(|entry| {
                let title = entry_title(Some(&entry.title().value));
                let link = entry
                    .links()
                    .iter()
                    .find(|l| l.rel() == "alternate")
                    .or_else(|| entry.links().first())
                    .map(|l| resolve_url(location, l.href()))
                    .unwrap_or_default();
                // An undated entry comes back at the epoch.
                let published = entry
                    .published()
                    .unwrap_or_else(|| entry.updated())
                    .with_timezone(&Utc);
                let id = entry_id(Some(entry.id()), &link, location, &title, published);

                FeedItem::new(source.clone(), id, title, link, published, now)
            })
            .collect()
    }
}

impl SourceParser for FeedParser {
    fn accept(&self) -> &str {
        Self::ACCEPT
    }

    fn parse(&self, raw: &[u8], location: &str) -> Result<Vec<FeedItem>> {
        let now = Utc::now();
        if let Ok(feed) = atom_syndication::Feed::read_from(raw) {
            return Ok(Self::parse_atom(&feed, location, now));
        }
        let channel = rss::Channel::read_from(raw)?;
        Ok(Self::parse_channel(&channel, location, now))
    }
}

fn entry_title(raw: Option<&str>) -> String {
    raw.map(clean_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "(untitled)".to_string())
}

/// Prefer the source's own id, fall back to the link, then a content hash.
fn entry_id(
    native: Option<&str>,
    link: &str,
    location: &str,
    title: &str,
    published: DateTime<Utc>,
) -> String {
    native
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| (!link.is_empty()).then(|| link.to_string()))
        .unwrap_or_else(|| fallback_id(location, title, published))
}

/// Stable id for items that carry neither guid nor link.
fn fallback_id(location: &str, title: &str, published: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(location.as_bytes());
    hasher.update([0u8]);
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(published.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}
