// src/models/mod.rs

//! Domain models for the feed store.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod bucket;
mod config;
mod item;
mod query;

// Re-export all public types
pub use bucket::{FeedBucket, FeedMeta, RetentionPolicy};
pub use config::{Config, FetcherConfig, LoggingConfig, SchedulerConfig, StoreConfig};
pub use item::FeedItem;
pub use query::{FlagUpdate, ListQuery, filter_since, tail};
