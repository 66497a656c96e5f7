//! Service layer for the feed store.
//!
//! This module contains the business logic for:
//! - Payload parsing (`SourceParser`, `FeedParser`)
//! - Concurrent fetching (`Fetcher`)
//! - Periodic batched updates (`BatchScheduler`)

pub mod fetcher;
pub mod parser;
pub mod scheduler;

pub use fetcher::{FetchReport, Fetcher, SourceFailure};
pub use parser::{FeedParser, SourceParser};
pub use scheduler::{BatchScheduler, PassReport, SchedulerState};
