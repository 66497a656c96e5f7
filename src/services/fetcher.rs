// src/services/fetcher.rs

//! Feed fetcher service.
//!
//! Fetches every requested source concurrently, bounded by a permit pool
//! that is shared by all calls on the same [`Fetcher`]. A failing source
//! never cancels its siblings; failures are collected into the
//! [`FetchReport`] returned once every task has finished.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::FetcherConfig;
use crate::services::parser::{FeedParser, SourceParser};
use crate::storage::ItemStorage;
use crate::utils::http::create_async_client;

/// A source that could not be updated.
#[derive(Debug)]
pub struct SourceFailure {
    pub source_id: String,
    pub error: AppError,
}

/// Outcome of one [`Fetcher::fetch_all`] call.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// New items retained per successfully updated source
    pub added: BTreeMap<String, usize>,
    /// Failed sources in completion order
    pub failures: Vec<SourceFailure>,
    /// Sources never started because of cancellation
    pub skipped: Vec<String>,
}

impl FetchReport {
    /// The first failure recorded, if any.
    pub fn first_error(&self) -> Option<&SourceFailure> {
        self.failures.first()
    }

    /// A failure that means the store could not be written.
    pub fn persistence_failure(&self) -> Option<&SourceFailure> {
        self.failures.iter().find(|f| f.error.is_persistence())
    }

    pub fn total_added(&self) -> usize {
        self.added.values().sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    /// `Err` with the first recorded failure, otherwise the report.
    pub fn into_result(mut self) -> Result<Self> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        Err(self.failures.remove(0).error)
    }

    /// Fold another report into this one.
    pub fn absorb(&mut self, other: FetchReport) {
        for (source, count) in other.added {
            *self.added.entry(source).or_default() += count;
        }
        self.failures.extend(other.failures);
        self.skipped.extend(other.skipped);
    }
}

enum SourceOutcome {
    Added(usize),
    NotModified,
    Skipped,
    Failed(AppError),
}

/// Shared state cloned into every fetch task.
struct FetchContext {
    client: reqwest::Client,
    store: Arc<dyn ItemStorage>,
    parser: Arc<dyn SourceParser>,
}

impl FetchContext {
    /// Fetch, parse and store a single source.
    async fn fetch_source(&self, location: &str) -> Result<SourceOutcome> {
        let etag = self.store.meta(location).await.and_then(|meta| meta.etag);

        let mut request = self.client.get(location);
        if let Some(etag) = &etag {
            request = request.header(IF_NONE_MATCH, etag.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            log::debug!("{location}: not modified");
            return Ok(SourceOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(AppError::Status {
                url: location.to_string(),
                status: status.as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        let items = self.parser.parse(&body, location)?;
        log::debug!("{location}: parsed {} items", items.len());

        let added = self.store.add_fetched(location, items, etag).await?;
        Ok(SourceOutcome::Added(added))
    }
}

/// Service for fetching sources into an item store.
pub struct Fetcher {
    context: Arc<FetchContext>,
    permits: Arc<Semaphore>,
}

impl Fetcher {
    /// Create a fetcher with its own HTTP client and permit pool.
    pub fn new(
        config: &FetcherConfig,
        store: Arc<dyn ItemStorage>,
        parser: Arc<dyn SourceParser>,
    ) -> Result<Self> {
        let client = create_async_client(config, parser.accept())?;
        Ok(Self {
            context: Arc::new(FetchContext {
                client,
                store,
                parser,
            }),
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// Create a fetcher using the Atom/RSS feed parser.
    pub fn with_feed_parser(config: &FetcherConfig, store: Arc<dyn ItemStorage>) -> Result<Self> {
        Self::new(config, store, Arc::new(FeedParser::new()))
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Fetch all `locations` and wait for every task to finish.
    ///
    /// Tasks still waiting for a permit when `cancel` fires are skipped.
    /// Requests already in flight run until they finish or time out.
    pub async fn fetch_all(&self, locations: &[String], cancel: &CancellationToken) -> FetchReport {
        let mut seen = HashSet::new();
        let mut spawned = HashMap::new();
        let mut tasks = JoinSet::new();

        for location in locations {
            if !seen.insert(location.as_str()) {
                log::debug!("Ignoring duplicate source {location}");
                continue;
            }
            let handle = tasks.spawn(Self::run_task(
                Arc::clone(&self.context),
                Arc::clone(&self.permits),
                location.clone(),
                cancel.clone(),
            ));
            spawned.insert(handle.id(), location.clone());
        }

        let mut report = FetchReport::default();

        while let Some(joined) = tasks.join_next().await {
            let (location, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // A task that died never returned its location.
                    let Some(location) = spawned.remove(&e.id()) else {
                        log::error!("Unknown fetch task died: {e}");
                        continue;
                    };
                    log::error!("Fetch task for {} died: {}", location, e);
                    report.failures.push(SourceFailure {
                        error: AppError::fetch(&location, e.to_string()),
                        source_id: location,
                    });
                    continue;
                }
            };

            match outcome {
                SourceOutcome::Added(count) => {
                    report.added.insert(location, count);
                }
                SourceOutcome::NotModified => {
                    report.added.insert(location, 0);
                }
                SourceOutcome::Skipped => report.skipped.push(location),
                SourceOutcome::Failed(error) => {
                    log::warn!("Failed to fetch {}: {}", location, error);
                    report.failures.push(SourceFailure {
                        source_id: location,
                        error,
                    });
                }
            }
        }

        report
    }

    async fn run_task(
        context: Arc<FetchContext>,
        permits: Arc<Semaphore>,
        location: String,
        cancel: CancellationToken,
    ) -> (String, SourceOutcome) {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = permits.acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            log::debug!("{location}: cancelled before start");
            return (location, SourceOutcome::Skipped);
        };

        let outcome = match context.fetch_source(&location).await {
            Ok(outcome) => outcome,
            Err(error) => SourceOutcome::Failed(error),
        };
        (location, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetentionPolicy;
    use crate::storage::LocalStore;
    use tempfile::TempDir;

    async fn fetcher(tmp: &TempDir, max_concurrent: usize) -> (Fetcher, Arc<LocalStore>) {
        let store = Arc::new(
            LocalStore::open(tmp.path().join("feeds.json"), RetentionPolicy::new(10, None))
                .await
                .unwrap(),
        );
        let config = FetcherConfig {
            max_concurrent,
            ..FetcherConfig::default()
        };
        let fetcher = Fetcher::with_feed_parser(&config, store.clone()).unwrap();
        (fetcher, store)
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let tmp = TempDir::new().unwrap();
        let (fetcher, store) = fetcher(&tmp, 2).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let locations = vec![
            "http://127.0.0.1:9/a.xml".to_string(),
            "http://127.0.0.1:9/b.xml".to_string(),
        ];
        let report = fetcher.fetch_all(&locations, &cancel).await;

        assert_eq!(report.skipped.len(), 2);
        assert!(report.failures.is_empty());
        assert!(report.added.is_empty());
        assert!(!report.is_complete());
        assert!(store.sources().await.is_empty());
        assert_eq!(fetcher.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_invalid_location_is_isolated_failure() {
        let tmp = TempDir::new().unwrap();
        let (fetcher, _store) = fetcher(&tmp, 1).await;

        let locations = vec!["not a url".to_string(), "not a url".to_string()];
        let report = fetcher
            .fetch_all(&locations, &CancellationToken::new())
            .await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source_id, "not a url");
        assert!(report.persistence_failure().is_none());
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_report_absorb_and_result() {
        let mut first = FetchReport::default();
        first.added.insert("a".to_string(), 2);
        let mut second = FetchReport::default();
        second.added.insert("a".to_string(), 1);
        second.added.insert("b".to_string(), 4);
        second.skipped.push("c".to_string());

        first.absorb(second);
        assert_eq!(first.total_added(), 7);
        assert_eq!(first.added["a"], 3);
        assert_eq!(first.skipped, ["c"]);
        assert!(first.into_result().is_ok());
    }
}
