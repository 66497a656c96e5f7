// src/services/scheduler.rs

//! Periodic batched fetching.
//!
//! A pass splits the source list into sub-batches of `batch_size`, hands
//! each to the [`Fetcher`] in turn and pauses between them. [`start`]
//! repeats passes on a fixed interval until [`stop`] or cancellation.
//!
//! [`start`]: BatchScheduler::start
//! [`stop`]: BatchScheduler::stop

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::SchedulerConfig;
use crate::services::fetcher::{FetchReport, Fetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Result of one pass over the source list.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Sub-batches actually handed to the fetcher
    pub batches: usize,
    /// Stopped or cancelled before the last sub-batch
    pub interrupted: bool,
    pub report: FetchReport,
}

pub struct BatchScheduler {
    fetcher: Arc<Fetcher>,
    config: SchedulerConfig,
    state: watch::Sender<SchedulerState>,
    /// Stop signal of the active `start` loop; `None` once it has exited
    run: Mutex<Option<CancellationToken>>,
}

impl BatchScheduler {
    pub fn new(fetcher: Arc<Fetcher>, config: SchedulerConfig) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            fetcher,
            config,
            state,
            run: Mutex::new(None),
        }
    }

    fn run_slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Request a running scheduler to stop.
    ///
    /// The state turns `Idle` at once. The sub-batch in flight finishes;
    /// remaining sub-batches and passes are not started. Does nothing when
    /// no loop is active.
    pub fn stop(&self) {
        if let Some(stop) = self.run_slot().as_ref() {
            if !stop.is_cancelled() {
                log::info!("Scheduler stop requested");
            }
            stop.cancel();
            self.state.send_replace(SchedulerState::Idle);
        }
    }

    /// Run a single pass regardless of scheduler state.
    pub async fn run_once(&self, locations: &[String], cancel: &CancellationToken) -> PassReport {
        self.run_pass(locations, cancel, cancel).await
    }

    /// Run passes every `interval_secs` until stopped or cancelled.
    ///
    /// The first pass starts immediately. Returns the number of passes run,
    /// or an error while a previous loop is still active, including one that
    /// was asked to stop but has not exited yet.
    pub async fn start(&self, locations: Vec<String>, cancel: CancellationToken) -> Result<usize> {
        let stop = {
            let mut run = self.run_slot();
            if run.is_some() {
                return Err(AppError::scheduler("scheduler is already running"));
            }
            let stop = cancel.child_token();
            *run = Some(stop.clone());
            stop
        };
        self.state.send_replace(SchedulerState::Running);

        let period = self.config.interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "Scheduler started: {} sources, batches of {}, every {:?}",
            locations.len(),
            self.config.batch_size,
            period
        );

        let mut passes = 0;
        loop {
            let pass = self.run_pass(&locations, &cancel, &stop).await;
            passes += 1;
            log_pass(passes, &pass);

            if stop.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.cancelled() => break,
            }
        }

        {
            let mut run = self.run_slot();
            self.state.send_replace(SchedulerState::Idle);
            *run = None;
        }
        log::info!("Scheduler stopped after {} passes", passes);
        Ok(passes)
    }

    /// One pass. Fetches observe `cancel`; `halt` is checked between
    /// sub-batches and must be `cancel` itself or a child of it.
    async fn run_pass(
        &self,
        locations: &[String],
        cancel: &CancellationToken,
        halt: &CancellationToken,
    ) -> PassReport {
        let mut pass = PassReport::default();

        for (index, batch) in locations.chunks(self.config.batch_size.max(1)).enumerate() {
            if index > 0 {
                if halt.is_cancelled() {
                    pass.interrupted = true;
                    break;
                }
                tokio::select! {
                    _ = halt.cancelled() => {
                        pass.interrupted = true;
                        break;
                    }
                    _ = sleep(self.config.batch_pause()) => {}
                }
                if halt.is_cancelled() {
                    pass.interrupted = true;
                    break;
                }
            }

            log::debug!("Fetching batch {} ({} sources)", index + 1, batch.len());
            let report = self.fetcher.fetch_all(batch, cancel).await;
            pass.batches += 1;
            pass.report.absorb(report);
        }

        pass
    }
}

fn log_pass(number: usize, pass: &PassReport) {
    let report = &pass.report;
    log::info!(
        "Pass {} complete: {} batches, {} new items, {} failed, {} skipped",
        number,
        pass.batches,
        report.total_added(),
        report.failures.len(),
        report.skipped.len()
    );
    if let Some(failure) = report.persistence_failure() {
        log::error!("{}", failure.error);
    }
}
