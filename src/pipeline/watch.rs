// src/pipeline/watch.rs

//! Scheduled updates.

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::services::BatchScheduler;

/// Run the scheduler over `locations`.
///
/// With `once`, a single batched pass is made. Otherwise passes repeat on
/// the configured interval until `cancel` fires or the scheduler is stopped.
pub async fn run_watch(
    scheduler: &BatchScheduler,
    locations: Vec<String>,
    once: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    if locations.is_empty() {
        log::warn!("No sources configured, nothing to watch");
        return Ok(());
    }

    if once {
        let pass = scheduler.run_once(&locations, cancel).await;
        log::info!(
            "Pass complete: {} batches, {} new items, {} failed, {} skipped",
            pass.batches,
            pass.report.total_added(),
            pass.report.failures.len(),
            pass.report.skipped.len()
        );
        if let Some(failure) = pass.report.persistence_failure() {
            log::error!("{}", failure.error);
        }
        return pass.report.into_result().map(|_| ());
    }

    scheduler.start(locations, cancel.clone()).await?;
    Ok(())
}
