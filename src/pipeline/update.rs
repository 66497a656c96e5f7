// src/pipeline/update.rs

//! One-shot update of every source.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::services::{FetchReport, Fetcher};
use crate::utils::cancel::cancel_after;

/// Fetch all `locations` once.
///
/// The run is cancelled when `parent` is cancelled or `deadline` elapses;
/// sources not yet started are then reported as skipped. Per-source
/// failures stay in the report. Only a failure to write the store is
/// returned as `Err`.
pub async fn run_update(
    fetcher: &Fetcher,
    locations: &[String],
    deadline: Option<Duration>,
    parent: &CancellationToken,
) -> Result<FetchReport> {
    let token = parent.child_token();
    let _guard = token.clone().drop_guard();
    if let Some(deadline) = deadline {
        cancel_after(&token, deadline);
    }

    log::info!("Updating {} sources", locations.len());
    let mut report = fetcher.fetch_all(locations, &token).await;

    log::info!(
        "Update complete: {} new items from {} sources, {} failed, {} skipped",
        report.total_added(),
        report.added.len(),
        report.failures.len(),
        report.skipped.len()
    );

    if let Some(pos) = report
        .failures
        .iter()
        .position(|failure| failure.error.is_persistence())
    {
        let failure = report.failures.swap_remove(pos);
        log::error!("{}", failure.error);
        return Err(failure.error);
    }

    Ok(report)
}
