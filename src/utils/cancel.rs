//! Cancellation helpers shared by the update and watch entry points.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Cancel `token` after `deadline`, unless it is cancelled first.
pub fn cancel_after(token: &CancellationToken, deadline: Duration) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(deadline) => {
                log::warn!("Deadline of {}s reached, cancelling", deadline.as_secs());
                token.cancel();
            }
        }
    });
}

/// Cancel `token` on Ctrl-C.
pub fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                log::info!("Interrupted, finishing in-flight work");
                token.cancel();
            }
        }
    });
}
