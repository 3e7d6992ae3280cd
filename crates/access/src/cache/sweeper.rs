//! Background purge of expired cache entries.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::TtlCache;

/// Shortest interval between sweeps; shorter requests are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a running sweeper task. Dropping it stops the task.
pub struct SweeperHandle {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub(super) fn spawn(cache: TtlCache, interval: Duration) -> Self {
        if interval < MIN_SWEEP_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "cache sweep interval too short, using minimum"
            );
        }
        let interval = interval.max(MIN_SWEEP_INTERVAL);

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_sweeper(cache, interval, stop_rx));
        Self {
            stop_tx,
            task: Some(task),
        }
    }

    /// Stop the sweeper and wait for it to finish.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "cache sweeper task failed");
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

async fn run_sweeper(cache: TtlCache, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "swept expired cache entries");
                }
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    debug!("cache sweeper stopping");
                    break;
                }
            }
        }
    }
}
