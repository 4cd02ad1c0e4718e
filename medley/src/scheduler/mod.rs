//! Periodic playlist sync trigger.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Error;
use crate::sync::PlaylistSyncService;

/// Long-lived task that re-syncs the whole catalog on a fixed interval.
///
/// An interval of zero disables it. A sync already in flight (manual trigger)
/// just skips the tick; the next one tries again.
pub struct SyncScheduler {
    sync: Arc<PlaylistSyncService>,
    interval: Duration,
    cancel: CancellationToken,
}

impl SyncScheduler {
    pub fn new(sync: Arc<PlaylistSyncService>, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            sync,
            interval,
            cancel,
        }
    }

    pub async fn run(self) {
        if self.interval.is_zero() {
            info!("playlist sync scheduler disabled");
            return;
        }
        info!(
            interval_secs = self.interval.as_secs(),
            "playlist sync scheduler started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            match self.sync.sync_all().await {
                Ok(reports) => {
                    let new_items: usize = reports.iter().map(|r| r.new_items).sum();
                    info!(playlists = reports.len(), new_items, "scheduled sync finished");
                }
                Err(Error::Conflict(_)) => {
                    debug!("scheduled sync skipped, another sync is running");
                }
                Err(e) => {
                    warn!(error = %e, "scheduled sync failed");
                }
            }
        }

        info!("playlist sync scheduler stopped");
    }
}
