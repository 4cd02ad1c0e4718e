//! Service container for dependency injection.
//!
//! All services are constructed once at startup and handed to whoever needs
//! them (HTTP handlers, the scheduler); there is no ambient global state.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::config::AppConfig;
use crate::database::repositories::{
    JobRepository, PlaylistRepository, SqlxJobRepository, SqlxPlaylistRepository,
};
use crate::downloader::{MediaDownloader, YtdlpDownloader};
use crate::extractor::{PlaylistExtractor, YtdlpExtractor};
use crate::queue::{DownloadService, DownloadWorker};
use crate::scheduler::SyncScheduler;
use crate::sync::{PlaylistSyncService, SyncStatus};

/// How long shutdown waits for background tasks before detaching.
///
/// An in-flight download can run for hours; after the timeout the task is
/// detached rather than aborted, so its final status write is never corrupted
/// while the process is still alive.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Service container holding all application services.
pub struct ServiceContainer {
    /// Database connection pool.
    pub pool: SqlitePool,
    /// Job repository, shared by the queue service and the worker.
    pub jobs: Arc<dyn JobRepository>,
    /// Playlist repository.
    pub playlists: Arc<dyn PlaylistRepository>,
    /// Download queue service.
    pub downloads: Arc<DownloadService>,
    /// Playlist sync service.
    pub sync: Arc<PlaylistSyncService>,
    /// Single-flight sync state.
    pub sync_status: Arc<SyncStatus>,
    downloader: Arc<dyn MediaDownloader>,
    config: AppConfig,
    cancel_token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ServiceContainer {
    /// Wire up repositories, collaborators and services over the given pool.
    pub fn new(pool: SqlitePool, config: AppConfig) -> Self {
        info!("initializing service container");

        let jobs: Arc<dyn JobRepository> = Arc::new(SqlxJobRepository::new(pool.clone()));
        let playlists: Arc<dyn PlaylistRepository> =
            Arc::new(SqlxPlaylistRepository::new(pool.clone()));

        let downloader: Arc<dyn MediaDownloader> = Arc::new(YtdlpDownloader::new(
            config.media_root.clone(),
            config.cookies_file.clone(),
        ));
        let extractor: Arc<dyn PlaylistExtractor> =
            Arc::new(YtdlpExtractor::new(config.cookies_file.clone()));

        let downloads = Arc::new(DownloadService::new(Arc::clone(&jobs)));
        let sync_status = Arc::new(SyncStatus::new());
        let sync = Arc::new(PlaylistSyncService::new(
            Arc::clone(&playlists),
            Arc::clone(&downloads),
            extractor,
            Arc::clone(&sync_status),
        ));

        Self {
            pool,
            jobs,
            playlists,
            downloads,
            sync,
            sync_status,
            downloader,
            config,
            cancel_token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start the background tasks: the download worker and the sync scheduler.
    ///
    /// Jobs left active by a previous crash are requeued first, so the worker
    /// picks them up again in creation order.
    pub async fn start(&self) -> Result<()> {
        let reset = self.jobs.reset_stale_active().await?;
        if reset > 0 {
            warn!(count = reset, "requeued jobs left active by a previous run");
        }

        let worker = DownloadWorker::new(
            Arc::clone(&self.jobs),
            Arc::clone(&self.playlists),
            Arc::clone(&self.downloader),
            self.downloads.wake_handle(),
            self.config.worker_poll_interval,
            self.cancel_token.child_token(),
        );

        let scheduler = SyncScheduler::new(
            Arc::clone(&self.sync),
            self.config.sync_interval,
            self.cancel_token.child_token(),
        );

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(worker.run()));
        tasks.push(tokio::spawn(scheduler.run()));

        info!("service container started");
        Ok(())
    }

    /// Token cancelled on shutdown; shared with the API server.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stop background tasks, waiting up to [`SHUTDOWN_TIMEOUT`] each.
    pub async fn shutdown(&self) {
        info!("shutting down services");
        self.cancel_token.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "background task panicked"),
                Err(_) => {
                    warn!("background task did not stop in time, detaching");
                }
            }
        }

        info!("services stopped");
    }
}
