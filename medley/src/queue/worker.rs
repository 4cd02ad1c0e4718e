//! The single download worker loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::database::models::{ItemStatus, JobDbModel, JobStatus, JobUpdate};
use crate::database::repositories::{JobRepository, PlaylistRepository};
use crate::downloader::{DownloadPhase, DownloadRequest, MediaDownloader};

/// Drives jobs from pending to a terminal state, strictly one at a time.
///
/// At most one instance runs for the lifetime of the process; the
/// at-most-one-active invariant follows from that, not from a database
/// constraint. The loop survives per-job failures and storage hiccups — only
/// the cancellation token stops it.
pub struct DownloadWorker {
    jobs: Arc<dyn JobRepository>,
    playlists: Arc<dyn PlaylistRepository>,
    downloader: Arc<dyn MediaDownloader>,
    wake: Arc<Notify>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl DownloadWorker {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        playlists: Arc<dyn PlaylistRepository>,
        downloader: Arc<dyn MediaDownloader>,
        wake: Arc<Notify>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            jobs,
            playlists,
            downloader,
            wake,
            poll_interval,
            cancel,
        }
    }

    /// Run until the cancellation token fires.
    ///
    /// Shutdown is cooperative: an in-flight download is not interrupted, and
    /// its final status write always completes before the loop exits.
    pub async fn run(self) {
        info!(poll_secs = self.poll_interval.as_secs(), "download worker started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.jobs.oldest_pending().await {
                Ok(Some(row)) => {
                    self.process(row).await;
                    // Look for the next job immediately; idle waiting below
                    // only happens when the queue is drained.
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    // A failed poll must not kill the loop; log loudly and retry.
                    error!(error = %e, "failed to poll for pending jobs");
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("download worker stopped");
    }

    async fn process(&self, row: JobDbModel) {
        let job = match row.to_job() {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id = %row.id, error = %e, "job row is undecodable, failing it");
                let update = JobUpdate::failed(format!("corrupt job record: {e}"));
                if let Err(e) = self.jobs.update_job(&row.id, update).await {
                    error!(job_id = %row.id, error = %e, "failed to mark corrupt job as failed");
                }
                return;
            }
        };

        // Claim the job. If a cancel slipped in since the poll, the guarded
        // update refuses the transition and the job is skipped.
        match self
            .jobs
            .update_job(&job.id, JobUpdate::status(JobStatus::Downloading))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id = %job.id, "job no longer claimable, skipping");
                return;
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "failed to claim job");
                return;
            }
        }
        self.mirror_linked_item(&job.id, ItemStatus::Downloading, None)
            .await;

        info!(job_id = %job.id, url = %job.source_url, kind = %job.media_kind, "starting download");

        let request = DownloadRequest {
            url: job.source_url.clone(),
            media_kind: job.media_kind,
            metadata: job.metadata.clone(),
        };

        // The downloader reports progress through a synchronous callback;
        // ticks are bridged over a channel so they can be persisted while the
        // download future is still running.
        let (tx, mut rx) = mpsc::unbounded_channel::<(f64, DownloadPhase)>();
        let on_progress = move |percent: f64, phase: DownloadPhase| {
            let _ = tx.send((percent, phase));
        };

        let download = self.downloader.download(&request, &on_progress);
        tokio::pin!(download);

        let result = loop {
            tokio::select! {
                result = &mut download => break result,
                Some((percent, phase)) = rx.recv() => {
                    self.record_progress(&job.id, percent, phase).await;
                }
            }
        };

        match result {
            Ok(path) => {
                let path = path.display().to_string();
                match self.jobs.update_job(&job.id, JobUpdate::completed(&path)).await {
                    Ok(true) => info!(job_id = %job.id, path = %path, "download completed"),
                    Ok(false) => debug!(job_id = %job.id, "job was cancelled before completion"),
                    Err(e) => {
                        error!(job_id = %job.id, error = %e, "failed to record completion")
                    }
                }
                // The file exists regardless of how the job row ended up.
                self.mirror_linked_item(&job.id, ItemStatus::Completed, Some(&path))
                    .await;
            }
            Err(e) => {
                let message = e.to_string();
                warn!(job_id = %job.id, error = %message, "download failed");
                if let Err(e) = self
                    .jobs
                    .update_job(&job.id, JobUpdate::failed(&message))
                    .await
                {
                    error!(job_id = %job.id, error = %e, "failed to record failure");
                }
                self.mirror_linked_item(&job.id, ItemStatus::Failed, None).await;
            }
        }
    }

    async fn record_progress(&self, job_id: &str, percent: f64, phase: DownloadPhase) {
        let update = match phase {
            DownloadPhase::Analyzing => JobUpdate {
                status: Some(JobStatus::Analyzing),
                progress: Some(percent),
                ..JobUpdate::default()
            },
            DownloadPhase::Downloading => JobUpdate {
                status: Some(JobStatus::Downloading),
                progress: Some(percent),
                ..JobUpdate::default()
            },
            DownloadPhase::Processing => JobUpdate::progress(percent),
        };

        // Best-effort: the job may have been cancelled or the write may fail;
        // neither stops the download.
        if let Err(e) = self.jobs.update_job(job_id, update).await {
            error!(job_id = %job_id, error = %e, "failed to record progress");
        }
    }

    /// Keep the playlist item linked to this job (if any) in step with it.
    async fn mirror_linked_item(&self, job_id: &str, status: ItemStatus, file_path: Option<&str>) {
        if let Err(e) = self
            .playlists
            .mark_items_for_job(job_id, status, file_path)
            .await
        {
            warn!(job_id = %job_id, error = %e, "failed to update linked playlist item");
        }
    }
}
