//! Download queue service: job submission, views, cancellation.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Notify;
use url::Url;

use crate::database::models::{Job, JobDbModel, JobStatus, JobUpdate, MediaKind, MediaMetadata};
use crate::database::repositories::JobRepository;
use crate::{Error, Result};

/// Current queue: the active job (if any) plus pending jobs, oldest first.
#[derive(Debug, Serialize)]
pub struct QueueView {
    pub active: Option<Job>,
    pub pending: Vec<Job>,
}

/// One page of finished jobs, newest first.
#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub downloads: Vec<Job>,
    pub total: i64,
}

/// Service surface of the download queue.
///
/// Shares the job store with the worker; submissions wake the worker through
/// a [`Notify`] so new jobs start without waiting out the poll interval.
pub struct DownloadService {
    jobs: Arc<dyn JobRepository>,
    wake: Arc<Notify>,
}

impl DownloadService {
    pub fn new(jobs: Arc<dyn JobRepository>) -> Self {
        Self {
            jobs,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Handle the worker listens on for new-job wakeups.
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Submit a new download job. The job starts out pending and is picked up
    /// by the worker in creation order.
    pub async fn submit(
        &self,
        source_url: &str,
        media_kind: MediaKind,
        metadata: MediaMetadata,
    ) -> Result<Job> {
        Url::parse(source_url)
            .map_err(|e| Error::validation(format!("invalid URL '{source_url}': {e}")))?;

        if metadata.kind() != media_kind {
            return Err(Error::validation(format!(
                "metadata kind '{}' does not match media kind '{}'",
                metadata.kind().as_str(),
                media_kind.as_str()
            )));
        }

        let row = JobDbModel::new(source_url, &metadata)?;
        self.jobs.create_job(&row).await?;
        self.wake.notify_one();

        tracing::info!(job_id = %row.id, url = %source_url, kind = %media_kind, "download queued");
        row.to_job()
    }

    pub async fn get(&self, id: &str) -> Result<Job> {
        self.jobs.get_job(id).await?.to_job()
    }

    pub async fn queue(&self) -> Result<QueueView> {
        let active = match self.jobs.active_job().await? {
            Some(row) => decode(row),
            None => None,
        };
        let pending = self
            .jobs
            .list_pending()
            .await?
            .into_iter()
            .filter_map(decode)
            .collect();

        Ok(QueueView { active, pending })
    }

    pub async fn history(&self, limit: u32, offset: u32) -> Result<HistoryPage> {
        let (rows, total) = self.jobs.list_history(limit, offset).await?;
        Ok(HistoryPage {
            downloads: rows.into_iter().filter_map(decode).collect(),
            total,
        })
    }

    /// Cancel a job.
    ///
    /// Returns `false` if the job is already terminal. Cancellation is
    /// cooperative: a currently-downloading job is not aborted — the external
    /// tool finishes its attempt and the terminal guard then discards the
    /// late result in favor of the cancelled status.
    pub async fn cancel(&self, id: &str) -> Result<bool> {
        let row = self.jobs.get_job(id).await?;
        let status = JobStatus::parse(&row.status)
            .ok_or_else(|| Error::Database(format!("unknown job status '{}'", row.status)))?;

        if status.is_terminal() {
            return Ok(false);
        }

        let cancelled = self
            .jobs
            .update_job(id, JobUpdate::status(JobStatus::Cancelled))
            .await?;
        if cancelled {
            tracing::info!(job_id = %id, "download cancelled");
        }
        Ok(cancelled)
    }

    /// Delete a job record. Active jobs cannot be deleted; cancel first.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let row = self.jobs.get_job(id).await?;
        if JobStatus::parse(&row.status).is_some_and(|s| s.is_active()) {
            return Err(Error::conflict("cannot delete an active download"));
        }
        self.jobs.delete_job(id).await
    }
}

/// Decode a row into the domain view, dropping (and logging) corrupt rows so
/// one bad record cannot take down a whole listing.
fn decode(row: JobDbModel) -> Option<Job> {
    match row.to_job() {
        Ok(job) => Some(job),
        Err(e) => {
            tracing::warn!(job_id = %row.id, error = %e, "skipping undecodable job row");
            None
        }
    }
}
