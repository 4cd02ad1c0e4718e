//! Job repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::{JobDbModel, JobStatus, JobUpdate};
use crate::{Error, Result};

/// Job repository trait.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create_job(&self, job: &JobDbModel) -> Result<()>;
    async fn get_job(&self, id: &str) -> Result<JobDbModel>;

    /// Apply a partial update under the lifecycle guards.
    ///
    /// Returns `true` if a write was applied. Unknown ids and updates against
    /// a terminal row are silent no-ops (`false`): progress reports from a
    /// finished or cancelled attempt are best-effort and must never resurrect
    /// a job.
    async fn update_job(&self, id: &str, update: JobUpdate) -> Result<bool>;

    async fn delete_job(&self, id: &str) -> Result<bool>;

    /// The pending job with the smallest `created_at`, ties broken by
    /// insertion order.
    async fn oldest_pending(&self) -> Result<Option<JobDbModel>>;

    /// The job currently in an active status, most recently started first.
    ///
    /// There should be at most one; if storage integrity is ever violated
    /// this still returns the most recently started rather than erroring.
    async fn active_job(&self) -> Result<Option<JobDbModel>>;

    async fn list_pending(&self) -> Result<Vec<JobDbModel>>;

    /// Terminal jobs, newest `completed_at` first, with the total count.
    async fn list_history(&self, limit: u32, offset: u32) -> Result<(Vec<JobDbModel>, i64)>;

    /// Requeue jobs left in an active status by a crashed process.
    ///
    /// Called once at startup, before the worker runs. Returns the number of
    /// jobs reset.
    async fn reset_stale_active(&self) -> Result<i64>;
}

/// SQLx implementation of JobRepository.
pub struct SqlxJobRepository {
    pool: SqlitePool,
}

impl SqlxJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqlxJobRepository {
    async fn create_job(&self, job: &JobDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, source_url, media_kind, metadata, status, progress,
                              error, output_path, created_at, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.source_url)
        .bind(&job.media_kind)
        .bind(&job.metadata)
        .bind(&job.status)
        .bind(job.progress)
        .bind(&job.error)
        .bind(&job.output_path)
        .bind(&job.created_at)
        .bind(&job.started_at)
        .bind(&job.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<JobDbModel> {
        sqlx::query_as::<_, JobDbModel>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Job", id))
    }

    async fn update_job(&self, id: &str, update: JobUpdate) -> Result<bool> {
        // Single bounded read-modify-write transaction on one row.
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, JobDbModel>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(false);
        };

        let current = JobStatus::parse(&row.status)
            .ok_or_else(|| Error::Database(format!("unknown job status '{}'", row.status)))?;

        // Terminal rows are immutable.
        if current.is_terminal() {
            tracing::debug!(job_id = %id, status = %current, "dropping update to terminal job");
            return Ok(false);
        }

        let status = update.status.unwrap_or(current);

        let mut progress = row.progress;
        if let Some(p) = update.progress {
            // Monotonic: a stale lower percentage never wins.
            progress = progress.max(p.clamp(0.0, 100.0));
        }

        let started_at = if row.started_at.is_none() && status.is_active() {
            Some(Utc::now().to_rfc3339())
        } else {
            row.started_at
        };

        let completed_at = if row.completed_at.is_none()
            && matches!(status, JobStatus::Completed | JobStatus::Failed)
        {
            Some(Utc::now().to_rfc3339())
        } else {
            row.completed_at
        };

        // error is set iff failed, output_path iff completed.
        let error = match status {
            JobStatus::Failed => update.error.or(row.error),
            _ => None,
        };
        let output_path = match status {
            JobStatus::Completed => update.output_path.or(row.output_path),
            _ => None,
        };

        sqlx::query(
            r#"
            UPDATE jobs SET
                status = ?,
                progress = ?,
                error = ?,
                output_path = ?,
                started_at = ?,
                completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(progress)
        .bind(&error)
        .bind(&output_path)
        .bind(&started_at)
        .bind(&completed_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_job(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn oldest_pending(&self) -> Result<Option<JobDbModel>> {
        let job = sqlx::query_as::<_, JobDbModel>(
            "SELECT * FROM jobs WHERE status = 'pending' ORDER BY created_at ASC, rowid ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn active_job(&self) -> Result<Option<JobDbModel>> {
        let job = sqlx::query_as::<_, JobDbModel>(
            r#"
            SELECT * FROM jobs
            WHERE status IN ('analyzing', 'downloading')
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn list_pending(&self) -> Result<Vec<JobDbModel>> {
        let jobs = sqlx::query_as::<_, JobDbModel>(
            "SELECT * FROM jobs WHERE status = 'pending' ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn list_history(&self, limit: u32, offset: u32) -> Result<(Vec<JobDbModel>, i64)> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM jobs WHERE status IN ('completed', 'failed', 'cancelled')",
        )
        .fetch_one(&self.pool)
        .await?;

        let jobs = sqlx::query_as::<_, JobDbModel>(
            r#"
            SELECT * FROM jobs
            WHERE status IN ('completed', 'failed', 'cancelled')
            ORDER BY completed_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((jobs, total))
    }

    async fn reset_stale_active(&self) -> Result<i64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = 'pending', progress = 0.0, started_at = NULL
            WHERE status IN ('analyzing', 'downloading')
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::MediaMetadata;
    use crate::database::{init_pool, run_migrations};

    async fn repo() -> SqlxJobRepository {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqlxJobRepository::new(pool)
    }

    fn movie(title: &str) -> MediaMetadata {
        MediaMetadata::Movie {
            title: title.to_string(),
            year: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn terminal_status_is_immutable() {
        let repo = repo().await;
        let job = JobDbModel::new("https://example.com/a", &movie("A")).unwrap();
        repo.create_job(&job).await.unwrap();

        assert!(
            repo.update_job(&job.id, JobUpdate::status(JobStatus::Cancelled))
                .await
                .unwrap()
        );

        // A late completion from the worker must not resurrect the job.
        assert!(
            !repo
                .update_job(&job.id, JobUpdate::completed("/out.mp4"))
                .await
                .unwrap()
        );
        let row = repo.get_job(&job.id).await.unwrap();
        assert_eq!(row.status, "cancelled");
        assert!(row.output_path.is_none());
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_clamped() {
        let repo = repo().await;
        let job = JobDbModel::new("https://example.com/a", &movie("A")).unwrap();
        repo.create_job(&job).await.unwrap();
        repo.update_job(&job.id, JobUpdate::status(JobStatus::Downloading))
            .await
            .unwrap();

        repo.update_job(&job.id, JobUpdate::progress(40.0))
            .await
            .unwrap();
        repo.update_job(&job.id, JobUpdate::progress(25.0))
            .await
            .unwrap();
        assert_eq!(repo.get_job(&job.id).await.unwrap().progress, 40.0);

        repo.update_job(&job.id, JobUpdate::progress(250.0))
            .await
            .unwrap();
        assert_eq!(repo.get_job(&job.id).await.unwrap().progress, 100.0);
    }

    #[tokio::test]
    async fn update_of_missing_job_is_a_noop() {
        let repo = repo().await;
        assert!(
            !repo
                .update_job("missing", JobUpdate::progress(50.0))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn started_at_is_stamped_once() {
        let repo = repo().await;
        let job = JobDbModel::new("https://example.com/a", &movie("A")).unwrap();
        repo.create_job(&job).await.unwrap();

        repo.update_job(&job.id, JobUpdate::status(JobStatus::Downloading))
            .await
            .unwrap();
        let first = repo.get_job(&job.id).await.unwrap().started_at.unwrap();

        repo.update_job(&job.id, JobUpdate::status(JobStatus::Analyzing))
            .await
            .unwrap();
        let second = repo.get_job(&job.id).await.unwrap().started_at.unwrap();
        assert_eq!(first, second);
    }
}
