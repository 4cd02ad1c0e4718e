//! Download job database model and domain view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::metadata::{MediaKind, MediaMetadata};
use crate::{Error, Result};

/// Job database model.
///
/// Timestamps are stored as RFC 3339 UTC strings; `created_at` ordering is
/// therefore also lexicographic, which `oldest_pending` relies on.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JobDbModel {
    pub id: String,
    pub source_url: String,
    /// Media kind discriminant: movie, tv_episode, music_track, commercial
    pub media_kind: String,
    /// Kind-tagged JSON payload (see [`MediaMetadata`])
    pub metadata: String,
    /// Status: pending, analyzing, downloading, completed, failed, cancelled
    pub status: String,
    /// Percent complete in [0, 100]
    pub progress: f64,
    pub error: Option<String>,
    pub output_path: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl JobDbModel {
    pub fn new(source_url: impl Into<String>, metadata: &MediaMetadata) -> Result<Self> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_url: source_url.into(),
            media_kind: metadata.kind().as_str().to_string(),
            metadata: serde_json::to_string(metadata)?,
            status: JobStatus::Pending.as_str().to_string(),
            progress: 0.0,
            error: None,
            output_path: None,
            created_at: Utc::now().to_rfc3339(),
            started_at: None,
            completed_at: None,
        })
    }

    /// Decode into the typed domain view.
    pub fn to_job(&self) -> Result<Job> {
        let status = JobStatus::parse(&self.status)
            .ok_or_else(|| Error::Database(format!("unknown job status '{}'", self.status)))?;
        let media_kind = MediaKind::parse(&self.media_kind)
            .ok_or_else(|| Error::Database(format!("unknown media kind '{}'", self.media_kind)))?;
        let metadata: MediaMetadata = serde_json::from_str(&self.metadata)?;

        Ok(Job {
            id: self.id.clone(),
            source_url: self.source_url.clone(),
            media_kind,
            metadata,
            status,
            progress: self.progress,
            error: self.error.clone(),
            output_path: self.output_path.clone(),
            created_at: parse_timestamp(&self.created_at)?,
            started_at: self.started_at.as_deref().map(parse_timestamp).transpose()?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("invalid timestamp '{s}': {e}")))
}

/// Job status values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, waiting for the worker.
    Pending,
    /// Worker is probing the source before the transfer starts.
    Analyzing,
    /// Transfer in progress.
    Downloading,
    /// Finished successfully; `output_path` is set.
    Completed,
    /// Finished with an error; `error` is set.
    Failed,
    /// Cancelled by the user.
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "analyzing" => Some(Self::Analyzing),
            "downloading" => Some(Self::Downloading),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal statuses are immutable once written.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Statuses that count against the at-most-one-active invariant.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Analyzing | Self::Downloading)
    }
}

/// Typed view of a download job, as exposed by services and the API.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub source_url: String,
    pub media_kind: MediaKind,
    pub metadata: MediaMetadata,
    pub status: JobStatus,
    pub progress: f64,
    pub error: Option<String>,
    pub output_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Partial update applied to a job row.
///
/// Only provided fields are written. The repository enforces the lifecycle
/// guards: terminal statuses never change again, `started_at` is stamped on
/// the first transition into an active status, `completed_at` on transition
/// into completed/failed, and progress never decreases.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<f64>,
    pub error: Option<String>,
    pub output_path: Option<String>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(progress: f64) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn completed(output_path: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100.0),
            output_path: Some(output_path.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_new() {
        let metadata = MediaMetadata::Movie {
            title: "Example".to_string(),
            year: Some(2001),
            description: None,
        };
        let job = JobDbModel::new("https://example.com/v", &metadata).unwrap();
        assert_eq!(job.status, "pending");
        assert_eq!(job.media_kind, "movie");
        assert_eq!(job.progress, 0.0);
        assert!(job.started_at.is_none());

        let decoded = job.to_job().unwrap();
        assert_eq!(decoded.status, JobStatus::Pending);
        assert_eq!(decoded.metadata, metadata);
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Downloading.is_terminal());
        assert!(!JobStatus::Analyzing.is_terminal());
    }

    #[test]
    fn test_job_status_active() {
        assert!(JobStatus::Downloading.is_active());
        assert!(JobStatus::Analyzing.is_active());
        assert!(!JobStatus::Pending.is_active());
        assert!(!JobStatus::Completed.is_active());
    }
}
