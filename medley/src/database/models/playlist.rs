//! Playlist and playlist item database models.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// What a playlist's items are downloaded as.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DownloadKind {
    /// Extract audio; items become music tracks with the playlist as album.
    Audio,
    /// Keep video; items become movies.
    Video,
}

impl DownloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Download state of a single playlist item, mirroring a subset of job status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "downloading" => Some(Self::Downloading),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Playlist database model.
///
/// Tracks a remote playlist for one-way synchronization.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PlaylistDbModel {
    pub id: String,
    pub source_url: String,
    pub remote_playlist_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// audio or video
    pub download_kind: String,
    pub last_synced_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PlaylistDbModel {
    pub fn new(
        source_url: impl Into<String>,
        title: impl Into<String>,
        download_kind: DownloadKind,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_url: source_url.into(),
            remote_playlist_id: None,
            title: title.into(),
            description: None,
            download_kind: download_kind.as_str().to_string(),
            last_synced_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_remote_id(mut self, remote_playlist_id: Option<String>) -> Self {
        self.remote_playlist_id = remote_playlist_id;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn kind(&self) -> DownloadKind {
        // Unknown values fall back to audio rather than poisoning every read.
        DownloadKind::parse(&self.download_kind).unwrap_or(DownloadKind::Audio)
    }
}

/// Playlist item database model.
///
/// Local mirror of one remote playlist entry. Rows are append-only from the
/// reconciler's point of view: sync never deletes them, even when the remote
/// entry disappears.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PlaylistItemDbModel {
    pub id: String,
    pub playlist_id: String,
    pub remote_item_id: String,
    /// Direct URL of the remote entry, kept so a job can be (re)enqueued
    /// without another playlist fetch.
    pub source_url: String,
    pub title: String,
    pub artist: Option<String>,
    /// Position within the remote playlist; updated in place on reorder.
    pub position: i64,
    /// pending, downloading, completed, failed
    pub download_status: String,
    pub linked_job_id: Option<String>,
    pub file_path: Option<String>,
    pub added_at: String,
    pub downloaded_at: Option<String>,
}

impl PlaylistItemDbModel {
    pub fn new(
        playlist_id: impl Into<String>,
        remote_item_id: impl Into<String>,
        source_url: impl Into<String>,
        title: impl Into<String>,
        artist: Option<String>,
        position: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            playlist_id: playlist_id.into(),
            remote_item_id: remote_item_id.into(),
            source_url: source_url.into(),
            title: title.into(),
            artist,
            position,
            download_status: ItemStatus::Pending.as_str().to_string(),
            linked_job_id: None,
            file_path: None,
            added_at: Utc::now().to_rfc3339(),
            downloaded_at: None,
        }
    }
}

/// Per-status item counts for a playlist, used by list/detail responses.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ItemStatusCounts {
    pub total: i64,
    pub pending: i64,
    pub downloading: i64,
    pub completed: i64,
    pub failed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_new() {
        let playlist = PlaylistDbModel::new("https://example.com/p", "Mix", DownloadKind::Audio)
            .with_remote_id(Some("PL123".to_string()));
        assert_eq!(playlist.download_kind, "audio");
        assert_eq!(playlist.kind(), DownloadKind::Audio);
        assert!(playlist.last_synced_at.is_none());
        assert_eq!(playlist.remote_playlist_id.as_deref(), Some("PL123"));
    }

    #[test]
    fn test_item_new_is_pending() {
        let item =
            PlaylistItemDbModel::new("p1", "v1", "https://example.com/watch?v=v1", "Title", None, 0);
        assert_eq!(item.download_status, "pending");
        assert!(item.linked_job_id.is_none());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ItemStatus::parse("completed"), Some(ItemStatus::Completed));
        assert_eq!(ItemStatus::parse("nope"), None);
        assert_eq!(DownloadKind::parse("video"), Some(DownloadKind::Video));
    }
}
