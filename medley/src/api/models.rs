//! Shared API response models.

use serde::Serialize;

use crate::database::models::{ItemStatusCounts, PlaylistDbModel, PlaylistItemDbModel};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Playlist with per-status item counts.
#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    pub id: String,
    pub source_url: String,
    pub remote_playlist_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub download_kind: String,
    pub last_synced_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub item_count: i64,
    pub pending_count: i64,
    pub downloading_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
}

impl PlaylistResponse {
    pub fn from_parts(playlist: PlaylistDbModel, counts: ItemStatusCounts) -> Self {
        Self {
            id: playlist.id,
            source_url: playlist.source_url,
            remote_playlist_id: playlist.remote_playlist_id,
            title: playlist.title,
            description: playlist.description,
            download_kind: playlist.download_kind,
            last_synced_at: playlist.last_synced_at,
            created_at: playlist.created_at,
            updated_at: playlist.updated_at,
            item_count: counts.total,
            pending_count: counts.pending,
            downloading_count: counts.downloading,
            completed_count: counts.completed,
            failed_count: counts.failed,
        }
    }
}

/// Playlist detail: the playlist plus one page of its items.
#[derive(Debug, Serialize)]
pub struct PlaylistDetailResponse {
    pub playlist: PlaylistResponse,
    pub items: Vec<PlaylistItemDbModel>,
    pub total_items: i64,
}

/// Response to a sync trigger.
#[derive(Debug, Serialize)]
pub struct SyncStartedResponse {
    pub started: bool,
}

/// Response to a cancellation request.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub id: String,
    pub cancelled: bool,
}
