//! Playlist reconciliation service.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use super::status::{SyncGuard, SyncSnapshot, SyncStatus};
use crate::database::models::{
    DownloadKind, MediaKind, MediaMetadata, PlaylistDbModel, PlaylistItemDbModel,
};
use crate::database::repositories::PlaylistRepository;
use crate::extractor::PlaylistExtractor;
use crate::queue::DownloadService;
use crate::{Error, Result};

/// Outcome of reconciling one playlist.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub playlist_id: String,
    pub playlist_title: String,
    pub remote_items: usize,
    pub new_items: usize,
    pub positions_updated: usize,
    pub repaired_items: usize,
    /// Titles of items whose creation or enqueue failed this run.
    pub failures: Vec<String>,
}

impl SyncReport {
    fn for_playlist(playlist: &PlaylistDbModel) -> Self {
        Self {
            playlist_id: playlist.id.clone(),
            playlist_title: playlist.title.clone(),
            ..Self::default()
        }
    }
}

/// One-way (add-only) synchronization between remote playlists and local
/// playlist items, enqueuing a download job per newly-discovered item.
pub struct PlaylistSyncService {
    playlists: Arc<dyn PlaylistRepository>,
    downloads: Arc<DownloadService>,
    extractor: Arc<dyn PlaylistExtractor>,
    status: Arc<SyncStatus>,
}

impl PlaylistSyncService {
    pub fn new(
        playlists: Arc<dyn PlaylistRepository>,
        downloads: Arc<DownloadService>,
        extractor: Arc<dyn PlaylistExtractor>,
        status: Arc<SyncStatus>,
    ) -> Self {
        Self {
            playlists,
            downloads,
            extractor,
            status,
        }
    }

    pub fn status(&self) -> SyncSnapshot {
        self.status.snapshot()
    }

    /// Register a playlist for syncing, fetching its metadata remotely.
    pub async fn add_playlist(
        &self,
        source_url: &str,
        download_kind: DownloadKind,
    ) -> Result<PlaylistDbModel> {
        Url::parse(source_url)
            .map_err(|e| Error::validation(format!("invalid URL '{source_url}': {e}")))?;

        if self.playlists.find_by_source_url(source_url).await?.is_some() {
            return Err(Error::conflict(format!(
                "playlist with URL '{source_url}' already exists"
            )));
        }

        let meta = self.extractor.fetch_playlist_meta(source_url).await?;
        let playlist = PlaylistDbModel::new(source_url, meta.title, download_kind)
            .with_remote_id(meta.remote_playlist_id)
            .with_description(meta.description);
        self.playlists.create_playlist(&playlist).await?;

        info!(playlist_id = %playlist.id, title = %playlist.title, "playlist added");
        Ok(playlist)
    }

    /// Synchronize a single playlist, waiting for completion.
    ///
    /// Fails with a conflict if any reconciliation run is in flight.
    pub async fn sync_playlist(&self, playlist_id: &str) -> Result<SyncReport> {
        // Resolve before claiming the flag so an unknown id is a plain 404.
        let playlist = self.playlists.get_playlist(playlist_id).await?;
        let guard = Arc::clone(&self.status).try_begin()?;
        self.reconcile(&playlist, &guard).await
    }

    /// Synchronize every playlist, waiting for completion.
    pub async fn sync_all(&self) -> Result<Vec<SyncReport>> {
        let guard = Arc::clone(&self.status).try_begin()?;
        self.run_all(&guard).await
    }

    /// Start a background sync of one playlist. Returns immediately after
    /// claiming the single-flight guard; the guard travels with the task.
    pub async fn spawn_playlist_sync(self: Arc<Self>, playlist_id: &str) -> Result<()> {
        let playlist = self.playlists.get_playlist(playlist_id).await?;
        let guard = Arc::clone(&self.status).try_begin()?;
        let service = self;
        tokio::spawn(async move {
            if let Err(e) = service.reconcile(&playlist, &guard).await {
                warn!(playlist_id = %playlist.id, error = %e, "playlist sync failed");
                guard.set_message(format!("Sync failed for '{}': {e}", playlist.title));
            }
        });
        Ok(())
    }

    /// Start a background sync of all playlists.
    pub fn spawn_sync_all(self: Arc<Self>) -> Result<()> {
        let guard = Arc::clone(&self.status).try_begin()?;
        let service = self;
        tokio::spawn(async move {
            if let Err(e) = service.run_all(&guard).await {
                warn!(error = %e, "full playlist sync failed");
                guard.set_message(format!("Sync failed: {e}"));
            }
        });
        Ok(())
    }

    async fn run_all(&self, guard: &SyncGuard) -> Result<Vec<SyncReport>> {
        let playlists = self.playlists.list_playlists().await?;
        info!(count = playlists.len(), "syncing all playlists");

        let mut reports = Vec::with_capacity(playlists.len());
        for playlist in playlists {
            // One broken playlist (dead URL, revoked cookies) must not block
            // the rest of the catalog.
            match self.reconcile(&playlist, guard).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(playlist_id = %playlist.id, error = %e, "playlist sync failed");
                }
            }
        }

        guard.set_message("Sync completed for all playlists");
        Ok(reports)
    }

    /// Reconcile one playlist: diff by remote item id, append what is new,
    /// update positions in place. Never deletes a local item.
    async fn reconcile(
        &self,
        playlist: &PlaylistDbModel,
        guard: &SyncGuard,
    ) -> Result<SyncReport> {
        guard.set_current(&playlist.id, &playlist.title);
        guard.set_message(format!("Syncing playlist: {}", playlist.title));
        info!(playlist_id = %playlist.id, url = %playlist.source_url, "syncing playlist");

        // Extractor failure aborts the whole attempt; last_synced_at is not
        // touched, so a retry starts from the same state.
        let remote_items = self.extractor.fetch_items(&playlist.source_url).await?;

        let existing = self.playlists.list_items(&playlist.id).await?;
        let existing_by_remote_id: HashMap<&str, &PlaylistItemDbModel> = existing
            .iter()
            .map(|item| (item.remote_item_id.as_str(), item))
            .collect();

        let mut report = SyncReport::for_playlist(playlist);
        report.remote_items = remote_items.len();

        // Repair pass: a crash between item creation and job creation leaves
        // a pending item with no job; give it one now.
        for orphan in self.playlists.items_missing_job(&playlist.id).await? {
            match self.enqueue_item_job(playlist, &orphan).await {
                Ok(()) => report.repaired_items += 1,
                Err(e) => {
                    warn!(item_id = %orphan.id, error = %e, "failed to repair orphaned item");
                    report.failures.push(orphan.title.clone());
                }
            }
        }

        for remote in &remote_items {
            if let Some(existing_item) = existing_by_remote_id.get(remote.remote_item_id.as_str())
            {
                // Known item: only its remote position may change.
                if existing_item.position != remote.position {
                    match self
                        .playlists
                        .update_item_position(&existing_item.id, remote.position)
                        .await
                    {
                        Ok(()) => report.positions_updated += 1,
                        Err(e) => {
                            warn!(item_id = %existing_item.id, error = %e, "failed to update position");
                            report.failures.push(remote.title.clone());
                        }
                    }
                }
                continue;
            }

            // New item: create the row, then enqueue its job. These are
            // deliberately not one transaction — a crash in between is healed
            // by the repair pass on the next sync.
            let item = PlaylistItemDbModel::new(
                &playlist.id,
                &remote.remote_item_id,
                &remote.source_url,
                &remote.title,
                remote.artist.clone(),
                remote.position,
            );
            if let Err(e) = self.playlists.create_item(&item).await {
                warn!(remote_item_id = %remote.remote_item_id, error = %e, "failed to create item");
                report.failures.push(remote.title.clone());
                continue;
            }
            match self.enqueue_item_job(playlist, &item).await {
                Ok(()) => report.new_items += 1,
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "failed to enqueue download");
                    report.failures.push(remote.title.clone());
                }
            }
        }

        if report.failures.is_empty() {
            self.playlists.set_last_synced(&playlist.id).await?;
        }

        info!(
            playlist_id = %playlist.id,
            remote = report.remote_items,
            new = report.new_items,
            repaired = report.repaired_items,
            repositioned = report.positions_updated,
            failed = report.failures.len(),
            "playlist sync finished"
        );
        guard.set_message(format!(
            "Synced '{}': {} new item(s)",
            playlist.title, report.new_items
        ));

        Ok(report)
    }

    /// Create the download job for an item and link the two records.
    async fn enqueue_item_job(
        &self,
        playlist: &PlaylistDbModel,
        item: &PlaylistItemDbModel,
    ) -> Result<()> {
        let (kind, metadata) = job_metadata(playlist, &item.title, item.artist.as_deref());
        let job = self.downloads.submit(&item.source_url, kind, metadata).await?;
        self.playlists.link_item_job(&item.id, &job.id).await?;
        Ok(())
    }
}

/// Build job metadata from a playlist's download kind.
///
/// Audio playlists produce music tracks with the playlist title as album;
/// video playlists produce movies.
fn job_metadata(
    playlist: &PlaylistDbModel,
    title: &str,
    artist: Option<&str>,
) -> (MediaKind, MediaMetadata) {
    match playlist.kind() {
        DownloadKind::Audio => (
            MediaKind::MusicTrack,
            MediaMetadata::MusicTrack {
                artist: artist.unwrap_or("Unknown Artist").to_string(),
                album: Some(playlist.title.clone()),
                track: title.to_string(),
                track_number: None,
                release_year: None,
            },
        ),
        DownloadKind::Video => (
            MediaKind::Movie,
            MediaMetadata::Movie {
                title: title.to_string(),
                year: None,
                description: None,
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_playlists_enqueue_music_tracks_with_album() {
        let playlist = PlaylistDbModel::new("https://example.com/p", "Mix", DownloadKind::Audio);
        let (kind, metadata) = job_metadata(&playlist, "Song", Some("Artist"));
        assert_eq!(kind, MediaKind::MusicTrack);
        match metadata {
            MediaMetadata::MusicTrack { artist, album, track, .. } => {
                assert_eq!(artist, "Artist");
                assert_eq!(album.as_deref(), Some("Mix"));
                assert_eq!(track, "Song");
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[test]
    fn video_playlists_enqueue_movies() {
        let playlist = PlaylistDbModel::new("https://example.com/p", "Clips", DownloadKind::Video);
        let (kind, metadata) = job_metadata(&playlist, "Clip", None);
        assert_eq!(kind, MediaKind::Movie);
        assert!(matches!(metadata, MediaMetadata::Movie { title, .. } if title == "Clip"));
    }

    #[test]
    fn missing_artist_falls_back_to_unknown() {
        let playlist = PlaylistDbModel::new("https://example.com/p", "Mix", DownloadKind::Audio);
        let (_, metadata) = job_metadata(&playlist, "Song", None);
        assert!(
            matches!(metadata, MediaMetadata::MusicTrack { artist, .. } if artist == "Unknown Artist")
        );
    }
}
