//! External playlist extraction collaborator.

pub mod ytdlp;

pub use ytdlp::YtdlpExtractor;

use async_trait::async_trait;

use crate::Result;

/// One entry of a remote playlist, in remote order.
#[derive(Debug, Clone)]
pub struct RemoteItem {
    /// Stable identifier of the entry on the remote platform.
    pub remote_item_id: String,
    /// Direct URL used to download this entry.
    pub source_url: String,
    pub title: String,
    pub artist: Option<String>,
    /// Zero-based position within the remote playlist.
    pub position: i64,
}

/// Metadata describing a remote playlist as a whole.
#[derive(Debug, Clone)]
pub struct RemotePlaylistMeta {
    pub remote_playlist_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub item_count: usize,
}

/// Trait for fetching remote playlist state.
#[async_trait]
pub trait PlaylistExtractor: Send + Sync {
    /// Current entries of the playlist, ordered by remote position.
    ///
    /// Any failure (network, invalid cookies, parse error) is surfaced as an
    /// error; the reconciler treats it as fatal for the sync attempt.
    async fn fetch_items(&self, playlist_url: &str) -> Result<Vec<RemoteItem>>;

    /// Title/description/id of the playlist, used when a playlist is added.
    async fn fetch_playlist_meta(&self, playlist_url: &str) -> Result<RemotePlaylistMeta>;
}
