//! yt-dlp playlist extraction backend.
//!
//! Uses `--flat-playlist --dump-single-json`: one subprocess call returns the
//! playlist metadata and every entry without resolving individual videos.

use std::path::PathBuf;
use std::sync::LazyLock;

use process_utils::{run_tool, tool_command};
use regex::Regex;
use async_trait::async_trait;
use serde::Deserialize;

use super::{PlaylistExtractor, RemoteItem, RemotePlaylistMeta};
use crate::{Error, Result};

static PLAYLIST_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]list=([A-Za-z0-9_-]+)").expect("valid regex"));

/// Flat-playlist dump as yt-dlp emits it. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct PlaylistDump {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    entries: Vec<EntryDump>,
}

#[derive(Debug, Deserialize)]
struct EntryDump {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    artist: Option<String>,
    creator: Option<String>,
    uploader: Option<String>,
}

/// Fetches playlist state via the yt-dlp CLI.
pub struct YtdlpExtractor {
    cookies_file: Option<PathBuf>,
}

impl YtdlpExtractor {
    pub fn new(cookies_file: Option<PathBuf>) -> Self {
        Self { cookies_file }
    }

    async fn dump(&self, playlist_url: &str) -> Result<PlaylistDump> {
        let mut cmd = tool_command("yt-dlp");
        if let Some(cookies) = &self.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.args(["--dump-single-json", "--flat-playlist", "--no-warnings"])
            .arg(playlist_url);

        let output = run_tool(cmd)
            .await
            .map_err(|e| Error::Extractor(e.to_string()))?;

        serde_json::from_str(&output.stdout)
            .map_err(|e| Error::Extractor(format!("failed to parse playlist dump: {e}")))
    }
}

/// Pull the `list=` parameter out of a playlist URL.
fn playlist_id_from_url(url: &str) -> Option<String> {
    PLAYLIST_ID_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
}

#[async_trait]
impl PlaylistExtractor for YtdlpExtractor {
    async fn fetch_items(&self, playlist_url: &str) -> Result<Vec<RemoteItem>> {
        let dump = self.dump(playlist_url).await?;

        let mut items = Vec::with_capacity(dump.entries.len());
        for (position, entry) in dump.entries.into_iter().enumerate() {
            let Some(id) = entry.id else {
                tracing::warn!(position, "skipping playlist entry without an id");
                continue;
            };
            let source_url = entry
                .url
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={id}"));
            let title = entry.title.unwrap_or_else(|| id.clone());
            let artist = entry.artist.or(entry.creator).or(entry.uploader);

            items.push(RemoteItem {
                remote_item_id: id,
                source_url,
                title,
                artist,
                position: position as i64,
            });
        }
        Ok(items)
    }

    async fn fetch_playlist_meta(&self, playlist_url: &str) -> Result<RemotePlaylistMeta> {
        let dump = self.dump(playlist_url).await?;

        Ok(RemotePlaylistMeta {
            remote_playlist_id: dump.id.or_else(|| playlist_id_from_url(playlist_url)),
            title: dump
                .title
                .unwrap_or_else(|| "Unknown Playlist".to_string()),
            description: dump.description,
            item_count: dump.entries.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_id_is_extracted_from_url() {
        assert_eq!(
            playlist_id_from_url("https://www.youtube.com/playlist?list=PLx_9abc-123"),
            Some("PLx_9abc-123".to_string())
        );
        assert_eq!(playlist_id_from_url("https://example.com/watch?v=x"), None);
    }

    #[test]
    fn dump_deserializes_flat_playlist_json() {
        let json = r#"{
            "id": "PL1",
            "title": "Mix",
            "entries": [
                {"id": "v1", "title": "First", "url": "https://youtu.be/v1", "uploader": "Someone"},
                {"id": "v2", "title": "Second"}
            ]
        }"#;
        let dump: PlaylistDump = serde_json::from_str(json).unwrap();
        assert_eq!(dump.id.as_deref(), Some("PL1"));
        assert_eq!(dump.entries.len(), 2);
        assert_eq!(dump.entries[1].id.as_deref(), Some("v2"));
        assert!(dump.entries[1].url.is_none());
    }
}
