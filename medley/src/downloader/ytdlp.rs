//! yt-dlp download backend with a Jellyfin-style library layout.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use process_utils::{spawn_streaming, tool_command};
use regex::Regex;

use super::{DownloadPhase, DownloadRequest, MediaDownloader, ProgressFn};
use crate::database::models::{MediaKind, MediaMetadata};
use crate::{Error, Result};

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("valid regex"));
static DESTINATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Destination:\s*(.+)").expect("valid regex"));
static MERGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Merging formats into "(.+)""#).expect("valid regex"));

/// Maximum filename component length after sanitizing.
const MAX_NAME_LEN: usize = 200;

/// Downloads media via the yt-dlp CLI into `<media_root>/{Movies,Shows,Music}`.
pub struct YtdlpDownloader {
    media_root: PathBuf,
    cookies_file: Option<PathBuf>,
}

impl YtdlpDownloader {
    pub fn new(media_root: PathBuf, cookies_file: Option<PathBuf>) -> Self {
        Self {
            media_root,
            cookies_file,
        }
    }

    /// yt-dlp output template for the Jellyfin folder layout.
    fn output_template(&self, metadata: &MediaMetadata) -> PathBuf {
        match metadata {
            MediaMetadata::Movie { title, year, .. } => {
                let title = sanitize(title);
                let year = year.unwrap_or_else(|| Utc::now().year());
                let folder = format!("{title} ({year})");
                self.media_root
                    .join("Movies")
                    .join(&folder)
                    .join(format!("{folder}.%(ext)s"))
            }
            MediaMetadata::TvEpisode {
                show,
                year,
                season,
                episode,
                ..
            } => {
                let show = sanitize(show);
                let year = year.map(|y| format!(" ({y})")).unwrap_or_default();
                self.media_root
                    .join("Shows")
                    .join(format!("{show}{year}"))
                    .join(format!("Season {season:02}"))
                    .join(format!("{show} S{season:02}E{episode:02}.%(ext)s"))
            }
            MediaMetadata::MusicTrack {
                artist,
                album,
                track,
                track_number,
                release_year,
            } => {
                let artist = sanitize(artist);
                let album = sanitize(album.as_deref().unwrap_or("Singles"));
                let year = release_year.map(|y| format!(" ({y})")).unwrap_or_default();
                let number = track_number
                    .map(|n| format!("{n:02} - "))
                    .unwrap_or_default();
                let track = sanitize(track);
                self.media_root
                    .join("Music")
                    .join(artist)
                    .join(format!("{album}{year}"))
                    .join(format!("{number}{track}.%(ext)s"))
            }
            MediaMetadata::Commercial { title, year } => {
                let title = sanitize(title);
                let year = year.map(|y| format!(" ({y})")).unwrap_or_default();
                self.media_root
                    .join("Commercials")
                    .join(format!("{title}{year}.%(ext)s"))
            }
        }
    }
}

/// Strip characters that are invalid in library paths and collapse whitespace.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let mut collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.truncate(MAX_NAME_LEN);
    collapsed.trim().to_string()
}

/// Locate the newest file in a directory, used when yt-dlp never printed a
/// destination line (already-downloaded files, unusual extractors).
async fn newest_file(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, entry.path()));
        }
    }
    newest.map(|(_, path)| path)
}

#[async_trait]
impl MediaDownloader for YtdlpDownloader {
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressFn<'_>,
    ) -> Result<PathBuf> {
        let template = self.output_template(&request.metadata);
        let output_dir = template
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.media_root.clone());
        tokio::fs::create_dir_all(&output_dir).await?;

        let mut cmd = tool_command("yt-dlp");
        cmd.arg("--no-warnings")
            .arg("--newline")
            .arg("--progress")
            .arg("-o")
            .arg(&template);

        if let Some(cookies) = &self.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }

        match request.media_kind {
            MediaKind::MusicTrack => {
                cmd.args(["-x", "--audio-format", "mp3", "--audio-quality", "0"]);
            }
            _ => {
                cmd.args([
                    "-f",
                    "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
                    "--merge-output-format",
                    "mp4",
                ]);
            }
        }
        cmd.arg(&request.url);

        on_progress(0.0, DownloadPhase::Analyzing);

        let mut child =
            spawn_streaming(cmd).map_err(|e| Error::Downloader(e.to_string()))?;

        let mut downloaded_file: Option<String> = None;

        while let Some(line) = child
            .next_line()
            .await
            .map_err(|e| Error::Downloader(e.to_string()))?
        {
            if line.contains("[download]") {
                if let Some(caps) = PERCENT_RE.captures(&line)
                    && let Ok(percent) = caps[1].parse::<f64>()
                {
                    on_progress(percent, DownloadPhase::Downloading);
                }
                if let Some(caps) = DESTINATION_RE.captures(&line) {
                    downloaded_file = Some(caps[1].trim().to_string());
                }
                if let Some(caps) = MERGE_RE.captures(&line) {
                    downloaded_file = Some(caps[1].trim().to_string());
                }
            } else if line.contains("[Merger]") || line.contains("[ExtractAudio]") {
                if let Some(caps) = DESTINATION_RE.captures(&line) {
                    downloaded_file = Some(caps[1].trim().to_string());
                }
                on_progress(99.0, DownloadPhase::Processing);
            }
        }

        child
            .wait()
            .await
            .map_err(|e| Error::Downloader(e.to_string()))?;

        match downloaded_file {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(newest_file(&output_dir)
                .await
                .unwrap_or(output_dir)),
        }
    }
}
