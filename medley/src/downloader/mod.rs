//! External download collaborator.
//!
//! The queue worker drives downloads through the [`MediaDownloader`] trait;
//! the production implementation shells out to yt-dlp. Tests substitute an
//! in-process fake.

pub mod ytdlp;

pub use ytdlp::YtdlpDownloader;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::Result;
use crate::database::models::{MediaKind, MediaMetadata};

/// Phase label reported alongside a progress percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    /// Probing the source before any bytes are transferred.
    Analyzing,
    /// Transfer in progress.
    Downloading,
    /// Post-download work (merge, audio extraction).
    Processing,
}

/// Progress callback: percent in [0, 100] plus the current phase.
pub type ProgressFn<'a> = &'a (dyn Fn(f64, DownloadPhase) + Send + Sync);

/// Everything a downloader needs to fetch one piece of media.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub media_kind: MediaKind,
    pub metadata: MediaMetadata,
}

/// Trait for external download tools.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download `request.url`, reporting progress ticks through `on_progress`.
    ///
    /// Long-running: minutes to hours. Not preemptible — callers that want to
    /// cancel must wait out the attempt and discard the result.
    ///
    /// Returns the path of the finished file, or a descriptive error on any
    /// subprocess or network failure.
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressFn<'_>,
    ) -> Result<PathBuf>;
}
