//! Application configuration loaded from environment variables.
//!
//! `dotenvy` is loaded in `main` before this runs, so a `.env` file next to
//! the binary works the same as real environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Default SQLite database URL.
const DEFAULT_DATABASE_URL: &str = "sqlite:medley.db?mode=rwc";

/// Default root for the Jellyfin-style library layout.
const DEFAULT_MEDIA_ROOT: &str = "/mnt/media";

/// Default idle poll interval for the download worker, in seconds.
const DEFAULT_WORKER_POLL_SECS: u64 = 2;

/// Default playlist sync interval in minutes (0 disables the scheduler).
const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 360;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Root directory for the organized media library.
    pub media_root: PathBuf,
    /// Optional Netscape cookies file handed to yt-dlp.
    pub cookies_file: Option<PathBuf>,
    /// Download worker idle poll interval.
    pub worker_poll_interval: Duration,
    /// Interval between automatic full playlist syncs. Zero disables them.
    pub sync_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            media_root: PathBuf::from(DEFAULT_MEDIA_ROOT),
            cookies_file: None,
            worker_poll_interval: Duration::from_secs(DEFAULT_WORKER_POLL_SECS),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_MINUTES * 60),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `DATABASE_URL`
    /// - `MEDIA_ROOT`
    /// - `COOKIES_FILE`
    /// - `WORKER_POLL_SECS`
    /// - `SYNC_INTERVAL_MINUTES` (0 disables scheduled syncs)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL")
            && !url.trim().is_empty()
        {
            config.database_url = url;
        }

        if let Ok(root) = std::env::var("MEDIA_ROOT")
            && !root.trim().is_empty()
        {
            config.media_root = PathBuf::from(root);
        }

        if let Ok(cookies) = std::env::var("COOKIES_FILE")
            && !cookies.trim().is_empty()
        {
            config.cookies_file = Some(PathBuf::from(cookies));
        }

        if let Ok(secs) = std::env::var("WORKER_POLL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| Error::config(format!("invalid WORKER_POLL_SECS: {secs}")))?;
            if secs == 0 {
                return Err(Error::config("WORKER_POLL_SECS must be at least 1"));
            }
            config.worker_poll_interval = Duration::from_secs(secs);
        }

        if let Ok(minutes) = std::env::var("SYNC_INTERVAL_MINUTES") {
            let minutes: u64 = minutes
                .parse()
                .map_err(|_| Error::config(format!("invalid SYNC_INTERVAL_MINUTES: {minutes}")))?;
            config.sync_interval = Duration::from_secs(minutes * 60);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.worker_poll_interval, Duration::from_secs(2));
        assert!(config.cookies_file.is_none());
        assert!(config.database_url.starts_with("sqlite:"));
    }
}
