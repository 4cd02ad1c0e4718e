//! Single-flight guard and status snapshot for playlist sync runs.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::{Error, Result};

/// Point-in-time view of the sync state, as exposed by the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSnapshot {
    pub is_running: bool,
    pub current_playlist_id: Option<String>,
    pub current_playlist_title: Option<String>,
    pub progress_message: String,
}

/// Process-wide single-flight flag for playlist reconciliation.
///
/// Independent of the download worker: reconciliation may run while a
/// download is mid-flight; the two only meet in the job store.
#[derive(Debug, Default)]
pub struct SyncStatus {
    inner: Mutex<SyncSnapshot>,
}

impl SyncStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim the running flag.
    ///
    /// The check and the set happen inside one critical section, so two
    /// concurrent callers can never both start a sync. Returns a guard that
    /// resets the flag (and the current-playlist fields) when dropped, on
    /// every exit path.
    pub fn try_begin(self: Arc<Self>) -> Result<SyncGuard> {
        {
            let mut state = self.inner.lock();
            if state.is_running {
                return Err(Error::conflict("a playlist sync is already running"));
            }
            state.is_running = true;
            state.progress_message = "Starting sync".to_string();
        }
        Ok(SyncGuard { status: self })
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.inner.lock().clone()
    }
}

/// RAII handle over a claimed sync run.
pub struct SyncGuard {
    status: Arc<SyncStatus>,
}

impl SyncGuard {
    pub fn set_current(&self, playlist_id: &str, title: &str) {
        let mut state = self.status.inner.lock();
        state.current_playlist_id = Some(playlist_id.to_string());
        state.current_playlist_title = Some(title.to_string());
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.status.inner.lock().progress_message = message.into();
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        // The last progress message is kept for inspection after the run.
        let mut state = self.status.inner.lock();
        state.is_running = false;
        state.current_playlist_id = None;
        state.current_playlist_title = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_fails_while_guard_is_held() {
        let status = Arc::new(SyncStatus::new());
        let guard = Arc::clone(&status).try_begin().unwrap();
        assert!(Arc::clone(&status).try_begin().is_err());
        drop(guard);
        assert!(Arc::clone(&status).try_begin().is_ok());
    }

    #[test]
    fn drop_resets_running_and_current_fields() {
        let status = Arc::new(SyncStatus::new());
        {
            let guard = Arc::clone(&status).try_begin().unwrap();
            guard.set_current("p1", "Mix");
            guard.set_message("Syncing playlist: Mix");
            assert!(status.snapshot().is_running);
        }
        let snapshot = status.snapshot();
        assert!(!snapshot.is_running);
        assert!(snapshot.current_playlist_id.is_none());
        assert!(snapshot.current_playlist_title.is_none());
        assert_eq!(snapshot.progress_message, "Syncing playlist: Mix");
    }
}
