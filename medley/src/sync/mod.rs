//! One-way playlist synchronization.
//!
//! [`PlaylistSyncService`] reconciles remote playlists against local state
//! (add-only: items are created and repositioned, never deleted) and enqueues
//! a download job per newly-discovered item. [`SyncStatus`] is the
//! process-wide single-flight guard for reconciliation runs.

pub mod service;
pub mod status;

pub use service::{PlaylistSyncService, SyncReport};
pub use status::{SyncGuard, SyncSnapshot, SyncStatus};
