//! Sync control routes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/sync/playlists` | Sync all playlists in the background |
//! | GET | `/api/sync/status` | Current sync status |

use axum::{Json, Router, extract::State, http::StatusCode, routing::{get, post}};

use crate::api::error::ApiResult;
use crate::api::models::SyncStartedResponse;
use crate::api::server::AppState;
use crate::sync::SyncSnapshot;

/// Create the sync router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/playlists", post(sync_all_playlists))
        .route("/status", get(sync_status))
}

/// Kick off a background sync of every tracked playlist.
///
/// Returns 409 when a sync is already running.
async fn sync_all_playlists(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<SyncStartedResponse>)> {
    state.sync.spawn_sync_all()?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SyncStartedResponse { started: true }),
    ))
}

/// Current single-flight sync state.
async fn sync_status(State(state): State<AppState>) -> Json<SyncSnapshot> {
    Json(state.sync.status())
}
