//! Playlist management routes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/playlists` | List playlists with item counts |
//! | POST | `/api/playlists` | Track a new remote playlist |
//! | GET | `/api/playlists/{id}` | Playlist detail with paginated items |
//! | PATCH | `/api/playlists/{id}` | Update title or download kind |
//! | DELETE | `/api/playlists/{id}` | Stop tracking a playlist |
//! | POST | `/api/playlists/{id}/sync` | Sync this playlist in the background |

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::api::models::{PlaylistDetailResponse, PlaylistResponse, SyncStartedResponse};
use crate::api::server::AppState;
use crate::database::models::{DownloadKind, ItemStatus};

/// Create the playlists router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_playlists).post(add_playlist))
        .route(
            "/{id}",
            get(get_playlist).patch(update_playlist).delete(delete_playlist),
        )
        .route("/{id}/sync", post(sync_playlist))
}

/// Request body for tracking a new playlist.
#[derive(Debug, Deserialize)]
pub struct AddPlaylistRequest {
    pub url: String,
    #[serde(default = "default_download_kind")]
    pub download_kind: DownloadKind,
}

fn default_download_kind() -> DownloadKind {
    DownloadKind::Audio
}

/// Request body for updating a playlist.
#[derive(Debug, Deserialize)]
pub struct UpdatePlaylistRequest {
    pub title: Option<String>,
    pub download_kind: Option<DownloadKind>,
}

/// Query parameters for the item listing of the detail endpoint.
#[derive(Debug, Deserialize)]
pub struct ItemsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    /// Optional item status filter (pending/downloading/completed/failed).
    pub status: Option<ItemStatus>,
}

fn default_limit() -> u32 {
    50
}

/// List all tracked playlists with per-status item counts.
async fn list_playlists(State(state): State<AppState>) -> ApiResult<Json<Vec<PlaylistResponse>>> {
    let playlists = state.playlists.list_playlists().await?;

    let mut responses = Vec::with_capacity(playlists.len());
    for playlist in playlists {
        let counts = state.playlists.status_counts(&playlist.id).await?;
        responses.push(PlaylistResponse::from_parts(playlist, counts));
    }
    Ok(Json(responses))
}

/// Track a new remote playlist. Its title and remote id are fetched on the
/// spot; items arrive with the first sync.
async fn add_playlist(
    State(state): State<AppState>,
    Json(request): Json<AddPlaylistRequest>,
) -> ApiResult<(StatusCode, Json<PlaylistResponse>)> {
    let playlist = state
        .sync
        .add_playlist(&request.url, request.download_kind)
        .await?;
    let counts = state.playlists.status_counts(&playlist.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(PlaylistResponse::from_parts(playlist, counts)),
    ))
}

/// Playlist detail with one page of items, optionally filtered by status.
async fn get_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ItemsParams>,
) -> ApiResult<Json<PlaylistDetailResponse>> {
    let playlist = state.playlists.get_playlist(&id).await?;
    let counts = state.playlists.status_counts(&id).await?;
    let limit = params.limit.clamp(1, 200);
    let (items, total_items) = state
        .playlists
        .list_items_page(&id, limit, params.offset, params.status)
        .await?;

    Ok(Json(PlaylistDetailResponse {
        playlist: PlaylistResponse::from_parts(playlist, counts),
        items,
        total_items,
    }))
}

/// Update a playlist's title or download kind.
async fn update_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePlaylistRequest>,
) -> ApiResult<Json<PlaylistResponse>> {
    let mut playlist = state.playlists.get_playlist(&id).await?;

    if let Some(title) = request.title {
        playlist.title = title;
    }
    if let Some(kind) = request.download_kind {
        playlist.download_kind = kind.as_str().to_string();
    }
    state.playlists.update_playlist(&playlist).await?;

    let playlist = state.playlists.get_playlist(&id).await?;
    let counts = state.playlists.status_counts(&id).await?;
    Ok(Json(PlaylistResponse::from_parts(playlist, counts)))
}

/// Stop tracking a playlist. Items are removed with it; their download jobs
/// and any finished files are kept.
async fn delete_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.playlists.get_playlist(&id).await?;
    state.playlists.delete_playlist(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Kick off a background sync of this playlist.
async fn sync_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<SyncStartedResponse>)> {
    state.sync.spawn_playlist_sync(&id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SyncStartedResponse { started: true }),
    ))
}
