//! Download queue routes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/downloads` | Submit a download job |
//! | GET | `/api/downloads/queue` | Active and pending downloads |
//! | GET | `/api/downloads/history` | Finished downloads, paginated |
//! | GET | `/api/downloads/{id}` | Get a job by id |
//! | POST | `/api/downloads/{id}/cancel` | Cancel a pending or active job |
//! | DELETE | `/api/downloads/{id}` | Delete a non-active job record |

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::CancelResponse;
use crate::api::server::AppState;
use crate::database::models::{Job, MediaKind, MediaMetadata};
use crate::queue::{HistoryPage, QueueView};

/// Create the downloads router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_download))
        .route("/queue", get(get_queue))
        .route("/history", get(get_history))
        .route("/{id}", get(get_download).delete(delete_download))
        .route("/{id}/cancel", post(cancel_download))
}

/// Request body for submitting a download.
#[derive(Debug, Deserialize)]
pub struct SubmitDownloadRequest {
    pub url: String,
    pub media_kind: MediaKind,
    pub metadata: MediaMetadata,
}

/// Pagination parameters for the history listing.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

/// Submit a download job with confirmed metadata.
///
/// Jobs are processed one at a time, in submission order.
async fn submit_download(
    State(state): State<AppState>,
    Json(request): Json<SubmitDownloadRequest>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let job = state
        .downloads
        .submit(&request.url, request.media_kind, request.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// List the active download and the pending queue.
async fn get_queue(State(state): State<AppState>) -> ApiResult<Json<QueueView>> {
    Ok(Json(state.downloads.queue().await?))
}

/// List finished downloads, newest first.
async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryPage>> {
    let limit = params.limit.clamp(1, 100);
    Ok(Json(state.downloads.history(limit, params.offset).await?))
}

/// Get a single download job by id.
async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.downloads.get(&id).await?))
}

/// Cancel a pending or active download.
///
/// Cancelling an active download does not abort the in-flight tool run; the
/// job stays cancelled regardless of how that run ends.
async fn cancel_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    if state.downloads.cancel(&id).await? {
        Ok(Json(CancelResponse {
            id,
            cancelled: true,
        }))
    } else {
        Err(ApiError::conflict(
            "download is already completed, failed or cancelled",
        ))
    }
}

/// Delete a download record. Active downloads must be cancelled first.
async fn delete_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.downloads.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
