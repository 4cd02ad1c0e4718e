//! API route modules.
//!
//! Organizes routes by resource type.

pub mod downloads;
pub mod health;
pub mod playlists;
pub mod sync;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/downloads", downloads::router())
        .nest("/api/playlists", playlists::router())
        .nest("/api/sync", sync::router())
        .nest("/health", health::router())
        .with_state(state)
}
