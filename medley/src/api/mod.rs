//! REST API server module.
//!
//! Provides HTTP endpoints for the download queue, playlists, and sync
//! control.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use server::ApiServer;
