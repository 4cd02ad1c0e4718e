//! Database models for medley.
//!
//! These models map directly to the database schema and handle
//! serialization of the kind-tagged metadata payload.

pub mod job;
pub mod metadata;
pub mod playlist;

pub use job::*;
pub use metadata::*;
pub use playlist::*;
