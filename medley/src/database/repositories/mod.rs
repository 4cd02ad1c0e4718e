//! Repository layer for database access.
//!
//! Implements the Repository Pattern: callers hold `Arc<dyn ...Repository>`
//! and never touch connections or transactions directly.

pub mod job;
pub mod playlist;

pub use job::*;
pub use playlist::*;
