//! Single-flight download queue.
//!
//! [`DownloadService`] is the write/read surface (submit, cancel, queue and
//! history views); [`DownloadWorker`] is the one long-lived task that drains
//! pending jobs in FIFO order, one at a time.

pub mod service;
pub mod worker;

pub use service::{DownloadService, HistoryPage, QueueView};
pub use worker::DownloadWorker;
