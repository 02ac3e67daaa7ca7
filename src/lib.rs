//! JobTrack library
//!
//! Personal job-application tracker: SQLite-backed job records with notes
//! and an activity timeline, per-job document storage, portable archive
//! backup/restore, rclone-based cloud transfer and optional GitHub branch
//! integration.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;

pub use app::App;
pub use error::{AppError, Result};
