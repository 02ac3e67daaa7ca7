//! Error types for the job tracker
//!
//! All errors use thiserror for structured error handling.
//! Cloud sync operations deliberately do NOT use these types; they report
//! a success flag plus message so callers can degrade gracefully.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("Restore error: {0}")]
    Restore(String),

    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("GitHub error: {0}")]
    GitHub(String),

    #[error("{0}")]
    Generic(String),
}

impl serde::Serialize for AppError {
    // Fully qualified: the crate-local Result alias shadows std's here
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_as_message_string() {
        let err = AppError::Validation("missing field".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Validation error: missing field\"");
    }
}
