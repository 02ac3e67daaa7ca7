//! Application configuration
//!
//! Central location for configuration constants, resource limits and the
//! environment-driven settings (app folder, GitHub credentials, rclone
//! remotes) used throughout the application.

use std::path::PathBuf;

// ===== File Upload Limits =====

/// Maximum size for an uploaded document in bytes (16 MiB)
pub const MAX_UPLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Allowed extensions for uploaded job documents
pub const ALLOWED_DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "doc", "tex"];

/// Maximum length for a stored filename
pub const MAX_FILENAME_LENGTH: usize = 255;

// ===== Archive Members =====

/// Name of the database snapshot member inside a backup archive
pub const ARCHIVE_DATABASE_MEMBER: &str = "app.db";

/// Directory prefix of the document tree inside a backup archive
pub const ARCHIVE_FILES_DIRECTORY: &str = "JobTrackerFiles";

/// Name of the manifest member inside a backup archive
pub const ARCHIVE_MANIFEST_MEMBER: &str = "manifest.json";

/// Archive format version written into every manifest
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// Tables that must be present in a snapshot for an archive to be accepted
pub const REQUIRED_TABLES: &[&str] = &["jobs", "job_notes", "job_activities", "job_activity_types"];

// ===== Snapshot Fallback Limits =====

/// Attempts for the raw file-copy snapshot fallback before giving up.
/// Lock contention on the database file is mostly a Windows problem.
pub const SNAPSHOT_COPY_RETRIES: u32 = 3;

/// Delay between raw-copy retries in milliseconds
pub const SNAPSHOT_RETRY_DELAY_MS: u64 = 500;

// ===== Subprocess Timeouts (seconds) =====

/// Timeout for the rclone version probe
pub const RCLONE_PROBE_TIMEOUT_SECS: u64 = 10;

/// Timeout for listing and connection tests
pub const RCLONE_LIST_TIMEOUT_SECS: u64 = 30;

/// Timeout for recursive backup listings
pub const RCLONE_RECURSIVE_LIST_TIMEOUT_SECS: u64 = 60;

/// Timeout for uploads and downloads
pub const RCLONE_TRANSFER_TIMEOUT_SECS: u64 = 300;

/// Timeout for the sqlite3 CLI snapshot fallback
pub const SQLITE_CLI_TIMEOUT_SECS: u64 = 60;

/// Application configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root folder for the database, documents and scratch space
    pub app_dir: PathBuf,
    /// GitHub personal access token, if branch integration is configured
    pub github_token: Option<String>,
    /// GitHub repository in "owner/name" form
    pub github_repo: Option<String>,
    /// Base branch new job branches fork from
    pub github_base_branch: String,
    /// Custom rclone config file path, if any
    pub rclone_config_path: Option<PathBuf>,
    /// Default rclone remote name, if any
    pub rclone_default_remote: Option<String>,
    /// Path on the remote where backups live
    pub rclone_backup_path: String,
}

impl AppConfig {
    /// Resolve configuration from environment variables, falling back to
    /// `~/JobTracker` for the app folder.
    pub fn from_env() -> Self {
        let app_dir = std::env::var("APP_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("JobTracker")
            });

        Self {
            app_dir,
            github_token: std::env::var("GITHUB_TOKEN").ok(),
            github_repo: std::env::var("GITHUB_REPO").ok(),
            github_base_branch: std::env::var("GITHUB_BASE_BRANCH")
                .unwrap_or_else(|_| "main".to_string()),
            rclone_config_path: std::env::var("RCLONE_CONFIG_PATH").ok().map(PathBuf::from),
            rclone_default_remote: std::env::var("RCLONE_DEFAULT_REMOTE").ok(),
            rclone_backup_path: std::env::var("RCLONE_BACKUP_PATH")
                .unwrap_or_else(|_| "job-tracker-backups".to_string()),
        }
    }

    /// Create a configuration rooted at an explicit folder (used by tests).
    pub fn with_app_dir(app_dir: PathBuf) -> Self {
        Self {
            app_dir,
            github_token: None,
            github_repo: None,
            github_base_branch: "main".to_string(),
            rclone_config_path: None,
            rclone_default_remote: None,
            rclone_backup_path: "job-tracker-backups".to_string(),
        }
    }

    /// Path of the live database file
    pub fn database_path(&self) -> PathBuf {
        self.app_dir.join("app.db")
    }

    /// Root of the document store tree
    pub fn file_storage_path(&self) -> PathBuf {
        self.app_dir.join(ARCHIVE_FILES_DIRECTORY)
    }
}
