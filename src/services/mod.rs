//! Service layer
//!
//! Business logic on top of the repository and document store: job
//! lifecycle, notes, activity timeline, settings, backup/restore, cloud
//! transfer and GitHub branch integration.

pub mod activities;
pub mod backup;
pub mod cloud;
pub mod github;
pub mod jobs;
pub mod notes;
pub mod settings;

pub use activities::{ActivitiesService, CreateActivityRequest};
pub use backup::{
    BackupArchive, BackupManifest, BackupService, DatabaseInfo, RestoreReport, SnapshotStrategy,
};
pub use cloud::{
    BackupEntry, BackupListing, CloudSyncService, RemoteInfo, RemoteListing, StorageUsage,
    SyncStatus, UploadResult,
};
pub use github::{BranchCreation, GitHubService};
pub use jobs::{DocumentUpload, JobDocuments, JobsService};
pub use notes::NotesService;
pub use settings::{SettingsService, DEFAULT_RESUME_KEY};
