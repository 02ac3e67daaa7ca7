//! Application state and initialization
//!
//! All services are initialized here and made available through App.
//! Restore replaces the database file on disk, so the App can also drop
//! and rebuild everything that holds a pool reference.

use crate::config::AppConfig;
use crate::database::{self, Repository};
use crate::error::Result;
use crate::services::{
    ActivitiesService, BackupService, CloudSyncService, GitHubService, JobsService, NotesService,
    SettingsService,
};
use crate::storage::DocumentStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Central application state holding all services
#[derive(Clone)]
pub struct App {
    pub config: AppConfig,
    pub repo: Repository,
    pub documents: DocumentStore,
    pub jobs: JobsService,
    pub notes: NotesService,
    pub activities: ActivitiesService,
    pub settings: SettingsService,
    pub backup: BackupService,
    pub cloud: CloudSyncService,
    pub github: GitHubService,
}

impl App {
    /// Initialize the application from environment configuration
    pub async fn from_env() -> Result<Self> {
        Self::with_config(AppConfig::from_env()).await
    }

    /// Initialize the application with an explicit configuration
    pub async fn with_config(config: AppConfig) -> Result<Self> {
        tracing::info!("Initializing application at {:?}", config.app_dir);

        std::fs::create_dir_all(&config.app_dir)?;

        let pool = database::create_pool(&config.database_path()).await?;
        let repo = Repository::new(pool);

        let documents = DocumentStore::new(config.file_storage_path());
        documents.initialize().await?;

        let app = Self {
            jobs: JobsService::new(repo.clone(), documents.clone()),
            notes: NotesService::new(repo.clone()),
            activities: ActivitiesService::new(repo.clone()),
            settings: SettingsService::new(repo.clone(), documents.clone()),
            backup: BackupService::new(repo.clone(), documents.clone(), config.clone()),
            cloud: CloudSyncService::new(config.clone()),
            github: GitHubService::new(config.clone()),
            repo,
            documents,
            config,
        };

        tracing::info!("Application initialized successfully");
        Ok(app)
    }

    /// Rebuild the App on a fresh pool. Required after a restore, which
    /// closes the previous pool and swaps the database file underneath it.
    pub async fn reopen_database(self) -> Result<Self> {
        tracing::info!("Reopening database after restore");
        Self::with_config(self.config).await
    }

    /// Create the GitHub branch for a job and record it on the row. An
    /// already-existing branch is recorded the same way.
    pub async fn create_job_branch(
        &self,
        job_id: i64,
    ) -> Result<crate::services::BranchCreation> {
        let job = self.repo.get_job(job_id).await?;
        let creation = self.github.create_branch(&job).await?;
        self.repo.set_github_branch(job_id, &creation.branch).await?;
        Ok(creation)
    }
}

/// Initialize logging. RUST_LOG overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobtrack=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
