//! Settings service
//!
//! Key/value preferences plus management of the designated default résumé
//! document used when creating jobs.

use crate::database::{Repository, Setting};
use crate::error::{AppError, Result};
use crate::storage::{DocumentKind, DocumentStore};

/// Setting key naming the current default résumé file
pub const DEFAULT_RESUME_KEY: &str = "default_resume";

/// Service for managing settings
#[derive(Clone)]
pub struct SettingsService {
    repo: Repository,
    documents: DocumentStore,
}

impl SettingsService {
    pub fn new(repo: Repository, documents: DocumentStore) -> Self {
        Self { repo, documents }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.repo.get_setting(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() || value.is_empty() {
            return Err(AppError::Validation(
                "Key and value are required".to_string(),
            ));
        }
        self.repo.set_setting(key, value).await
    }

    pub async fn list(&self) -> Result<Vec<Setting>> {
        self.repo.list_settings().await
    }

    /// Store an uploaded default résumé and record its filename
    pub async fn upload_default_resume(
        &self,
        original_filename: &str,
        data: &[u8],
    ) -> Result<String> {
        let filename = self
            .documents
            .save(DocumentKind::Resume, original_filename, data)
            .await?;

        self.repo.set_setting(DEFAULT_RESUME_KEY, &filename).await?;

        tracing::info!("Default resume set to {}", filename);
        Ok(filename)
    }

    /// Read the current default résumé, if one is designated and present
    pub async fn read_default_resume(&self) -> Result<Option<Vec<u8>>> {
        match self.repo.get_setting(DEFAULT_RESUME_KEY).await? {
            Some(filename) => self.documents.read(DocumentKind::Resume, &filename).await,
            None => Ok(None),
        }
    }

    /// Remove the default résumé file and its setting
    pub async fn delete_default_resume(&self) -> Result<()> {
        if let Some(filename) = self.repo.get_setting(DEFAULT_RESUME_KEY).await? {
            self.documents
                .delete(DocumentKind::Resume, &filename)
                .await?;
            self.repo.delete_setting(DEFAULT_RESUME_KEY).await?;
            tracing::info!("Default resume deleted");
        }
        Ok(())
    }
}
