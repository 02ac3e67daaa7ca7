//! Notes service
//!
//! Free-text notes attached to jobs. Content arrives as sanitized rich
//! text from the caller; this layer only enforces presence.

use crate::database::{JobNote, Repository};
use crate::error::{AppError, Result};

/// Service for managing job notes
#[derive(Clone)]
pub struct NotesService {
    repo: Repository,
}

impl NotesService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a note for a job
    pub async fn create_note(&self, job_id: i64, content: &str) -> Result<JobNote> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("Note content is required".to_string()));
        }

        let note = self.repo.create_note(job_id, content).await?;

        tracing::info!("Note {} created for job {}", note.id, job_id);
        Ok(note)
    }

    /// List notes for a job
    pub async fn list_notes(&self, job_id: i64) -> Result<Vec<JobNote>> {
        self.repo.list_notes(job_id).await
    }

    /// Update a note's content
    pub async fn update_note(&self, id: i64, content: &str) -> Result<JobNote> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("Note content is required".to_string()));
        }

        self.repo.update_note(id, content).await
    }

    /// Delete a note
    pub async fn delete_note(&self, id: i64) -> Result<()> {
        self.repo.delete_note(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{initialize_database, CreateJobRequest, Repository};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_service() -> (NotesService, Repository) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool);
        (NotesService::new(repo.clone()), repo)
    }

    async fn create_job(repo: &Repository) -> i64 {
        repo.create_job(
            CreateJobRequest {
                company: "Acme".to_string(),
                title: "Engineer".to_string(),
                description: "desc".to_string(),
                location: "Remote".to_string(),
                ..Default::default()
            },
            None,
            None,
            None,
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_note_crud() {
        let (service, repo) = create_test_service().await;
        let job_id = create_job(&repo).await;

        let note = service.create_note(job_id, "spoke with recruiter").await.unwrap();
        assert_eq!(note.job_id, job_id);

        let updated = service.update_note(note.id, "updated content").await.unwrap();
        assert_eq!(updated.content, "updated content");

        let notes = service.list_notes(job_id).await.unwrap();
        assert_eq!(notes.len(), 1);

        service.delete_note(note.id).await.unwrap();
        assert!(service.list_notes(job_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let (service, repo) = create_test_service().await;
        let job_id = create_job(&repo).await;

        assert!(service.create_note(job_id, "   ").await.is_err());
    }
}
