//! Jobs service
//!
//! High-level job lifecycle: creation with document uploads (or the
//! designated default résumé), updates, closing with a timeline entry,
//! and deletion with best-effort file cleanup.

use crate::database::{CreateJobRequest, Job, Repository, UpdateJobRequest};
use crate::error::{AppError, Result};
use crate::services::activities::{ActivitiesService, CreateActivityRequest};
use crate::services::settings::DEFAULT_RESUME_KEY;
use crate::storage::{DocumentKind, DocumentStore};
use chrono::{DateTime, Utc};

/// An uploaded document: original filename plus raw bytes
#[derive(Debug)]
pub struct DocumentUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Documents accompanying a job creation request
#[derive(Debug, Default)]
pub struct JobDocuments {
    pub resume: Option<DocumentUpload>,
    pub job_description: Option<DocumentUpload>,
    pub cover_letter: Option<DocumentUpload>,
    /// When set and no résumé is uploaded, copy the designated default
    /// résumé into a fresh file for this job.
    pub use_default_resume: bool,
}

/// Service for managing jobs
#[derive(Clone)]
pub struct JobsService {
    repo: Repository,
    documents: DocumentStore,
    activities: ActivitiesService,
}

impl JobsService {
    pub fn new(repo: Repository, documents: DocumentStore) -> Self {
        let activities = ActivitiesService::new(repo.clone());
        Self {
            repo,
            documents,
            activities,
        }
    }

    /// Create a job, persisting any uploaded documents first
    pub async fn create_job(&self, req: CreateJobRequest, docs: JobDocuments) -> Result<Job> {
        if req.company.trim().is_empty()
            || req.title.trim().is_empty()
            || req.description.trim().is_empty()
        {
            return Err(AppError::Validation(
                "Missing required fields: company, title, description".to_string(),
            ));
        }

        let resume_file = match (&docs.resume, docs.use_default_resume) {
            (Some(upload), _) => Some(
                self.documents
                    .save(DocumentKind::Resume, &upload.filename, &upload.data)
                    .await?,
            ),
            (None, true) => self.copy_default_resume().await?,
            (None, false) => None,
        };

        let job_description_file = match &docs.job_description {
            Some(upload) => Some(
                self.documents
                    .save(DocumentKind::JobDescription, &upload.filename, &upload.data)
                    .await?,
            ),
            None => None,
        };

        let cover_letter_file = match &docs.cover_letter {
            Some(upload) => Some(
                self.documents
                    .save(DocumentKind::CoverLetter, &upload.filename, &upload.data)
                    .await?,
            ),
            None => None,
        };

        let job = self
            .repo
            .create_job(
                req,
                resume_file.as_deref(),
                job_description_file.as_deref(),
                cover_letter_file.as_deref(),
            )
            .await?;

        tracing::info!("Job {} created: {} at {}", job.id, job.title, job.company);
        Ok(job)
    }

    /// Copy the designated default résumé into a fresh per-job file.
    /// A missing default is a validation error, not an IO fault.
    async fn copy_default_resume(&self) -> Result<Option<String>> {
        let Some(default_name) = self.repo.get_setting(DEFAULT_RESUME_KEY).await? else {
            return Ok(None);
        };

        if !self.documents.exists(DocumentKind::Resume, &default_name).await? {
            return Err(AppError::Validation(
                "Default resume file not found".to_string(),
            ));
        }

        let copy = self
            .documents
            .duplicate(DocumentKind::Resume, &default_name)
            .await?;

        tracing::debug!("Default resume copied to {}", copy);
        Ok(Some(copy))
    }

    pub async fn get_job(&self, id: i64) -> Result<Job> {
        self.repo.get_job(id).await
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.repo.list_jobs().await
    }

    pub async fn update_job(&self, req: UpdateJobRequest) -> Result<Job> {
        self.repo.update_job(req).await
    }

    /// Close a job: record a "Job Posting Closed" activity, then flip the
    /// posting status.
    pub async fn close_job(
        &self,
        id: i64,
        reason: &str,
        closing_date: DateTime<Utc>,
    ) -> Result<Job> {
        self.activities
            .create_activity(CreateActivityRequest {
                job_id: id,
                activity_type: "Job Posting Closed".to_string(),
                activity_date: Some(closing_date),
                activity_brief: format!("Job closed: {}", reason),
                activity_json_data: serde_json::json!({ "reason": reason }),
            })
            .await?;

        self.repo.set_posting_status(id, "Closed").await?;

        tracing::info!("Job {} closed: {}", id, reason);
        self.repo.get_job(id).await
    }

    /// Delete a job and its documents. Row deletion cascades to notes and
    /// activities; file deletion is best-effort per file and never aborts
    /// the operation.
    pub async fn delete_job(&self, id: i64) -> Result<()> {
        let job = self.repo.get_job(id).await?;

        let files = [
            (DocumentKind::Resume, job.resume_file.as_deref()),
            (DocumentKind::JobDescription, job.job_description_file.as_deref()),
            (DocumentKind::CoverLetter, job.cover_letter_file.as_deref()),
        ];

        for (kind, filename) in files {
            if let Some(filename) = filename {
                if let Err(e) = self.documents.delete(kind, filename).await {
                    tracing::warn!(
                        "Failed to delete {} file {} for job {}: {}",
                        kind.folder(),
                        filename,
                        id,
                        e
                    );
                }
            }
        }

        self.repo.delete_job(id).await?;

        tracing::info!("Job {} deleted", id);
        Ok(())
    }

    /// Read a job's stored document; `None` when no file is recorded or
    /// the recorded file is missing on disk.
    pub async fn read_document(&self, id: i64, kind: DocumentKind) -> Result<Option<Vec<u8>>> {
        let job = self.repo.get_job(id).await?;

        let filename = match kind {
            DocumentKind::Resume => job.resume_file,
            DocumentKind::JobDescription => job.job_description_file,
            DocumentKind::CoverLetter => job.cover_letter_file,
        };

        match filename {
            Some(filename) => self.documents.read(kind, &filename).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    async fn create_test_service() -> (JobsService, Repository, TempDir) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool);
        let temp_dir = TempDir::new().unwrap();
        let documents = DocumentStore::new(temp_dir.path().join("JobTrackerFiles"));
        documents.initialize().await.unwrap();

        (
            JobsService::new(repo.clone(), documents),
            repo,
            temp_dir,
        )
    }

    fn sample_request() -> CreateJobRequest {
        CreateJobRequest {
            company: "Acme".to_string(),
            title: "Engineer".to_string(),
            description: "Build things".to_string(),
            location: "Remote".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_job_with_uploads() {
        let (service, _repo, _temp) = create_test_service().await;

        let job = service
            .create_job(
                sample_request(),
                JobDocuments {
                    resume: Some(DocumentUpload {
                        filename: "resume.pdf".to_string(),
                        data: b"%PDF resume".to_vec(),
                    }),
                    job_description: Some(DocumentUpload {
                        filename: "jd.pdf".to_string(),
                        data: b"%PDF jd".to_vec(),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(job.resume_file.is_some());
        assert!(job.job_description_file.is_some());
        assert!(job.cover_letter_file.is_none());

        let resume = service
            .read_document(job.id, DocumentKind::Resume)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resume, b"%PDF resume");
    }

    #[tokio::test]
    async fn test_create_job_missing_required_fields() {
        let (service, _repo, _temp) = create_test_service().await;

        let result = service
            .create_job(
                CreateJobRequest {
                    company: " ".to_string(),
                    title: "Engineer".to_string(),
                    description: "desc".to_string(),
                    location: "Remote".to_string(),
                    ..Default::default()
                },
                JobDocuments::default(),
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_use_default_resume_copies_file() {
        let (service, repo, _temp) = create_test_service().await;

        let default = service
            .documents
            .save(DocumentKind::Resume, "default_resume.pdf", b"default")
            .await
            .unwrap();
        repo.set_setting(DEFAULT_RESUME_KEY, &default).await.unwrap();

        let job = service
            .create_job(
                sample_request(),
                JobDocuments {
                    use_default_resume: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let resume_file = job.resume_file.unwrap();
        assert_ne!(resume_file, default);

        let contents = service
            .documents
            .read(DocumentKind::Resume, &resume_file)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contents, b"default");
    }

    #[tokio::test]
    async fn test_close_job_records_activity() {
        let (service, repo, _temp) = create_test_service().await;

        let job = service
            .create_job(sample_request(), JobDocuments::default())
            .await
            .unwrap();

        let closed = service
            .close_job(job.id, "position filled", Utc::now())
            .await
            .unwrap();

        assert_eq!(closed.posting_status, "Closed");

        let activities = repo.list_activities(job.id).await.unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, "Job Posting Closed");

        let payload: serde_json::Value =
            serde_json::from_str(&activities[0].activity_json_data).unwrap();
        assert_eq!(payload["reason"], "position filled");
    }

    #[tokio::test]
    async fn test_delete_job_removes_documents() {
        let (service, _repo, _temp) = create_test_service().await;

        let job = service
            .create_job(
                sample_request(),
                JobDocuments {
                    resume: Some(DocumentUpload {
                        filename: "resume.pdf".to_string(),
                        data: b"data".to_vec(),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let resume_file = job.resume_file.clone().unwrap();

        service.delete_job(job.id).await.unwrap();

        assert!(matches!(
            service.get_job(job.id).await,
            Err(AppError::JobNotFound(_))
        ));
        assert!(!service
            .documents
            .exists(DocumentKind::Resume, &resume_file)
            .await
            .unwrap());
    }
}
