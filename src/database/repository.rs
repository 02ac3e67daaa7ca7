//! Repository layer for database operations
//!
//! CRUD operations for jobs, notes, activities, the activity type catalog
//! and settings. Cascade deletes rely on SQLite foreign keys being enabled
//! at connection time.

use super::models::*;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying pool, exposed so the backup subsystem can close it
    /// before touching the database file directly.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ===== Jobs =====

    /// Create a new job. Document filenames are generated by the document
    /// store and passed in already-unique.
    pub async fn create_job(
        &self,
        req: CreateJobRequest,
        resume_file: Option<&str>,
        job_description_file: Option<&str>,
        cover_letter_file: Option<&str>,
    ) -> Result<Job> {
        if let Some(posting_id) = req.posting_id.as_deref() {
            if self.find_job_by_posting_id(posting_id).await?.is_some() {
                return Err(AppError::Validation(format!(
                    "Job posting ID already exists: {}",
                    posting_id
                )));
            }
        }

        let now = Utc::now();

        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (
                company, title, description, location,
                referrer, referrer_posting_id, company_website, posting_url,
                salary_range_low, salary_range_high, remote_option, posting_id,
                created_dt, posting_status,
                resume_file, job_description_file, cover_letter_file
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'Open', ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&req.company)
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.location)
        .bind(&req.referrer)
        .bind(&req.referrer_posting_id)
        .bind(&req.company_website)
        .bind(&req.posting_url)
        .bind(req.salary_range_low)
        .bind(req.salary_range_high)
        .bind(&req.remote_option)
        .bind(&req.posting_id)
        .bind(now)
        .bind(resume_file)
        .bind(job_description_file)
        .bind(cover_letter_file)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created job {} at {}", job.id, job.company);
        Ok(job)
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: i64) -> Result<Job> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::JobNotFound(id))
    }

    /// List all jobs, newest first
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>("SELECT * FROM jobs ORDER BY created_dt DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(jobs)
    }

    /// Look up a job by its external posting identifier
    pub async fn find_job_by_posting_id(&self, posting_id: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE posting_id = ?")
            .bind(posting_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    /// Update a job; unset fields keep their current value
    pub async fn update_job(&self, req: UpdateJobRequest) -> Result<Job> {
        let current = self.get_job(req.id).await?;

        // Same domain error as create_job, instead of the raw UNIQUE failure
        if let Some(posting_id) = req.posting_id.as_deref() {
            if let Some(existing) = self.find_job_by_posting_id(posting_id).await? {
                if existing.id != req.id {
                    return Err(AppError::Validation(format!(
                        "Job posting ID already exists: {}",
                        posting_id
                    )));
                }
            }
        }

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET
                company = ?, title = ?, description = ?, location = ?,
                referrer = ?, referrer_posting_id = ?, company_website = ?,
                posting_url = ?, salary_range_low = ?, salary_range_high = ?,
                remote_option = ?, posting_id = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(req.company.unwrap_or(current.company))
        .bind(req.title.unwrap_or(current.title))
        .bind(req.description.unwrap_or(current.description))
        .bind(req.location.unwrap_or(current.location))
        .bind(req.referrer.or(current.referrer))
        .bind(req.referrer_posting_id.or(current.referrer_posting_id))
        .bind(req.company_website.or(current.company_website))
        .bind(req.posting_url.or(current.posting_url))
        .bind(req.salary_range_low.or(current.salary_range_low))
        .bind(req.salary_range_high.or(current.salary_range_high))
        .bind(req.remote_option.or(current.remote_option))
        .bind(req.posting_id.or(current.posting_id))
        .bind(req.id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Updated job {}", job.id);
        Ok(job)
    }

    /// Set posting status ("Open" or "Closed")
    pub async fn set_posting_status(&self, id: i64, status: &str) -> Result<()> {
        let rows = sqlx::query("UPDATE jobs SET posting_status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::JobNotFound(id));
        }

        tracing::debug!("Job {} status set to {}", id, status);
        Ok(())
    }

    /// Record the GitHub branch created for a job
    pub async fn set_github_branch(&self, id: i64, branch: &str) -> Result<()> {
        let rows = sqlx::query("UPDATE jobs SET github_branch = ? WHERE id = ?")
            .bind(branch)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::JobNotFound(id));
        }

        Ok(())
    }

    /// Delete a job. Notes and activities cascade at the SQL level.
    pub async fn delete_job(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::JobNotFound(id));
        }

        tracing::debug!("Deleted job {}", id);
        Ok(())
    }

    // ===== Notes =====

    /// Create a note for a job
    pub async fn create_note(&self, job_id: i64, content: &str) -> Result<JobNote> {
        // Surface a domain error instead of the raw FK violation
        self.get_job(job_id).await?;

        let now = Utc::now();

        let note = sqlx::query_as::<_, JobNote>(
            r#"
            INSERT INTO job_notes (job_id, content, created_dt)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(content)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created note {} for job {}", note.id, job_id);
        Ok(note)
    }

    /// List notes for a job, newest first
    pub async fn list_notes(&self, job_id: i64) -> Result<Vec<JobNote>> {
        let notes = sqlx::query_as::<_, JobNote>(
            "SELECT * FROM job_notes WHERE job_id = ? ORDER BY created_dt DESC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    /// Update a note's content
    pub async fn update_note(&self, id: i64, content: &str) -> Result<JobNote> {
        sqlx::query_as::<_, JobNote>(
            "UPDATE job_notes SET content = ? WHERE id = ? RETURNING *",
        )
        .bind(content)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Generic(format!("Note not found: {}", id)))
    }

    /// Delete a note
    pub async fn delete_note(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM job_notes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::Generic(format!("Note not found: {}", id)));
        }

        Ok(())
    }

    // ===== Activities =====

    /// Create an activity for a job
    pub async fn create_activity(
        &self,
        job_id: i64,
        activity_date: DateTime<Utc>,
        activity_type: &str,
        activity_brief: &str,
        activity_json_data: &str,
    ) -> Result<JobActivity> {
        self.get_job(job_id).await?;

        let activity = sqlx::query_as::<_, JobActivity>(
            r#"
            INSERT INTO job_activities
                (job_id, activity_date, activity_type, activity_brief, activity_json_data)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(activity_date)
        .bind(activity_type)
        .bind(activity_brief)
        .bind(activity_json_data)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created activity {} for job {}", activity.id, job_id);
        Ok(activity)
    }

    /// List activities for a job, newest first
    pub async fn list_activities(&self, job_id: i64) -> Result<Vec<JobActivity>> {
        let activities = sqlx::query_as::<_, JobActivity>(
            "SELECT * FROM job_activities WHERE job_id = ? ORDER BY activity_date DESC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }

    // ===== Activity type catalog =====

    /// List the full catalog, alphabetically
    pub async fn list_activity_types(&self) -> Result<Vec<JobActivityType>> {
        let types = sqlx::query_as::<_, JobActivityType>(
            "SELECT * FROM job_activity_types ORDER BY activity_type",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(types)
    }

    /// Check whether a tag exists in the catalog
    pub async fn activity_type_exists(&self, activity_type: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM job_activity_types WHERE activity_type = ?")
                .bind(activity_type)
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    // ===== Settings =====

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Set setting: {} = {}", key, value);
        Ok(())
    }

    pub async fn delete_setting(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn list_settings(&self) -> Result<Vec<Setting>> {
        let settings = sqlx::query_as::<_, Setting>("SELECT * FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(settings)
    }

    // ===== Statistics =====

    /// Row counts for the manifest and database info
    pub async fn count_records(&self) -> Result<RecordCounts> {
        let total_jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await?;
        let total_notes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_notes")
            .fetch_one(&self.pool)
            .await?;
        let total_activities: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_activities")
            .fetch_one(&self.pool)
            .await?;

        Ok(RecordCounts {
            total_jobs,
            total_notes,
            total_activities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> Repository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Repository::new(pool)
    }

    fn sample_job(company: &str, posting_id: Option<&str>) -> CreateJobRequest {
        CreateJobRequest {
            company: company.to_string(),
            title: "Software Engineer".to_string(),
            description: "Build things".to_string(),
            location: "Remote".to_string(),
            posting_id: posting_id.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get_job() {
        let repo = create_test_repo().await;

        let job = repo
            .create_job(sample_job("Acme", Some("ACME-1")), None, None, None)
            .await
            .unwrap();

        assert_eq!(job.company, "Acme");
        assert_eq!(job.posting_status, "Open");

        let fetched = repo.get_job(job.id).await.unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.posting_id.as_deref(), Some("ACME-1"));
    }

    #[tokio::test]
    async fn test_duplicate_posting_id_rejected() {
        let repo = create_test_repo().await;

        repo.create_job(sample_job("Acme", Some("ACME-1")), None, None, None)
            .await
            .unwrap();

        let result = repo
            .create_job(sample_job("Other", Some("ACME-1")), None, None, None)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_job_keeps_unset_fields() {
        let repo = create_test_repo().await;

        let job = repo
            .create_job(sample_job("Acme", None), None, None, None)
            .await
            .unwrap();

        let updated = repo
            .update_job(UpdateJobRequest {
                id: job.id,
                title: Some("Senior Engineer".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.title, "Senior Engineer");
        assert_eq!(updated.company, "Acme");
        assert_eq!(updated.location, "Remote");
    }

    #[tokio::test]
    async fn test_update_to_taken_posting_id_rejected() {
        let repo = create_test_repo().await;

        repo.create_job(sample_job("Acme", Some("ACME-1")), None, None, None)
            .await
            .unwrap();
        let other = repo
            .create_job(sample_job("Other", Some("OTHER-1")), None, None, None)
            .await
            .unwrap();

        let result = repo
            .update_job(UpdateJobRequest {
                id: other.id,
                posting_id: Some("ACME-1".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        // Re-asserting a job's own posting ID is not a conflict
        let kept = repo
            .update_job(UpdateJobRequest {
                id: other.id,
                posting_id: Some("OTHER-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(kept.posting_id.as_deref(), Some("OTHER-1"));
    }

    #[tokio::test]
    async fn test_cascade_delete_removes_notes_and_activities() {
        let repo = create_test_repo().await;

        let job = repo
            .create_job(sample_job("Acme", None), None, None, None)
            .await
            .unwrap();

        repo.create_note(job.id, "talked to recruiter").await.unwrap();
        repo.create_activity(job.id, Utc::now(), "Sent Email", "followed up", "{}")
            .await
            .unwrap();

        repo.delete_job(job.id).await.unwrap();

        let notes = repo.list_notes(job.id).await.unwrap();
        let activities = repo.list_activities(job.id).await.unwrap();

        assert!(notes.is_empty());
        assert!(activities.is_empty());
    }

    #[tokio::test]
    async fn test_set_github_branch() {
        let repo = create_test_repo().await;

        let job = repo
            .create_job(sample_job("Acme", None), None, None, None)
            .await
            .unwrap();
        assert!(job.github_branch.is_none());

        repo.set_github_branch(job.id, "job/acme/engineer-20260101-1")
            .await
            .unwrap();

        let fetched = repo.get_job(job.id).await.unwrap();
        assert_eq!(
            fetched.github_branch.as_deref(),
            Some("job/acme/engineer-20260101-1")
        );

        let missing = repo.set_github_branch(999, "job/x/y").await;
        assert!(matches!(missing, Err(AppError::JobNotFound(999))));
    }

    #[tokio::test]
    async fn test_note_requires_existing_job() {
        let repo = create_test_repo().await;

        let result = repo.create_note(999, "orphan").await;
        assert!(matches!(result, Err(AppError::JobNotFound(999))));
    }

    #[tokio::test]
    async fn test_activity_type_catalog() {
        let repo = create_test_repo().await;

        assert!(repo.activity_type_exists("Interview Scheduled").await.unwrap());
        assert!(!repo.activity_type_exists("Made It Up").await.unwrap());

        let types = repo.list_activity_types().await.unwrap();
        assert!(!types.is_empty());
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let repo = create_test_repo().await;

        repo.set_setting("default_resume", "abc.pdf").await.unwrap();
        assert_eq!(
            repo.get_setting("default_resume").await.unwrap(),
            Some("abc.pdf".to_string())
        );

        repo.set_setting("default_resume", "def.pdf").await.unwrap();
        assert_eq!(
            repo.get_setting("default_resume").await.unwrap(),
            Some("def.pdf".to_string())
        );

        repo.delete_setting("default_resume").await.unwrap();
        assert_eq!(repo.get_setting("default_resume").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_count_records() {
        let repo = create_test_repo().await;

        let job = repo
            .create_job(sample_job("Acme", None), None, None, None)
            .await
            .unwrap();
        repo.create_note(job.id, "note").await.unwrap();
        repo.create_activity(job.id, Utc::now(), "Sent Email", "x", "{}")
            .await
            .unwrap();

        let counts = repo.count_records().await.unwrap();
        assert_eq!(counts.total_jobs, 1);
        assert_eq!(counts.total_notes, 1);
        assert_eq!(counts.total_activities, 1);
    }
}
