//! Activities service
//!
//! Timeline entries for a job: type tag validated against the seeded
//! catalog, short human-readable brief, and an open-ended JSON payload.

use crate::database::{JobActivity, JobActivityType, Repository};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Create activity request
#[derive(Debug, Deserialize)]
pub struct CreateActivityRequest {
    pub job_id: i64,
    pub activity_type: String,
    /// Defaults to now when omitted
    pub activity_date: Option<DateTime<Utc>>,
    pub activity_brief: String,
    /// Arbitrary structured metadata, stored opaque
    #[serde(default)]
    pub activity_json_data: serde_json::Value,
}

/// Service for managing job activities
#[derive(Clone)]
pub struct ActivitiesService {
    repo: Repository,
}

impl ActivitiesService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Record an activity. The type tag must exist in the catalog.
    pub async fn create_activity(&self, req: CreateActivityRequest) -> Result<JobActivity> {
        if !self.repo.activity_type_exists(&req.activity_type).await? {
            return Err(AppError::Validation(format!(
                "Unknown activity type: {}",
                req.activity_type
            )));
        }

        let payload = if req.activity_json_data.is_null() {
            "{}".to_string()
        } else {
            serde_json::to_string(&req.activity_json_data)?
        };

        let activity = self
            .repo
            .create_activity(
                req.job_id,
                req.activity_date.unwrap_or_else(Utc::now),
                &req.activity_type,
                &req.activity_brief,
                &payload,
            )
            .await?;

        tracing::info!(
            "Activity {} ({}) recorded for job {}",
            activity.id,
            activity.activity_type,
            req.job_id
        );

        Ok(activity)
    }

    /// List activities for a job
    pub async fn list_activities(&self, job_id: i64) -> Result<Vec<JobActivity>> {
        self.repo.list_activities(job_id).await
    }

    /// List the activity type catalog
    pub async fn list_activity_types(&self) -> Result<Vec<JobActivityType>> {
        self.repo.list_activity_types().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{initialize_database, CreateJobRequest, Repository};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_service() -> (ActivitiesService, Repository) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool);
        (ActivitiesService::new(repo.clone()), repo)
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
    async fn test_create_activity_with_payload() {
        let (service, repo) = create_test_service().await;
        let job_id = create_job(&repo).await;

        let activity = service
            .create_activity(CreateActivityRequest {
                job_id,
                activity_type: "Interview Scheduled".to_string(),
                activity_date: None,
                activity_brief: "Phone screen Tuesday".to_string(),
                activity_json_data: serde_json::json!({"note_id": 5}),
            })
            .await
            .unwrap();

        assert_eq!(activity.activity_type, "Interview Scheduled");

        let payload: serde_json::Value =
            serde_json::from_str(&activity.activity_json_data).unwrap();
        assert_eq!(payload["note_id"], 5);
    }

    #[tokio::test]
    async fn test_unknown_type_rejected() {
        let (service, repo) = create_test_service().await;
        let job_id = create_job(&repo).await;

        let result = service
            .create_activity(CreateActivityRequest {
                job_id,
                activity_type: "Not In Catalog".to_string(),
                activity_date: None,
                activity_brief: "x".to_string(),
                activity_json_data: serde_json::Value::Null,
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_null_payload_stored_as_empty_object() {
        let (service, repo) = create_test_service().await;
        let job_id = create_job(&repo).await;

        let activity = service
            .create_activity(CreateActivityRequest {
                job_id,
                activity_type: "Sent Email".to_string(),
                activity_date: None,
                activity_brief: "followed up".to_string(),
                activity_json_data: serde_json::Value::Null,
            })
            .await
            .unwrap();

        assert_eq!(activity.activity_json_data, "{}");
    }
}
