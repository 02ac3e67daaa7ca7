//! Database models
//!
//! Rust structs representing database entities.
//! All models use serde for serialization at the API boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One tracked job application
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: i64,
    pub company: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub referrer: Option<String>,
    pub referrer_posting_id: Option<String>,
    pub company_website: Option<String>,
    pub posting_url: Option<String>,
    pub salary_range_low: Option<f64>,
    pub salary_range_high: Option<f64>,
    pub remote_option: Option<String>,
    pub posting_id: Option<String>,
    pub created_dt: DateTime<Utc>,
    /// "Open" or "Closed"
    pub posting_status: String,
    pub resume_file: Option<String>,
    pub job_description_file: Option<String>,
    pub cover_letter_file: Option<String>,
    pub github_branch: Option<String>,
}

/// Create job request
#[derive(Debug, Default, Deserialize)]
pub struct CreateJobRequest {
    pub company: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub referrer: Option<String>,
    pub referrer_posting_id: Option<String>,
    pub company_website: Option<String>,
    pub posting_url: Option<String>,
    pub salary_range_low: Option<f64>,
    pub salary_range_high: Option<f64>,
    pub remote_option: Option<String>,
    pub posting_id: Option<String>,
}

/// Update job request; None fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateJobRequest {
    pub id: i64,
    pub company: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub referrer: Option<String>,
    pub referrer_posting_id: Option<String>,
    pub company_website: Option<String>,
    pub posting_url: Option<String>,
    pub salary_range_low: Option<f64>,
    pub salary_range_high: Option<f64>,
    pub remote_option: Option<String>,
    pub posting_id: Option<String>,
}

/// Free-text note attached to a job
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobNote {
    pub id: i64,
    pub job_id: i64,
    /// Sanitized rich-text content
    pub content: String,
    pub created_dt: DateTime<Utc>,
}

/// Timeline entry attached to a job
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobActivity {
    pub id: i64,
    pub job_id: i64,
    pub activity_date: DateTime<Utc>,
    /// Must match an entry in the activity type catalog
    pub activity_type: String,
    pub activity_brief: String,
    /// Opaque JSON blob, consumer-interpreted
    pub activity_json_data: String,
}

/// Catalog entry classifying activities
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobActivityType {
    pub id: i64,
    pub activity_type: String,
}

/// Application setting
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Row counts surfaced in manifests and database info
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecordCounts {
    pub total_jobs: i64,
    pub total_notes: i64,
    pub total_activities: i64,
}
