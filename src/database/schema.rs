//! Database schema and migrations
//!
//! Handles database initialization, schema migrations and seeding of the
//! activity type catalog. Uses SQLite with WAL mode for better concurrency
//! and crash safety.

use crate::error::Result;
use sqlx::{sqlite::SqlitePool, Row};

/// Default activity type catalog, seeded at startup. Additive-only: new
/// entries may be appended in later versions but existing tags never change.
pub const DEFAULT_ACTIVITY_TYPES: &[&str] = &[
    // Application-related
    "Application Submitted",
    "Application Updated",
    "Application Withdrawn",
    "Referral Submitted",
    "Resume Uploaded",
    "Cover Letter Sent",
    // Communication
    "Received Email",
    "Sent Email",
    "Received Phone Call",
    "Left Voicemail",
    "Sent Thank-You Email",
    "Sent Follow-Up Email",
    // Interviews
    "Interview Scheduled",
    "Phone Screen Completed",
    "Technical Interview Completed",
    "On-Site Interview Completed",
    "Final Interview Completed",
    "Interview Rescheduled",
    "Interview Canceled",
    // Company actions
    "Application Viewed by Recruiter",
    "Application Moved to Next Round",
    "Shortlisted for Interview",
    "Offer Extended",
    "Offer Negotiated",
    "Offer Accepted",
    "Offer Declined",
    "Application Rejected",
    // Other
    "Job Saved",
    "Job Posting Closed",
    "Company Researched",
    "Networking Contact Made",
    "Note Added",
    "Note Updated",
    "Note Deleted",
    "Reminder Set",
];

/// Initialize database with schema and seed data
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    // Enable WAL mode for better performance and crash safety
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    // Enable foreign keys so cascade deletes actually fire
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    // Create migrations table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Get current version
    let current_version: i32 = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?
        .get(0);

    tracing::info!("Current database version: {}", current_version);

    apply_migrations(pool, current_version).await?;
    seed_activity_types(pool).await?;

    tracing::info!("Database initialization complete");
    Ok(())
}

async fn apply_migrations(pool: &SqlitePool, current_version: i32) -> Result<()> {
    let migrations = get_migrations();

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Applying migration version {}", version);

            // Execute migration in a transaction
            let mut tx = pool.begin().await?;

            for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
                sqlx::query(statement).execute(&mut *tx).await?;
            }

            sqlx::query("INSERT INTO migrations (version) VALUES (?)")
                .bind(version)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            tracing::info!("Migration version {} applied successfully", version);
        }
    }

    Ok(())
}

/// Seed the activity type catalog. Idempotent: insert-if-absent, so the
/// catalog size after N runs equals the size after 1 run.
pub async fn seed_activity_types(pool: &SqlitePool) -> Result<()> {
    for activity_type in DEFAULT_ACTIVITY_TYPES {
        sqlx::query(
            r#"
            INSERT INTO job_activity_types (activity_type) VALUES (?)
            ON CONFLICT(activity_type) DO NOTHING
            "#,
        )
        .bind(activity_type)
        .execute(pool)
        .await?;
    }

    tracing::debug!("Activity type catalog seeded");
    Ok(())
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![(
        1,
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            location TEXT NOT NULL,
            referrer TEXT,
            referrer_posting_id TEXT,
            company_website TEXT,
            posting_url TEXT,
            salary_range_low REAL,
            salary_range_high REAL,
            remote_option TEXT,
            posting_id TEXT UNIQUE,
            created_dt TEXT NOT NULL,
            posting_status TEXT NOT NULL DEFAULT 'Open',
            resume_file TEXT,
            job_description_file TEXT,
            cover_letter_file TEXT,
            github_branch TEXT
        );

        CREATE TABLE IF NOT EXISTS job_notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_dt TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS job_activities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            activity_date TEXT NOT NULL,
            activity_type TEXT NOT NULL,
            activity_brief TEXT NOT NULL,
            activity_json_data TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS job_activity_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            activity_type TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_job_notes_job_id ON job_notes(job_id);
        CREATE INDEX IF NOT EXISTS idx_job_activities_job_id ON job_activities(job_id)
        "#,
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_initialize_database() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let result: i32 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert!(result >= 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let foreign_keys: i32 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(foreign_keys, 1);
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let count_after_first: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM job_activity_types")
                .fetch_one(&pool)
                .await
                .unwrap();

        assert_eq!(count_after_first, DEFAULT_ACTIVITY_TYPES.len() as i64);

        // Running the seeder again must not grow the catalog
        seed_activity_types(&pool).await.unwrap();
        seed_activity_types(&pool).await.unwrap();

        let count_after_more: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM job_activity_types")
                .fetch_one(&pool)
                .await
                .unwrap();

        assert_eq!(count_after_more, count_after_first);
    }
}
