//! Backup service
//!
//! Builds portable archive backups (database snapshot + document tree +
//! manifest, packaged as a ZIP) and restores them destructively, keeping
//! timestamped sibling copies of the replaced state on disk.
//!
//! Database snapshots use a fallback chain: SQLite's native `VACUUM INTO`
//! on a fresh connection, then the sqlite3 CLI `.backup` command, then a
//! raw file copy with retry. The raw copy can observe a mid-write state
//! and is logged as a correctness risk, not a fix.

use crate::config::{
    AppConfig, ARCHIVE_DATABASE_MEMBER, ARCHIVE_FILES_DIRECTORY, ARCHIVE_MANIFEST_MEMBER,
    BACKUP_FORMAT_VERSION, REQUIRED_TABLES, SNAPSHOT_COPY_RETRIES, SNAPSHOT_RETRY_DELAY_MS,
    SQLITE_CLI_TIMEOUT_SECS,
};
use crate::database::{self, RecordCounts, Repository};
use crate::error::{AppError, Result};
use crate::storage::DocumentStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Archive manifest. Field names and member names are the wire format and
/// must stay compatible across versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub backup_version: String,
    pub created_at: String,
    pub database_file: String,
    pub files_directory: String,
    pub statistics: RecordCounts,
    pub application_version: String,
}

/// Which snapshot strategy actually produced the database copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SnapshotStrategy {
    /// SQLite native hot backup via VACUUM INTO
    VacuumInto,
    /// sqlite3 command-line `.backup`
    SqliteCli,
    /// Raw byte copy with retry; consistent only if no writer was active
    FileCopy,
}

/// A freshly built backup archive
#[derive(Debug)]
pub struct BackupArchive {
    pub filename: String,
    pub data: Vec<u8>,
    pub manifest: BackupManifest,
    pub snapshot_strategy: SnapshotStrategy,
}

/// Outcome of a successful restore
#[derive(Debug)]
pub struct RestoreReport {
    pub manifest: BackupManifest,
    /// Timestamped sibling copy of the replaced database, if one existed
    pub database_backup: Option<PathBuf>,
    /// Timestamped sibling copy of the replaced document tree, if one existed
    pub files_backup: Option<PathBuf>,
}

/// Database statistics for the maintenance page
#[derive(Debug, Serialize)]
pub struct DatabaseInfo {
    pub database_size_bytes: u64,
    pub page_count: i64,
    pub page_size: i64,
    pub record_counts: RecordCounts,
}

/// Backup service
#[derive(Clone)]
pub struct BackupService {
    repo: Repository,
    documents: DocumentStore,
    config: AppConfig,
}

impl BackupService {
    pub fn new(repo: Repository, documents: DocumentStore, config: AppConfig) -> Self {
        Self {
            repo,
            documents,
            config,
        }
    }

    // ===== Export =====

    /// Build a complete backup archive: database snapshot, document tree
    /// and manifest. The archive is self-contained and independently
    /// restorable. Scratch files are removed on all exit paths.
    pub async fn build_archive(&self) -> Result<BackupArchive> {
        let filename = format!(
            "job_tracker_backup_{}.zip",
            Utc::now().format("%Y%m%d_%H%M%S")
        );

        tracing::info!("Building backup archive {}", filename);

        let scratch = self.config.app_dir.join(format!("export_scratch_{}", run_id()));
        fs::create_dir_all(&scratch).await?;

        let result = self.build_archive_inner(&scratch).await;

        // Scoped cleanup, success or failure
        let _ = fs::remove_dir_all(&scratch).await;

        let (data, manifest, snapshot_strategy) = result?;

        tracing::info!(
            "Backup archive built: {} ({} bytes, snapshot via {:?})",
            filename,
            data.len(),
            snapshot_strategy
        );

        Ok(BackupArchive {
            filename,
            data,
            manifest,
            snapshot_strategy,
        })
    }

    async fn build_archive_inner(
        &self,
        scratch: &Path,
    ) -> Result<(Vec<u8>, BackupManifest, SnapshotStrategy)> {
        // 1. Consistent database snapshot into the scratch area
        let snapshot_path = scratch.join(ARCHIVE_DATABASE_MEMBER);
        let strategy = self.snapshot_database(&snapshot_path).await?;
        let snapshot_data = fs::read(&snapshot_path).await?;

        // 2. Manifest with current row counts
        let statistics = self.repo.count_records().await?;
        let manifest = BackupManifest {
            backup_version: BACKUP_FORMAT_VERSION.to_string(),
            created_at: Utc::now().to_rfc3339(),
            database_file: ARCHIVE_DATABASE_MEMBER.to_string(),
            files_directory: ARCHIVE_FILES_DIRECTORY.to_string(),
            statistics,
            application_version: env!("CARGO_PKG_VERSION").to_string(),
        };

        // 3. Package everything into one compressed container
        let cursor = std::io::Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(cursor);
        let options =
            FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(ARCHIVE_DATABASE_MEMBER, options)?;
        std::io::Write::write_all(&mut zip, &snapshot_data)?;

        for relative in self.documents.list_relative().await? {
            let member = format!(
                "{}/{}",
                ARCHIVE_FILES_DIRECTORY,
                relative.to_string_lossy().replace('\\', "/")
            );
            let contents = fs::read(self.documents.root().join(&relative)).await?;

            zip.start_file(member.as_str(), options)?;
            std::io::Write::write_all(&mut zip, &contents)?;

            tracing::debug!("Added {} to archive", member);
        }

        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        zip.start_file(ARCHIVE_MANIFEST_MEMBER, options)?;
        std::io::Write::write_all(&mut zip, manifest_json.as_bytes())?;

        let cursor = zip.finish()?;
        Ok((cursor.into_inner(), manifest, strategy))
    }

    /// Export only the database snapshot, no documents or manifest
    pub async fn export_database_only(&self) -> Result<Vec<u8>> {
        let snapshot_path = self
            .config
            .app_dir
            .join(format!("db_export_{}.db", run_id()));

        let result = async {
            self.snapshot_database(&snapshot_path).await?;
            Ok(fs::read(&snapshot_path).await?)
        }
        .await;

        let _ = fs::remove_file(&snapshot_path).await;
        result
    }

    /// Export all jobs as CSV with a fixed column order, for spreadsheet
    /// consumption. Independent of the archive format.
    pub async fn export_jobs_csv(&self) -> Result<String> {
        let mut out = String::from(
            "ID,Company,Title,Location,Remote Option,Salary Low,Salary High,\
             Posting ID,Created Date,Status,Description,Referrer,Company Website,Posting URL\n",
        );

        for job in self.repo.list_jobs().await? {
            let fields = [
                job.id.to_string(),
                job.company,
                job.title,
                job.location,
                job.remote_option.unwrap_or_default(),
                job.salary_range_low.map(|v| v.to_string()).unwrap_or_default(),
                job.salary_range_high.map(|v| v.to_string()).unwrap_or_default(),
                job.posting_id.unwrap_or_default(),
                job.created_dt.format("%Y-%m-%d").to_string(),
                job.posting_status,
                job.description,
                job.referrer.unwrap_or_default(),
                job.company_website.unwrap_or_default(),
                job.posting_url.unwrap_or_default(),
            ];

            let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
            out.push_str(&row.join(","));
            out.push('\n');
        }

        Ok(out)
    }

    // ===== Snapshot fallback chain =====

    /// Snapshot the live database into `dest`, trying strategies in order
    /// and recording which one succeeded.
    pub async fn snapshot_database(&self, dest: &Path) -> Result<SnapshotStrategy> {
        match self.vacuum_into(dest).await {
            Ok(()) => return Ok(SnapshotStrategy::VacuumInto),
            Err(e) => {
                tracing::warn!("VACUUM INTO snapshot failed: {}. Trying sqlite3 CLI", e);
            }
        }

        match self.sqlite_cli_backup(dest).await {
            Ok(()) => return Ok(SnapshotStrategy::SqliteCli),
            Err(e) => {
                tracing::warn!(
                    "sqlite3 CLI snapshot failed: {}. Falling back to raw file copy",
                    e
                );
            }
        }

        // Last resort. A copy taken mid-write can be corrupt; this path is
        // a correctness risk kept only for environments where the engine
        // primitives are unavailable.
        self.copy_with_retry(dest).await?;
        tracing::warn!("Database snapshot taken via raw file copy");
        Ok(SnapshotStrategy::FileCopy)
    }

    /// SQLite's native hot backup: page-by-page, transactionally consistent
    /// even with concurrent readers. Runs on its own fresh connection.
    async fn vacuum_into(&self, dest: &Path) -> Result<()> {
        if dest.exists() {
            fs::remove_file(dest).await?;
        }

        let dest_str = dest
            .to_str()
            .ok_or_else(|| AppError::Backup("Non-UTF8 snapshot path".to_string()))?;

        let pool = database::open_readonly(&self.config.database_path()).await?;
        let result = sqlx::query("VACUUM INTO ?")
            .bind(dest_str)
            .execute(&pool)
            .await;
        pool.close().await;

        result?;

        if !dest.exists() {
            return Err(AppError::Backup(
                "VACUUM INTO produced no output file".to_string(),
            ));
        }

        Ok(())
    }

    /// Shell out to the sqlite3 command-line tool's `.backup` command
    async fn sqlite_cli_backup(&self, dest: &Path) -> Result<()> {
        let db_path = self.config.database_path();

        let output = tokio::time::timeout(
            Duration::from_secs(SQLITE_CLI_TIMEOUT_SECS),
            tokio::process::Command::new("sqlite3")
                .arg(&db_path)
                .arg(format!(".backup '{}'", dest.display()))
                .output(),
        )
        .await
        .map_err(|_| AppError::Backup("sqlite3 CLI backup timed out".to_string()))??;

        if !output.status.success() {
            return Err(AppError::Backup(format!(
                "sqlite3 CLI backup failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if !dest.exists() {
            return Err(AppError::Backup(
                "sqlite3 CLI produced no output file".to_string(),
            ));
        }

        Ok(())
    }

    /// Raw byte-for-byte copy with retry-on-lock backoff
    async fn copy_with_retry(&self, dest: &Path) -> Result<()> {
        let db_path = self.config.database_path();
        let mut last_err: Option<std::io::Error> = None;

        for attempt in 0..SNAPSHOT_COPY_RETRIES {
            match fs::copy(&db_path, dest).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        "Raw copy attempt {} failed: {}",
                        attempt + 1,
                        e
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(SNAPSHOT_RETRY_DELAY_MS)).await;
                }
            }
        }

        Err(last_err
            .map(AppError::Io)
            .unwrap_or_else(|| AppError::Backup("Raw copy failed".to_string())))
    }

    // ===== Import =====

    /// Restore an archive, REPLACING all current state. The previous
    /// database and document tree are kept as timestamped sibling copies
    /// for manual recovery; there is no automatic rollback and no atomic
    /// guarantee across the two replacements.
    ///
    /// The live connection pool is closed by this operation; callers must
    /// reopen the database afterwards.
    pub async fn restore_archive(&self, archive_path: &Path) -> Result<RestoreReport> {
        // One identifier per run: names the scratch area and the sibling
        // safety-net copies, distinct even for restores in the same second.
        let run = run_id();
        let scratch = self
            .config
            .app_dir
            .join(format!("restore_scratch_{}", run));
        fs::create_dir_all(&scratch).await?;

        tracing::info!("Restoring from archive: {:?}", archive_path);

        let result = self.restore_inner(archive_path, &scratch, &run).await;

        // Scratch removal runs on all exit paths
        let _ = fs::remove_dir_all(&scratch).await;

        match &result {
            Ok(report) => tracing::info!(
                "Restore complete: {} jobs, {} notes, {} activities",
                report.manifest.statistics.total_jobs,
                report.manifest.statistics.total_notes,
                report.manifest.statistics.total_activities
            ),
            Err(e) => tracing::error!("Restore failed: {}", e),
        }

        result
    }

    async fn restore_inner(
        &self,
        archive_path: &Path,
        scratch: &Path,
        run: &str,
    ) -> Result<RestoreReport> {
        // 1. Extract. A corrupt container fails here, before any mutation.
        let file = std::fs::File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| AppError::Restore(format!("Invalid backup file format: {}", e)))?;
        archive
            .extract(scratch)
            .map_err(|e| AppError::Restore(format!("Failed to extract archive: {}", e)))?;

        // 2. Validate required members and base tables. No state has been
        // touched yet, so any rejection leaves everything unchanged.
        let manifest = self.validate_extracted(scratch).await?;

        // 3. Force-close pooled connections before touching the backing
        // file; live handles risk silent corruption and stale caches.
        tracing::info!("Closing database pool before replacement");
        self.repo.pool().close().await;

        // 4. Replace the database, keeping a timestamped rollback copy
        let database_backup = self.replace_database(scratch, run).await?;

        // 5. Replace documents only if the archive carries a document tree;
        // a backup taken before any documents existed must not wipe files.
        let files_backup = self.replace_documents(scratch, run).await?;

        Ok(RestoreReport {
            manifest,
            database_backup,
            files_backup,
        })
    }

    async fn validate_extracted(&self, scratch: &Path) -> Result<BackupManifest> {
        let snapshot_path = scratch.join(ARCHIVE_DATABASE_MEMBER);
        let manifest_path = scratch.join(ARCHIVE_MANIFEST_MEMBER);

        if !snapshot_path.exists() || !manifest_path.exists() {
            return Err(AppError::Restore(
                "Invalid backup file format: required members missing".to_string(),
            ));
        }

        let manifest: BackupManifest = serde_json::from_slice(&fs::read(&manifest_path).await?)
            .map_err(|e| AppError::Restore(format!("Invalid manifest: {}", e)))?;

        // Open the snapshot read-only and confirm the base tables exist
        let pool = database::open_readonly(&snapshot_path)
            .await
            .map_err(|e| AppError::Restore(format!("Snapshot is not a database: {}", e)))?;

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&pool)
                .await
                .map_err(|e| AppError::Restore(format!("Snapshot is not readable: {}", e)))?;

        pool.close().await;

        for required in REQUIRED_TABLES {
            if !tables.iter().any(|t| t == required) {
                return Err(AppError::Restore(format!(
                    "Invalid backup file format: missing table {}",
                    required
                )));
            }
        }

        Ok(manifest)
    }

    async fn replace_database(
        &self,
        scratch: &Path,
        run: &str,
    ) -> Result<Option<PathBuf>> {
        let live = self.config.database_path();
        let snapshot = scratch.join(ARCHIVE_DATABASE_MEMBER);

        // Rollback copy of the current database, only if one exists
        let mut database_backup = None;
        if live.exists() {
            let sibling = self
                .config
                .app_dir
                .join(format!("app.db.backup_{}", run));
            fs::copy(&live, &sibling).await?;
            tracing::info!("Previous database preserved at {:?}", sibling);
            database_backup = Some(sibling);
        }

        // Stage next to the live file, then rename into place. Stale WAL
        // and shared-memory files must not survive the swap.
        let incoming = self.config.app_dir.join("app.db.incoming");
        fs::copy(&snapshot, &incoming).await?;

        for suffix in ["-wal", "-shm"] {
            let side = self
                .config
                .app_dir
                .join(format!("{}{}", ARCHIVE_DATABASE_MEMBER, suffix));
            if side.exists() {
                fs::remove_file(&side).await?;
            }
        }

        fs::rename(&incoming, &live).await?;
        tracing::info!("Database restored");

        Ok(database_backup)
    }

    async fn replace_documents(
        &self,
        scratch: &Path,
        run: &str,
    ) -> Result<Option<PathBuf>> {
        let source = scratch.join(ARCHIVE_FILES_DIRECTORY);
        if !source.exists() {
            tracing::info!("Archive has no document tree, leaving current files untouched");
            return Ok(None);
        }

        let live = self.config.file_storage_path();
        let mut files_backup = None;

        if live.exists() {
            let sibling = self
                .config
                .app_dir
                .join(format!("{}.backup_{}", ARCHIVE_FILES_DIRECTORY, run));
            fs::rename(&live, &sibling).await?;
            tracing::info!("Previous documents preserved at {:?}", sibling);
            files_backup = Some(sibling);
        }

        copy_dir_recursive(&source, &live).await?;
        tracing::info!("Documents restored");

        Ok(files_backup)
    }

    // ===== Maintenance =====

    /// Reclaim free pages with VACUUM
    pub async fn vacuum(&self) -> Result<()> {
        sqlx::query("VACUUM").execute(self.repo.pool()).await?;
        tracing::info!("Database vacuumed");
        Ok(())
    }

    /// File size, page statistics and row counts
    pub async fn database_info(&self) -> Result<DatabaseInfo> {
        let db_path = self.config.database_path();
        let database_size_bytes = match fs::metadata(&db_path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };

        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(self.repo.pool())
            .await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(self.repo.pool())
            .await?;

        Ok(DatabaseInfo {
            database_size_bytes,
            page_count,
            page_size,
            record_counts: self.repo.count_records().await?,
        })
    }
}

/// Identifier for one export or restore run, used in scratch and sibling
/// safety-net names. Timestamp for readability plus a random component so
/// two runs in the same second never share a name.
fn run_id() -> String {
    format!(
        "{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &Uuid::new_v4().simple().to_string()[..8]
    )
}

/// Quote a CSV field when it contains separators, quotes or newlines
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn copy_dir_recursive<'a>(
    src: &'a Path,
    dst: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        fs::create_dir_all(dst).await?;

        let mut entries = fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let src_path = entry.path();
            let dst_path = dst.join(entry.file_name());

            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &dst_path).await?;
            } else {
                fs::copy(&src_path, &dst_path).await?;
            }
        }

        Ok(())
    })
}
