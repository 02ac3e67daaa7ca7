//! Cloud sync service
//!
//! Off-site backup transfer through the rclone command-line tool. Every
//! operation degrades to a status struct with a flag and a human-readable
//! message instead of an error: a missing or broken rclone install must
//! never take the rest of the application down with it.
//!
//! All subprocess invocations run under a timeout so a hung remote cannot
//! wedge the caller.

use crate::config::{
    AppConfig, RCLONE_LIST_TIMEOUT_SECS, RCLONE_PROBE_TIMEOUT_SECS,
    RCLONE_RECURSIVE_LIST_TIMEOUT_SECS, RCLONE_TRANSFER_TIMEOUT_SECS,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Outcome of a sync operation that carries no payload
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub ok: bool,
    pub message: String,
}

impl SyncStatus {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Outcome of an upload. On success carries the descriptor of the file as
/// the remote reported it after the transfer.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub ok: bool,
    pub message: String,
    pub remote_path: Option<String>,
    pub size: Option<i64>,
    pub modified: Option<String>,
}

impl UploadResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            remote_path: None,
            size: None,
            modified: None,
        }
    }
}

/// A configured rclone remote
#[derive(Debug, Clone, Serialize)]
pub struct RemoteInfo {
    pub name: String,
    pub remote_type: String,
}

/// Result of enumerating configured remotes
#[derive(Debug, Serialize)]
pub struct RemoteListing {
    pub ok: bool,
    pub message: String,
    pub remotes: Vec<RemoteInfo>,
}

/// A backup file found on a remote
#[derive(Debug, Clone, Serialize)]
pub struct BackupEntry {
    /// Path relative to the configured backup folder
    pub path: String,
    pub name: String,
    pub size: i64,
    pub modified: String,
}

/// Result of listing backups on a remote
#[derive(Debug, Serialize)]
pub struct BackupListing {
    pub ok: bool,
    pub message: String,
    pub backups: Vec<BackupEntry>,
}

/// Result of querying remote storage usage
#[derive(Debug, Serialize)]
pub struct StorageUsage {
    pub ok: bool,
    pub message: String,
    /// Raw key/value fields as reported (Total, Used, Free, ...)
    pub fields: HashMap<String, String>,
}

/// One entry in `rclone lsjson` output
#[derive(Debug, Deserialize)]
struct LsJsonEntry {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Size", default)]
    size: i64,
    #[serde(rename = "ModTime", default)]
    mod_time: String,
    #[serde(rename = "IsDir", default)]
    is_dir: bool,
}

/// Cloud sync service
#[derive(Clone)]
pub struct CloudSyncService {
    config: AppConfig,
    binary: String,
}

impl CloudSyncService {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            binary: "rclone".to_string(),
        }
    }

    /// Override the rclone executable name. Used by tests to exercise the
    /// degraded path with a binary that cannot exist.
    pub fn with_binary(config: AppConfig, binary: impl Into<String>) -> Self {
        Self {
            config,
            binary: binary.into(),
        }
    }

    /// Probe whether rclone is installed and answering
    pub async fn is_available(&self) -> SyncStatus {
        match self
            .run(&["version"], RCLONE_PROBE_TIMEOUT_SECS)
            .await
        {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or("rclone")
                    .to_string();
                SyncStatus::ok(version)
            }
            Ok(output) => SyncStatus::failed(format!(
                "rclone is installed but not working: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Err(message) => SyncStatus::failed(message),
        }
    }

    /// Enumerate configured remotes with their backend types
    pub async fn list_remotes(&self) -> RemoteListing {
        let output = match self.run(&["listremotes"], RCLONE_LIST_TIMEOUT_SECS).await {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                return RemoteListing {
                    ok: false,
                    message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    remotes: Vec::new(),
                }
            }
            Err(message) => {
                return RemoteListing {
                    ok: false,
                    message,
                    remotes: Vec::new(),
                }
            }
        };

        let mut remotes = Vec::new();
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let name = line.trim().trim_end_matches(':');
            if name.is_empty() {
                continue;
            }
            remotes.push(RemoteInfo {
                name: name.to_string(),
                remote_type: self.remote_type(name).await,
            });
        }

        RemoteListing {
            ok: true,
            message: format!("{} remote(s) configured", remotes.len()),
            remotes,
        }
    }

    /// Backend type of a single remote, "unknown" when it cannot be read
    async fn remote_type(&self, name: &str) -> String {
        let args = ["config", "show", name];
        match self.run(&args, RCLONE_LIST_TIMEOUT_SECS).await {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .find_map(|line| {
                        let line = line.trim();
                        line.strip_prefix("type")
                            .map(|rest| rest.trim_start_matches([' ', '=']).trim().to_string())
                    })
                    .unwrap_or_else(|| "unknown".to_string())
            }
            _ => "unknown".to_string(),
        }
    }

    /// Verify a remote answers a directory listing
    pub async fn test_connection(&self, remote: &str) -> SyncStatus {
        let target = format!("{}:", remote);
        match self
            .run(&["lsd", &target], RCLONE_LIST_TIMEOUT_SECS)
            .await
        {
            Ok(output) if output.status.success() => {
                SyncStatus::ok(format!("Connection to {} succeeded", remote))
            }
            Ok(output) => SyncStatus::failed(format!(
                "Connection to {} failed: {}",
                remote,
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Err(message) => SyncStatus::failed(message),
        }
    }

    /// Upload a local backup file to the remote. With no custom path the
    /// file lands under a date-partitioned folder below the configured
    /// backup path. The upload is verified with a listing afterwards.
    pub async fn upload(
        &self,
        local_path: &Path,
        remote: &str,
        custom_path: Option<&str>,
    ) -> UploadResult {
        let filename = match local_path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return UploadResult::failed("Local path has no filename"),
        };
        if !local_path.exists() {
            return UploadResult::failed(format!(
                "Local file not found: {}",
                local_path.display()
            ));
        }

        let remote_path = build_remote_path(
            &self.config.rclone_backup_path,
            custom_path,
            filename,
            Utc::now(),
        );
        let target = format!("{}:{}", remote, remote_path);
        let local = local_path.display().to_string();

        tracing::info!("Uploading {} to {}", local, target);

        match self
            .run(&["copyto", &local, &target], RCLONE_TRANSFER_TIMEOUT_SECS)
            .await
        {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                return UploadResult::failed(format!(
                    "Upload failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ))
            }
            Err(message) => return UploadResult::failed(message),
        }

        // Success means "the destination listing shows the file", not just
        // a zero exit code; silent partial uploads happen. Some backends
        // answer a missing path with an empty listing and exit 0.
        match self
            .run(&["lsjson", &target], RCLONE_LIST_TIMEOUT_SECS)
            .await
        {
            Ok(output) if output.status.success() => {
                let entries: Vec<LsJsonEntry> =
                    serde_json::from_slice(&output.stdout).unwrap_or_default();

                match entries.iter().find(|e| !e.is_dir && e.name == filename) {
                    Some(entry) => UploadResult {
                        ok: true,
                        message: format!("Uploaded to {}", remote_path),
                        remote_path: Some(remote_path),
                        size: Some(entry.size),
                        modified: Some(entry.mod_time.clone()),
                    },
                    None => UploadResult::failed(
                        "Upload reported success but the destination listing does not show the file",
                    ),
                }
            }
            _ => UploadResult::failed(
                "Upload reported success but the file is not listable on the remote",
            ),
        }
    }

    /// List backup archives under the configured backup path, recursively.
    /// Prefers exact backup-name matches; when none exist, falls back to
    /// any ZIP file so renamed backups are still recoverable.
    pub async fn list_backups(&self, remote: &str, custom_path: Option<&str>) -> BackupListing {
        let path = custom_path
            .map(|p| p.trim().trim_matches('/'))
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.config.rclone_backup_path);
        let target = format!("{}:{}", remote, path);
        let output = match self
            .run(&["lsjson", "-R", &target], RCLONE_RECURSIVE_LIST_TIMEOUT_SECS)
            .await
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                return BackupListing {
                    ok: false,
                    message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    backups: Vec::new(),
                }
            }
            Err(message) => {
                return BackupListing {
                    ok: false,
                    message,
                    backups: Vec::new(),
                }
            }
        };

        let entries: Vec<LsJsonEntry> =
            match serde_json::from_slice(&output.stdout) {
                Ok(entries) => entries,
                Err(e) => {
                    return BackupListing {
                        ok: false,
                        message: format!("Unreadable listing from remote: {}", e),
                        backups: Vec::new(),
                    }
                }
            };

        let mut matched = select_backups(&entries);
        matched.sort_by(|a, b| b.modified.cmp(&a.modified));

        BackupListing {
            ok: true,
            message: format!("{} backup(s) found", matched.len()),
            backups: matched,
        }
    }

    /// Download a backup from the remote to a local path. The remote file
    /// is checked for existence first, and the local result must be
    /// non-empty. When the expected file is missing afterwards, the
    /// destination directory is scanned for it under its bare name, which
    /// covers rclone placing the file one level differently.
    pub async fn download(
        &self,
        remote: &str,
        remote_path: &str,
        dest: &Path,
    ) -> SyncStatus {
        let source = format!("{}:{}", remote, remote_path);

        match self
            .run(&["lsjson", &source], RCLONE_LIST_TIMEOUT_SECS)
            .await
        {
            Ok(output) if output.status.success() => {}
            Ok(_) | Err(_) => {
                return SyncStatus::failed(format!("Remote file not found: {}", remote_path))
            }
        }

        let local = dest.display().to_string();

        tracing::info!("Downloading {} to {}", source, local);

        match self
            .run(&["copyto", &source, &local], RCLONE_TRANSFER_TIMEOUT_SECS)
            .await
        {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                return SyncStatus::failed(format!(
                    "Download failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ))
            }
            Err(message) => return SyncStatus::failed(message),
        }

        if !dest.exists() {
            // Recovery scan: rclone sometimes lands the file under its bare
            // name next to the destination. Rename it into place if found.
            let candidate = remote_path
                .rsplit('/')
                .next()
                .map(|name| dest.parent().unwrap_or(Path::new(".")).join(name))
                .filter(|candidate| candidate.exists() && candidate != dest);

            match candidate {
                Some(found) => {
                    if let Err(e) = std::fs::rename(&found, dest) {
                        return SyncStatus::failed(format!(
                            "Downloaded file could not be moved into place: {}",
                            e
                        ));
                    }
                }
                None => {
                    return SyncStatus::failed(
                        "Download reported success but the local file is missing".to_string(),
                    )
                }
            }
        }

        match std::fs::metadata(dest) {
            Ok(meta) if meta.len() > 0 => {
                SyncStatus::ok(format!("Downloaded to {}", dest.display()))
            }
            _ => SyncStatus::failed("Downloaded file is empty".to_string()),
        }
    }

    /// Delete a backup file on the remote
    pub async fn delete(&self, remote: &str, remote_path: &str) -> SyncStatus {
        let target = format!("{}:{}", remote, remote_path);
        match self
            .run(&["deletefile", &target], RCLONE_LIST_TIMEOUT_SECS)
            .await
        {
            Ok(output) if output.status.success() => {
                tracing::info!("Deleted remote backup {}", target);
                SyncStatus::ok(format!("Deleted {}", remote_path))
            }
            Ok(output) => SyncStatus::failed(format!(
                "Delete failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Err(message) => SyncStatus::failed(message),
        }
    }

    /// Storage usage of a remote as raw key/value fields
    pub async fn storage_usage(&self, remote: &str) -> StorageUsage {
        let target = format!("{}:", remote);
        match self
            .run(&["about", &target], RCLONE_LIST_TIMEOUT_SECS)
            .await
        {
            Ok(output) if output.status.success() => {
                let fields: HashMap<String, String> = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .filter_map(|line| {
                        line.split_once(':').map(|(key, value)| {
                            (key.trim().to_string(), value.trim().to_string())
                        })
                    })
                    .collect();

                StorageUsage {
                    ok: true,
                    message: format!("Usage for {}", remote),
                    fields,
                }
            }
            Ok(output) => StorageUsage {
                ok: false,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                fields: HashMap::new(),
            },
            Err(message) => StorageUsage {
                ok: false,
                message,
                fields: HashMap::new(),
            },
        }
    }

    /// Run rclone with a timeout. Spawn failures and timeouts come back as
    /// messages, never panics.
    async fn run(&self, args: &[&str], timeout_secs: u64) -> std::result::Result<Output, String> {
        let mut command = Command::new(&self.binary);
        command.args(args);

        if let Some(config_path) = &self.config.rclone_config_path {
            command.arg("--config").arg(config_path);
        }

        match tokio::time::timeout(Duration::from_secs(timeout_secs), command.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(format!("rclone is not available: {}", e)),
            Err(_) => Err(format!(
                "rclone {} timed out after {}s",
                args.first().unwrap_or(&""),
                timeout_secs
            )),
        }
    }
}

/// Minimum size for the drifted-naming fallback to consider a ZIP a
/// plausible backup. Even an archive of an empty store is larger.
const MIN_PLAUSIBLE_BACKUP_SIZE: i64 = 1024;

/// Layered heuristic: exact backup-name matches win; when none exist, fall
/// back to ZIP files of plausible size so renamed backups are still
/// recoverable. Best-effort discovery, not exact.
fn select_backups(entries: &[LsJsonEntry]) -> Vec<BackupEntry> {
    let files: Vec<&LsJsonEntry> = entries.iter().filter(|e| !e.is_dir).collect();

    let exact: Vec<BackupEntry> = files
        .iter()
        .filter(|e| e.name.starts_with("job_tracker_backup_") && e.name.ends_with(".zip"))
        .map(|e| to_backup_entry(e))
        .collect();

    if !exact.is_empty() {
        return exact;
    }

    files
        .iter()
        .filter(|e| e.name.ends_with(".zip") && e.size >= MIN_PLAUSIBLE_BACKUP_SIZE)
        .map(|e| to_backup_entry(e))
        .collect()
}

fn to_backup_entry(entry: &LsJsonEntry) -> BackupEntry {
    BackupEntry {
        path: entry.path.clone(),
        name: entry.name.clone(),
        size: entry.size,
        modified: entry.mod_time.clone(),
    }
}

/// Build the remote destination path for an upload. A custom path is used
/// verbatim; otherwise the file is partitioned by upload date below the
/// configured backup path.
pub fn build_remote_path(
    backup_path: &str,
    custom_path: Option<&str>,
    filename: &str,
    now: DateTime<Utc>,
) -> String {
    match custom_path {
        Some(custom) if !custom.trim().is_empty() => {
            format!("{}/{}", custom.trim().trim_matches('/'), filename)
        }
        _ => format!(
            "{}/{}/{}",
            backup_path.trim_matches('/'),
            now.format("%Y/%m/%d"),
            filename
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn degraded_service() -> CloudSyncService {
        let config = AppConfig::with_app_dir(std::env::temp_dir());
        CloudSyncService::with_binary(config, "rclone-binary-that-does-not-exist")
    }

    fn entry(name: &str, size: i64, is_dir: bool) -> LsJsonEntry {
        LsJsonEntry {
            path: name.to_string(),
            name: name.to_string(),
            size,
            mod_time: "2026-01-01T00:00:00Z".to_string(),
            is_dir,
        }
    }

    /// Shell script standing in for rclone: every command exits 0, and
    /// lsjson answers with the given body.
    #[cfg(unix)]
    fn fake_rclone(dir: &TempDir, lsjson_body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-rclone");
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"lsjson\" ]; then\n  printf '%s' '{}'\nfi\nexit 0\n",
            lsjson_body
        );
        std::fs::write(&path, script).unwrap();

        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();

        path.display().to_string()
    }

    #[test]
    fn test_build_remote_path_default() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();
        let path = build_remote_path(
            "job-tracker-backups",
            None,
            "job_tracker_backup_20260307_120000.zip",
            now,
        );
        assert_eq!(
            path,
            "job-tracker-backups/2026/03/07/job_tracker_backup_20260307_120000.zip"
        );
    }

    #[test]
    fn test_build_remote_path_custom() {
        let now = Utc::now();
        let path = build_remote_path("unused", Some("/archive/jobs/"), "b.zip", now);
        assert_eq!(path, "archive/jobs/b.zip");
    }

    #[test]
    fn test_build_remote_path_blank_custom_falls_back() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let path = build_remote_path("backups", Some("  "), "b.zip", now);
        assert_eq!(path, "backups/2026/01/02/b.zip");
    }

    #[tokio::test]
    async fn test_missing_binary_degrades_to_status() {
        let service = degraded_service();

        let status = service.is_available().await;
        assert!(!status.ok);
        assert!(status.message.contains("not available"));
    }

    #[tokio::test]
    async fn test_missing_binary_list_remotes() {
        let service = degraded_service();

        let listing = service.list_remotes().await;
        assert!(!listing.ok);
        assert!(listing.remotes.is_empty());
    }

    #[test]
    fn test_select_backups_prefers_exact_names() {
        let entries = vec![
            entry("job_tracker_backup_20260101_000000.zip", 2048, false),
            entry("random.zip", 500_000, false),
            entry("2026", 0, true),
        ];

        let backups = select_backups(&entries);
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].name, "job_tracker_backup_20260101_000000.zip");
    }

    #[test]
    fn test_select_backups_fallback_filters_tiny_zips() {
        let entries = vec![
            entry("renamed_backup.zip", 500_000, false),
            entry("empty.zip", 0, false),
            entry("tiny.zip", 100, false),
            entry("notes.txt", 500_000, false),
        ];

        let backups = select_backups(&entries);
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].name, "renamed_backup.zip");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_rejects_empty_destination_listing() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("b.zip");
        std::fs::write(&local, b"archive bytes").unwrap();

        // Backend answers the post-upload listing with [] and exit 0
        let binary = fake_rclone(&temp, "[]");
        let config = AppConfig::with_app_dir(temp.path().to_path_buf());
        let service = CloudSyncService::with_binary(config, binary);

        let result = service.upload(&local, "remote", None).await;
        assert!(!result.ok);
        assert!(result.remote_path.is_none());
        assert!(result.message.contains("does not show the file"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_confirmed_by_destination_listing() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("b.zip");
        std::fs::write(&local, b"archive bytes").unwrap();

        let listing = r#"[{"Path":"b.zip","Name":"b.zip","Size":13,"ModTime":"2026-01-01T00:00:00Z","IsDir":false}]"#;
        let binary = fake_rclone(&temp, listing);
        let config = AppConfig::with_app_dir(temp.path().to_path_buf());
        let service = CloudSyncService::with_binary(config, binary);

        let result = service
            .upload(&local, "remote", Some("manual-backups"))
            .await;
        assert!(result.ok);
        assert_eq!(result.remote_path.as_deref(), Some("manual-backups/b.zip"));
        assert_eq!(result.size, Some(13));
        assert_eq!(result.modified.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_missing_binary_upload() {
        let service = degraded_service();

        let local = std::env::temp_dir().join("nonexistent_backup.zip");
        let result = service.upload(&local, "remote", None).await;
        assert!(!result.ok);
        assert!(result.remote_path.is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_list_backups() {
        let service = degraded_service();

        let listing = service.list_backups("remote", Some("manual-backups")).await;
        assert!(!listing.ok);
        assert!(listing.backups.is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_storage_usage() {
        let service = degraded_service();

        let usage = service.storage_usage("remote").await;
        assert!(!usage.ok);
        assert!(usage.fields.is_empty());
    }
}
