//! Document storage for uploaded job files
//!
//! Files live under the storage root in one subfolder per category
//! (Resumes, Job_Descriptions, Cover_Letters) and are stored under
//! generated UUID filenames that preserve the original extension.

use crate::config::{ALLOWED_DOCUMENT_EXTENSIONS, MAX_FILENAME_LENGTH, MAX_UPLOAD_SIZE};
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Document categories, one subfolder each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Resume,
    JobDescription,
    CoverLetter,
}

impl DocumentKind {
    /// Subfolder name under the storage root. These names are part of the
    /// archive format and must not change.
    pub fn folder(&self) -> &'static str {
        match self {
            DocumentKind::Resume => "Resumes",
            DocumentKind::JobDescription => "Job_Descriptions",
            DocumentKind::CoverLetter => "Cover_Letters",
        }
    }

    pub fn all() -> [DocumentKind; 3] {
        [
            DocumentKind::Resume,
            DocumentKind::JobDescription,
            DocumentKind::CoverLetter,
        ]
    }
}

/// On-disk document store
#[derive(Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Create a new document store at the given root directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Initialize the store (create the root and category folders)
    pub async fn initialize(&self) -> Result<()> {
        for kind in DocumentKind::all() {
            fs::create_dir_all(self.root.join(kind.folder())).await?;
        }
        tracing::info!("Document store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Save uploaded data under a fresh unique filename, returning that
    /// filename. Validates extension and size before writing.
    pub async fn save(
        &self,
        kind: DocumentKind,
        original_filename: &str,
        data: &[u8],
    ) -> Result<String> {
        if data.len() > MAX_UPLOAD_SIZE {
            return Err(AppError::Validation(format!(
                "File too large: {} bytes (max {})",
                data.len(),
                MAX_UPLOAD_SIZE
            )));
        }

        let safe_name = sanitize_filename(original_filename);
        let ext = extension_of(&safe_name);
        if !ALLOWED_DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AppError::Validation(format!(
                "Invalid file type for {}. Only PDF and document files allowed",
                original_filename
            )));
        }

        let unique_filename = generate_unique_filename(&safe_name);
        let path = self.path_for(kind, &unique_filename)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to temp file first, then rename into place
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!(
            "Saved {} document: {} ({} bytes)",
            kind.folder(),
            unique_filename,
            data.len()
        );

        Ok(unique_filename)
    }

    /// Read a stored document. A missing file is a recoverable condition
    /// and reads as `None`, not an error.
    pub async fn read(&self, kind: DocumentKind, filename: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(kind, filename)?;

        if !path.exists() {
            tracing::warn!("Document missing on disk: {:?}", path);
            return Ok(None);
        }

        Ok(Some(fs::read(&path).await?))
    }

    /// Check whether a stored document exists on disk
    pub async fn exists(&self, kind: DocumentKind, filename: &str) -> Result<bool> {
        Ok(self.path_for(kind, filename)?.exists())
    }

    /// Delete a stored document. Deleting a missing file is a no-op.
    pub async fn delete(&self, kind: DocumentKind, filename: &str) -> Result<()> {
        let path = self.path_for(kind, filename)?;

        if !path.exists() {
            return Ok(());
        }

        fs::remove_file(&path).await?;
        tracing::debug!("Deleted document: {:?}", path);
        Ok(())
    }

    /// Copy an existing stored document to a fresh unique filename within
    /// the same category. Used when a job reuses the default résumé.
    pub async fn duplicate(&self, kind: DocumentKind, filename: &str) -> Result<String> {
        let src = self.path_for(kind, filename)?;
        if !src.exists() {
            return Err(AppError::DocumentStore(format!(
                "Source file not found: {}",
                filename
            )));
        }

        let new_filename = generate_unique_filename(filename);
        let dst = self.path_for(kind, &new_filename)?;
        fs::copy(&src, &dst).await?;

        Ok(new_filename)
    }

    /// Full path of a stored document; rejects path traversal in filenames.
    pub fn path_for(&self, kind: DocumentKind, filename: &str) -> Result<PathBuf> {
        let safe = sanitize_filename(filename);
        if safe.is_empty() || safe != filename {
            return Err(AppError::DocumentStore(format!(
                "Unsafe filename: {}",
                filename
            )));
        }
        Ok(self.root.join(kind.folder()).join(safe))
    }

    /// List every file under the root with its path relative to the root.
    /// Used by the archive builder to preserve subfolder structure.
    pub async fn list_relative(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        self.scan_directory(&self.root.clone(), &mut files).await?;
        Ok(files)
    }

    fn scan_directory<'a>(
        &'a self,
        dir: &'a Path,
        files: &'a mut Vec<PathBuf>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if !dir.exists() {
                return Ok(());
            }

            let mut entries = fs::read_dir(dir).await?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();

                if path.is_dir() {
                    self.scan_directory(&path, files).await?;
                } else if path.is_file() {
                    if let Ok(relative) = path.strip_prefix(&self.root) {
                        files.push(relative.to_path_buf());
                    }
                }
            }

            Ok(())
        })
    }

    /// Document store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Sanitize a filename to prevent path traversal
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .take(MAX_FILENAME_LENGTH)
        .collect()
}

/// Generate a unique filename preserving the original extension
pub fn generate_unique_filename(original_filename: &str) -> String {
    let ext = extension_of(original_filename);
    if ext.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        format!("{}.{}", Uuid::new_v4(), ext)
    }
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
