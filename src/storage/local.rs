//! Local filesystem storage implementation.
//!
//! ## Features
//!
//! - **Atomic writes**: JSON goes to a temp file that is renamed into place
//! - **Manifest backup**: the previous manifest is copied aside before a save
//! - **Validation**: a manifest missing required fields is never written

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{
    ExamFile, ExamSummary, LinksRecord, LinksSummary, Manifest, ManifestDocument,
};
use crate::storage::{BACKUP_FILE, EXAM_FILE, LINKS_FILE, MANIFEST_FILE, SaveOutcome};
use crate::utils::time;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path(MANIFEST_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path(BACKUP_FILE)
    }

    /// Directory holding one exam's files.
    pub fn exam_dir(&self, code: &str) -> Result<PathBuf> {
        validate_code(code)?;
        Ok(self.path(code))
    }

    fn exam_key(code: &str, file: &str) -> Result<String> {
        validate_code(code)?;
        Ok(format!("{code}/{file}"))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data (2-space indent, UTF-8, non-ASCII kept as is).
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn is_file(&self, key: &str) -> bool {
        tokio::fs::metadata(self.path(key))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    // --- Exam directories ---

    /// Codes of every non-hidden subdirectory, sorted.
    pub async fn exam_codes(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::manifest(format!(
                    "data directory not found: {}",
                    self.root_dir.display()
                )));
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut codes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                codes.push(name);
            }
        }
        codes.sort();
        Ok(codes)
    }

    pub async fn exam_dir_exists(&self, code: &str) -> bool {
        match self.exam_dir(code) {
            Ok(dir) => tokio::fs::metadata(dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn has_exam_file(&self, code: &str) -> bool {
        match Self::exam_key(code, EXAM_FILE) {
            Ok(key) => self.is_file(&key).await,
            Err(_) => false,
        }
    }

    // --- Links records ---

    pub async fn load_links(&self, code: &str) -> Result<Option<LinksRecord>> {
        self.read_json(&Self::exam_key(code, LINKS_FILE)?).await
    }

    pub async fn load_links_summary(&self, code: &str) -> Result<Option<LinksSummary>> {
        self.read_json(&Self::exam_key(code, LINKS_FILE)?).await
    }

    /// Replace the links record of `record.exam_code`.
    pub async fn save_links(&self, record: &LinksRecord) -> Result<()> {
        self.write_json(&Self::exam_key(&record.exam_code, LINKS_FILE)?, record)
            .await
    }

    // --- Question content ---

    pub async fn load_exam(&self, code: &str) -> Result<Option<ExamFile>> {
        self.read_json(&Self::exam_key(code, EXAM_FILE)?).await
    }

    /// Question count and name only; question bodies are not materialized.
    pub async fn load_exam_summary(&self, code: &str) -> Result<Option<ExamSummary>> {
        self.read_json(&Self::exam_key(code, EXAM_FILE)?).await
    }

    pub async fn save_exam(&self, code: &str, exam: &ExamFile) -> Result<()> {
        self.write_json(&Self::exam_key(code, EXAM_FILE)?, exam).await
    }

    /// Modification time of the exam's content file.
    pub async fn exam_modified(&self, code: &str) -> Result<Option<DateTime<Utc>>> {
        let path = self.path(&Self::exam_key(code, EXAM_FILE)?);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(Some(time::from_system_time(meta.modified()?))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    // --- Manifest ---

    pub async fn manifest_exists(&self) -> bool {
        self.is_file(MANIFEST_FILE).await
    }

    pub async fn load_manifest(&self) -> Result<Option<Manifest>> {
        self.read_json(MANIFEST_FILE).await
    }

    /// Untyped manifest, for callers that must cope with partial documents.
    pub async fn load_manifest_value(&self) -> Result<Option<Value>> {
        self.read_json(MANIFEST_FILE).await
    }

    /// Save a typed manifest; see [`Self::save_manifest_document`].
    pub async fn save_manifest(&self, manifest: &Manifest) -> Result<SaveOutcome> {
        self.save_manifest_document(&ManifestDocument::from_manifest(manifest)?)
            .await
    }

    /// Recompute totals, validate, back up the previous manifest, then write.
    ///
    /// `totalExams`, `totalQuestions` and `generated` always reflect the
    /// written list. Validation happens before anything touches the disk. A
    /// failed backup is logged and does not stop the write.
    pub async fn save_manifest_document(&self, document: &ManifestDocument) -> Result<SaveOutcome> {
        let mut document = document.clone();
        document.refresh_totals();
        document.validate()?;

        let mut backed_up = false;
        if self.manifest_exists().await {
            match tokio::fs::copy(self.manifest_path(), self.backup_path()).await {
                Ok(_) => {
                    backed_up = true;
                    log::info!("Backup created: {}", self.backup_path().display());
                }
                Err(e) => log::warn!("Manifest backup failed: {e}"),
            }
        }

        self.write_json(MANIFEST_FILE, &document).await?;
        log::info!("Manifest saved: {}", self.manifest_path().display());

        Ok(SaveOutcome {
            backed_up,
            total_exams: document.total_exams(),
            total_questions: document.total_questions(),
        })
    }
}

/// Exam codes become directory names; reject anything that is not a plain name.
fn validate_code(code: &str) -> Result<()> {
    let invalid = code.is_empty()
        || code.starts_with('.')
        || code.contains(['/', '\\'])
        || code.chars().any(char::is_control);
    if invalid {
        return Err(AppError::validation(format!("invalid exam code '{code}'")));
    }
    Ok(())
}
