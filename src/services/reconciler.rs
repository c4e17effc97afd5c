// src/services/reconciler.rs

//! Manifest reconciliation.
//!
//! The manifest is a cache over the exam directories. A full reconciliation
//! rebuilds it from disk; a single-exam update patches one entry. Both keep
//! operator-written descriptions.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    DomainDetection, DomainSummary, Manifest, ManifestDocument, ManifestEntry, SourceInfo,
};
use crate::services::classifier::DomainTable;
use crate::storage::LocalStorage;
use crate::utils::time;

/// Why an exam directory produced no manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingExamFile,
    NoQuestions,
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingExamFile => f.write_str("exam.json not found"),
            SkipReason::NoQuestions => f.write_str("no questions"),
            SkipReason::Unreadable(e) => write!(f, "unreadable: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Found(ManifestEntry),
    Skipped(SkipReason),
}

/// Result of a full reconciliation.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub manifest: Manifest,
    /// Directories that yielded no entry
    pub skipped: Vec<(String, SkipReason)>,
    /// Entries whose description came from the previous manifest
    pub preserved: usize,
}

impl Reconciliation {
    pub fn summary(&self) -> DomainSummary {
        self.manifest.domain_summary()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// Entry replaced in place
    Updated,
    /// Entry appended, list resorted
    Added,
    /// No manifest existed; a full reconciliation ran instead
    Bootstrapped,
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub document: ManifestDocument,
    pub action: UpdateAction,
}

/// What a previous manifest knew about one exam.
#[derive(Debug, Default)]
struct PriorEntry {
    description: Option<String>,
    detection: Option<(String, DomainDetection)>,
}

impl PriorEntry {
    /// Read whatever a raw entry still carries; malformed fields count as absent.
    fn from_value(exam: &Value) -> Self {
        let description = exam
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let detection = exam
            .get("domain")
            .and_then(Value::as_str)
            .zip(exam.get("domainDetection"))
            .and_then(|(domain, det)| {
                serde_json::from_value::<DomainDetection>(det.clone())
                    .ok()
                    .map(|det| (domain.to_string(), det))
            });
        Self {
            description,
            detection,
        }
    }

    fn apply_to(&self, entry: &mut ManifestEntry) {
        entry.inherit(
            self.description.as_deref(),
            self.detection.as_ref().map(|(d, det)| (d.as_str(), det)),
        );
    }
}

pub struct ManifestReconciler<'a> {
    storage: &'a LocalStorage,
    domains: DomainTable,
}

impl<'a> ManifestReconciler<'a> {
    pub fn new(storage: &'a LocalStorage, domains: DomainTable) -> Self {
        Self { storage, domains }
    }

    /// Reconciler with the built-in domain table.
    pub fn with_builtin_domains(storage: &'a LocalStorage) -> Result<Self> {
        Ok(Self::new(storage, DomainTable::builtin()?))
    }

    /// Derive a fresh entry for one exam directory.
    ///
    /// The entry carries the default description and a new detection
    /// timestamp; callers merge in what a previous manifest knew.
    pub async fn scan_exam(&self, code: &str) -> ScanOutcome {
        if !self.storage.has_exam_file(code).await {
            return ScanOutcome::Skipped(SkipReason::MissingExamFile);
        }

        let summary = match self.storage.load_exam_summary(code).await {
            Ok(Some(summary)) => summary,
            Ok(None) => return ScanOutcome::Skipped(SkipReason::MissingExamFile),
            Err(e) => return ScanOutcome::Skipped(SkipReason::Unreadable(e.to_string())),
        };

        let question_count = summary.question_count();
        if question_count == 0 {
            return ScanOutcome::Skipped(SkipReason::NoQuestions);
        }

        let last_updated = match self.storage.exam_modified(code).await {
            Ok(Some(ts)) => ts,
            Ok(None) => return ScanOutcome::Skipped(SkipReason::MissingExamFile),
            Err(e) => return ScanOutcome::Skipped(SkipReason::Unreadable(e.to_string())),
        };

        let source = match self.storage.load_links_summary(code).await {
            Ok(Some(links)) => Some(SourceInfo {
                total_links: links.total_links(),
                scraped_links: links.scraped_links(),
                last_scan: links.last_scan(),
            }),
            Ok(None) => None,
            Err(e) => {
                log::debug!("{code}: links.json ignored: {e}");
                None
            }
        };

        let name = summary.display_name(code);
        let detection = self.domains.classify(code);

        ScanOutcome::Found(ManifestEntry {
            code: code.to_string(),
            description: ManifestEntry::default_description(&name),
            name,
            question_count,
            last_updated,
            domain: detection.domain,
            domain_detection: DomainDetection {
                confidence: detection.confidence,
                auto_detected: true,
                detected_at: time::now(),
            },
            source,
        })
    }

    /// Rebuild the manifest from every exam directory.
    pub async fn generate(&self) -> Result<Reconciliation> {
        let prior = self.prior_entries().await;
        let codes = self.storage.exam_codes().await?;

        let mut exams = Vec::with_capacity(codes.len());
        let mut skipped = Vec::new();
        let mut preserved = 0;

        for code in codes {
            match self.scan_exam(&code).await {
                ScanOutcome::Found(mut entry) => {
                    if let Some(prev) = prior.get(&code) {
                        if prev.description.is_some() {
                            preserved += 1;
                        }
                        prev.apply_to(&mut entry);
                    }
                    log::debug!("{code}: {} questions", entry.question_count);
                    exams.push(entry);
                }
                ScanOutcome::Skipped(reason) => {
                    log::warn!("Skipping {code}: {reason}");
                    skipped.push((code, reason));
                }
            }
        }

        let mut manifest = Manifest::new(exams);
        manifest.sort_exams();

        Ok(Reconciliation {
            manifest,
            skipped,
            preserved,
        })
    }

    /// Refresh one exam's entry, leaving every other entry untouched.
    ///
    /// The stored manifest is edited as a raw document, so entries other
    /// than `code` are written back exactly as they were read.
    pub async fn update_single(&self, code: &str) -> Result<UpdateOutcome> {
        if !self.storage.manifest_exists().await {
            log::warn!("No manifest found, running a full scan");
            let reconciliation = self.generate().await?;
            return Ok(UpdateOutcome {
                document: ManifestDocument::from_manifest(&reconciliation.manifest)?,
                action: UpdateAction::Bootstrapped,
            });
        }

        let mut document = self
            .storage
            .load_manifest_value()
            .await
            .and_then(|value| value.ok_or_else(|| AppError::manifest("manifest disappeared")))
            .and_then(ManifestDocument::from_value)
            .map_err(|e| AppError::manifest(format!("cannot read manifest: {e}")))?;

        if !self.storage.exam_dir_exists(code).await {
            return Err(AppError::manifest(format!("exam directory not found: {code}")));
        }

        let mut entry = match self.scan_exam(code).await {
            ScanOutcome::Found(entry) => entry,
            ScanOutcome::Skipped(reason) => {
                return Err(AppError::manifest(format!("cannot scan {code}: {reason}")));
            }
        };

        let action = match document.position(code) {
            Some(idx) => {
                if let Some(prev) = document.entry(code) {
                    PriorEntry::from_value(prev).apply_to(&mut entry);
                }
                document.replace(idx, &entry)?;
                UpdateAction::Updated
            }
            None => {
                document.insert_sorted(&entry)?;
                UpdateAction::Added
            }
        };
        document.refresh_totals();

        Ok(UpdateOutcome { document, action })
    }

    /// Descriptions and detections from the current manifest, if readable.
    ///
    /// Works on raw JSON so a manifest with broken entries still contributes
    /// whatever it can.
    async fn prior_entries(&self) -> HashMap<String, PriorEntry> {
        let value = match self.storage.load_manifest_value().await {
            Ok(Some(value)) => value,
            Ok(None) => return HashMap::new(),
            Err(e) => {
                log::warn!("Existing manifest unreadable, descriptions start fresh: {e}");
                return HashMap::new();
            }
        };

        let Some(exams) = value.get("exams").and_then(Value::as_array) else {
            log::warn!("Existing manifest has no exam list");
            return HashMap::new();
        };

        exams
            .iter()
            .filter_map(|exam| {
                let code = exam.get("code").and_then(Value::as_str)?;
                Some((code.to_string(), PriorEntry::from_value(exam)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::models::{Confidence, ExamFile, LinkEntry, LinksRecord, Question};

    async fn write_exam(storage: &LocalStorage, code: &str, questions: usize) {
        let mut exam = ExamFile {
            exam_name: Some(code.to_string()),
            ..ExamFile::default()
        };
        for n in 1..=questions as u64 {
            exam.questions.push(Question {
                question_number: n,
                link: format!("https://x/{code}-question-{n}/"),
                body: format!("question {n}"),
                ..Question::default()
            });
        }
        storage.save_exam(code, &exam).await.unwrap();
    }

    fn reconciler(storage: &LocalStorage) -> ManifestReconciler<'_> {
        ManifestReconciler::with_builtin_domains(storage).unwrap()
    }

    fn without_generated(manifest: &Manifest) -> Value {
        let mut value = serde_json::to_value(manifest).unwrap();
        value.as_object_mut().unwrap().remove("generated");
        value
    }

    #[tokio::test]
    async fn test_generate_sorted_with_totals() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CSA", 4).await;
        write_exam(&storage, "CAD", 3).await;
        write_exam(&storage, "CIS-HR", 2).await;

        let result = reconciler(&storage).generate().await.unwrap();
        let manifest = &result.manifest;

        assert_eq!(manifest.codes(), vec!["CAD", "CIS-HR", "CSA"]);
        assert_eq!(manifest.total_exams, 3);
        assert_eq!(manifest.total_questions, 9);
        assert_eq!(manifest.version, "3.0");
        assert_eq!(manifest.exams[0].description, "CAD certification exam questions");
        assert_eq!(manifest.exams[1].domain, "HR");

        let summary = result.summary();
        assert_eq!(summary.by_domain["Infrastructure"], 1);
        assert_eq!(summary.by_confidence[&Confidence::High], 3);
    }

    #[tokio::test]
    async fn test_empty_and_missing_exams_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CAD", 0).await;
        write_exam(&storage, "CSA", 1).await;
        std::fs::create_dir(tmp.path().join("CIS-SIR")).unwrap();
        std::fs::create_dir(tmp.path().join("CIS-HAM")).unwrap();
        std::fs::write(tmp.path().join("CIS-HAM/exam.json"), "{ broken").unwrap();

        let result = reconciler(&storage).generate().await.unwrap();
        assert_eq!(result.manifest.codes(), vec!["CSA"]);

        let reasons: HashMap<_, _> = result.skipped.into_iter().collect();
        assert_eq!(reasons["CAD"], SkipReason::NoQuestions);
        assert_eq!(reasons["CIS-SIR"], SkipReason::MissingExamFile);
        assert!(matches!(reasons["CIS-HAM"], SkipReason::Unreadable(_)));
    }

    #[tokio::test]
    async fn test_generate_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CAD", 3).await;
        write_exam(&storage, "CIS-NEW-SECURITY", 1).await;

        let rec = reconciler(&storage);
        let first = rec.generate().await.unwrap().manifest;
        storage.save_manifest(&first).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let second = rec.generate().await.unwrap().manifest;

        assert_eq!(without_generated(&first), without_generated(&second));
    }

    #[tokio::test]
    async fn test_descriptions_survive_generate() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CAD", 3).await;
        write_exam(&storage, "CSA", 1).await;

        let rec = reconciler(&storage);
        let mut manifest = rec.generate().await.unwrap().manifest;
        manifest.exams[0].description = "Hand-written CAD notes".to_string();
        manifest.exams[1].description.clear();
        storage.save_manifest(&manifest).await.unwrap();

        let result = rec.generate().await.unwrap();
        assert_eq!(result.preserved, 1);
        assert_eq!(result.manifest.exams[0].description, "Hand-written CAD notes");
        assert_eq!(result.manifest.exams[1].description, "CSA certification exam questions");
    }

    #[tokio::test]
    async fn test_corrupt_manifest_does_not_block_generate() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CAD", 2).await;
        std::fs::write(storage.manifest_path(), "not json").unwrap();

        let rec = reconciler(&storage);
        let result = rec.generate().await.unwrap();
        assert_eq!(result.manifest.total_questions, 2);

        assert!(matches!(rec.update_single("CAD").await, Err(AppError::Manifest(_))));
    }

    #[tokio::test]
    async fn test_partial_manifest_still_yields_descriptions() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CAD", 2).await;
        std::fs::write(
            storage.manifest_path(),
            r#"{"exams": [{"code": "CAD", "description": "Kept"}]}"#,
        )
        .unwrap();

        let result = reconciler(&storage).generate().await.unwrap();
        assert_eq!(result.manifest.exams[0].description, "Kept");
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("absent"));
        assert!(reconciler(&storage).generate().await.is_err());
    }

    #[tokio::test]
    async fn test_source_from_links_file() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CAD", 1).await;

        let mut record = LinksRecord::complete(
            "CAD",
            &["https://x/q-1".to_string(), "https://x/q-2".to_string()],
            7,
            "test",
        );
        record.links[1] = LinkEntry::Tracked {
            url: "https://x/q-2".to_string(),
            scraped: true,
        };
        storage.save_links(&record).await.unwrap();

        let ScanOutcome::Found(entry) = reconciler(&storage).scan_exam("CAD").await else {
            panic!("CAD should scan");
        };
        let source = entry.source.unwrap();
        assert_eq!(source.total_links, 2);
        assert_eq!(source.scraped_links, 1);
        assert_eq!(source.last_scan, time::format(&record.collected_at));
    }

    #[tokio::test]
    async fn test_update_single_bootstraps() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CAD", 2).await;
        write_exam(&storage, "CSA", 1).await;

        let outcome = reconciler(&storage).update_single("CAD").await.unwrap();
        assert_eq!(outcome.action, UpdateAction::Bootstrapped);
        assert_eq!(outcome.document.total_exams(), 2);
    }

    #[tokio::test]
    async fn test_update_single_in_place_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CAD", 2).await;
        write_exam(&storage, "CSA", 1).await;

        let rec = reconciler(&storage);
        let mut manifest = rec.generate().await.unwrap().manifest;
        manifest.exams.reverse();
        manifest.exams[1].description = "Custom".to_string();
        storage.save_manifest(&manifest).await.unwrap();

        write_exam(&storage, "CAD", 5).await;
        let outcome = rec.update_single("CAD").await.unwrap();

        assert_eq!(outcome.action, UpdateAction::Updated);
        assert_eq!(outcome.document.codes(), vec!["CSA", "CAD"]);
        assert_eq!(outcome.document.total_questions(), 6);

        let updated = outcome.document.to_manifest().unwrap();
        assert_eq!(updated.total_exams, 2);
        assert_eq!(updated.exams[1].question_count, 5);
        assert_eq!(updated.exams[1].description, "Custom");
        assert_eq!(updated.exams[0], manifest.exams[0]);
    }

    #[tokio::test]
    async fn test_update_single_insert_resorts() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CSA", 1).await;

        let rec = reconciler(&storage);
        let manifest = rec.generate().await.unwrap().manifest;
        storage.save_manifest(&manifest).await.unwrap();

        write_exam(&storage, "CAD", 2).await;
        let outcome = rec.update_single("CAD").await.unwrap();

        assert_eq!(outcome.action, UpdateAction::Added);
        assert_eq!(outcome.document.codes(), vec!["CAD", "CSA"]);
        assert_eq!(outcome.document.total_exams(), 2);
        assert_eq!(outcome.document.total_questions(), 3);
    }

    #[tokio::test]
    async fn test_update_single_errors() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CSA", 1).await;
        write_exam(&storage, "CAD", 0).await;

        let rec = reconciler(&storage);
        let manifest = rec.generate().await.unwrap().manifest;
        storage.save_manifest(&manifest).await.unwrap();

        assert!(rec.update_single("NOPE").await.is_err());
        assert!(rec.update_single("CAD").await.is_err());
    }

    #[tokio::test]
    async fn test_update_single_leaves_other_entries_verbatim() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CAD", 2).await;

        let foreign = r#"{"code":"CSA","name":"CSA","description":"y","questionCount":4,"lastUpdated":"2025-04-30T22:00:00.987654","tags":["ops"]}"#;
        std::fs::write(
            storage.manifest_path(),
            format!(
                r#"{{"version":"3.0","generated":"2025-05-01T10:00:00","totalExams":2,"totalQuestions":5,"exams":[{{"code":"CAD","name":"CAD","description":"Mine","questionCount":1,"lastUpdated":"2025-04-30T21:00:00"}},{foreign}]}}"#
            ),
        )
        .unwrap();

        let outcome = reconciler(&storage).update_single("CAD").await.unwrap();
        assert_eq!(outcome.action, UpdateAction::Updated);
        storage.save_manifest_document(&outcome.document).await.unwrap();

        let saved: Value =
            serde_json::from_str(&std::fs::read_to_string(storage.manifest_path()).unwrap()).unwrap();
        let expected: Value = serde_json::from_str(foreign).unwrap();
        assert_eq!(
            serde_json::to_string(&saved["exams"][1]).unwrap(),
            serde_json::to_string(&expected).unwrap()
        );
        assert_eq!(saved["exams"][0]["description"], "Mine");
        assert_eq!(saved["exams"][0]["questionCount"], 2);
        assert_eq!(saved["totalQuestions"], 6);
        assert_eq!(saved["totalExams"], 2);
    }
}
