// src/pipeline/manifest.rs

//! Manifest phases: full regeneration, per-exam updates, and a read-only
//! overview.

use crate::error::Result;
use crate::models::{Confidence, Manifest};
use crate::services::{ManifestReconciler, Reconciliation, UpdateAction};
use crate::storage::{LocalStorage, SaveOutcome};
use crate::utils::log::{header, percent, separator, sub_item, summary};

/// Rebuild the manifest from disk and save it.
pub async fn run_generate(storage: &LocalStorage) -> Result<(Reconciliation, SaveOutcome)> {
    header("Generating manifest");
    log::info!("Scanning {}", storage.root().display());

    let reconciler = ManifestReconciler::with_builtin_domains(storage)?;
    let reconciliation = reconciler.generate().await?;

    for exam in &reconciliation.manifest.exams {
        sub_item(&format!(
            "{}: {} questions ({}, {})",
            exam.code, exam.question_count, exam.domain, exam.domain_detection.confidence
        ));
    }
    log_domain_stats(&reconciliation.manifest);

    let saved = storage.save_manifest(&reconciliation.manifest).await?;

    summary(
        "Manifest",
        &[
            ("Exams", saved.total_exams.to_string()),
            ("Questions", saved.total_questions.to_string()),
            ("Descriptions preserved", reconciliation.preserved.to_string()),
            ("Skipped directories", reconciliation.skipped.len().to_string()),
        ],
    );
    Ok((reconciliation, saved))
}

/// Counts and shares per domain and per confidence tier.
pub fn log_domain_stats(manifest: &Manifest) {
    let stats = manifest.domain_summary();
    let total = manifest.exams.len();

    separator();
    log::info!("Domains:");
    for (domain, count) in &stats.by_domain {
        sub_item(&format!("{domain}: {count} ({})", percent(*count, total)));
    }
    log::info!("Detection confidence:");
    for (confidence, count) in &stats.by_confidence {
        sub_item(&format!("{confidence}: {count} ({})", percent(*count, total)));
    }

    let low: Vec<&str> = manifest
        .exams
        .iter()
        .filter(|e| e.domain_detection.confidence == Confidence::Low)
        .map(|e| e.code.as_str())
        .collect();
    if !low.is_empty() {
        log::warn!("Low-confidence domains, review: {}", low.join(", "));
    }
    separator();
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestUpdateReport {
    pub updated: Vec<String>,
    pub added: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl ManifestUpdateReport {
    pub fn succeeded(&self) -> usize {
        self.updated.len() + self.added.len()
    }
}

/// Update and save the manifest once per code; failures are per code.
pub async fn run_update(storage: &LocalStorage, codes: &[String]) -> Result<ManifestUpdateReport> {
    header(&format!("Updating manifest for {} exams", codes.len()));
    let reconciler = ManifestReconciler::with_builtin_domains(storage)?;
    let mut report = ManifestUpdateReport::default();

    for code in codes {
        let result = match reconciler.update_single(code).await {
            Ok(outcome) => storage
                .save_manifest_document(&outcome.document)
                .await
                .map(|_| outcome.action),
            Err(e) => Err(e),
        };

        match result {
            Ok(UpdateAction::Added) => {
                sub_item(&format!("Added {code}"));
                report.added.push(code.clone());
            }
            Ok(action) => {
                if action == UpdateAction::Bootstrapped {
                    log::info!("Manifest bootstrapped from a full scan");
                }
                sub_item(&format!("Updated {code}"));
                report.updated.push(code.clone());
            }
            Err(e) => {
                log::error!("Failed to update {code}: {e}");
                report.failed.push((code.clone(), e.to_string()));
            }
        }
    }

    let mut items = vec![
        ("Updated", report.succeeded().to_string()),
        ("Total exams", codes.len().to_string()),
    ];
    if !report.failed.is_empty() {
        items.push(("Failed", report.failed.len().to_string()));
    }
    summary("Manifest update", &items);
    Ok(report)
}

/// Log storage paths and current manifest totals.
pub async fn run_info(storage: &LocalStorage) -> Result<()> {
    log::info!("Data directory: {}", storage.root().display());
    log::info!("Manifest: {}", storage.manifest_path().display());

    match storage.load_manifest().await {
        Ok(Some(manifest)) => {
            log::info!("Version: {}", manifest.version);
            log::info!("Generated: {}", crate::utils::time::format(&manifest.generated));
            log::info!(
                "Exams: {}, questions: {}",
                manifest.total_exams,
                manifest.total_questions
            );
            log_domain_stats(&manifest);
        }
        Ok(None) => log::info!("No manifest yet."),
        Err(e) => log::warn!("Manifest unreadable: {e}"),
    }

    let backup = if storage.backup_path().exists() {
        "present"
    } else {
        "none"
    };
    log::info!("Backup: {backup}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::models::{ExamFile, Question};

    async fn write_exam(storage: &LocalStorage, code: &str, questions: usize) {
        let mut exam = ExamFile::default();
        for n in 1..=questions as u64 {
            exam.questions.push(Question {
                question_number: n,
                link: format!("https://x/question-{n}/"),
                body: "b".to_string(),
                ..Question::default()
            });
        }
        storage.save_exam(code, &exam).await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_saves_consistent_manifest() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CIS-ITSM", 2).await;
        write_exam(&storage, "CAD", 3).await;

        let (_, saved) = run_generate(&storage).await.unwrap();
        assert_eq!(saved.total_questions, 5);

        let manifest = storage.load_manifest().await.unwrap().unwrap();
        assert_eq!(manifest.total_exams, manifest.exams.len());
        assert_eq!(
            manifest.total_questions,
            manifest.exams.iter().map(|e| e.question_count).sum::<usize>()
        );
    }

    #[tokio::test]
    async fn test_update_counts_failures_per_code() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_exam(&storage, "CAD", 1).await;
        run_generate(&storage).await.unwrap();
        write_exam(&storage, "CSA", 2).await;

        let codes = vec!["CAD".to_string(), "CSA".to_string(), "GONE".to_string()];
        let report = run_update(&storage, &codes).await.unwrap();

        assert_eq!(report.updated, vec!["CAD"]);
        assert_eq!(report.added, vec!["CSA"]);
        assert_eq!(report.failed.len(), 1);
        assert!(storage.backup_path().exists());

        let manifest = storage.load_manifest().await.unwrap().unwrap();
        assert_eq!(manifest.codes(), vec!["CAD", "CSA"]);
        assert_eq!(manifest.total_questions, 3);
    }

    #[tokio::test]
    async fn test_info_without_manifest() {
        let tmp = TempDir::new().unwrap();
        assert!(run_info(&LocalStorage::new(tmp.path())).await.is_ok());
    }
}
