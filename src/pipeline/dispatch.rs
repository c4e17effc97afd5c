// src/pipeline/dispatch.rs

//! Links dispatch: one links record per exam that received links.

use crate::models::LinksRecord;
use crate::services::CollectionReport;
use crate::storage::LocalStorage;
use crate::utils::log::{header, sub_item, summary};

/// What dispatch did per exam.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Exams without question content before this run
    pub created: Vec<String>,
    /// Exams that already had an `exam.json`
    pub updated: Vec<String>,
    /// Targets the listing had no link for; left untouched on disk
    pub missing: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn written(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// Write a links record for every target with links, overwriting the old one.
pub async fn dispatch_links(
    storage: &LocalStorage,
    collection: &CollectionReport,
    targets: &[String],
    method: &str,
) -> DispatchReport {
    header("Dispatching links");
    let mut report = DispatchReport::default();

    for code in targets {
        let Some(links) = collection.links.get(code) else {
            report.missing.push(code.clone());
            continue;
        };

        let existed = storage.has_exam_file(code).await;
        let record = LinksRecord::complete(code, links, collection.total_pages, method);

        match storage.save_links(&record).await {
            Ok(()) => {
                sub_item(&format!("{code}: {} links", links.len()));
                if existed {
                    report.updated.push(code.clone());
                } else {
                    report.created.push(code.clone());
                }
            }
            Err(e) => {
                log::error!("{code}: failed to save links: {e}");
                report.failed.push((code.clone(), e.to_string()));
            }
        }
    }

    if !report.missing.is_empty() {
        log::warn!("No links found for: {}", report.missing.join(", "));
    }
    summary(
        "Link dispatch",
        &[
            ("Created", report.created.len().to_string()),
            ("Updated", report.updated.len().to_string()),
            ("Missing", report.missing.len().to_string()),
            ("Failed", report.failed.len().to_string()),
        ],
    );
    report
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;
    use crate::models::{ExamFile, STATUS_COMPLETE};

    fn collection(entries: &[(&str, Vec<&str>)]) -> CollectionReport {
        let links: BTreeMap<String, Vec<String>> = entries
            .iter()
            .map(|(code, links)| {
                (code.to_string(), links.iter().map(|l| l.to_string()).collect())
            })
            .collect();
        CollectionReport {
            links,
            total_pages: 9,
            pages_scanned: 9,
            failed_pages: Vec::new(),
        }
    }

    fn targets(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_only_targets_with_links_are_written() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let result = collection(&[("A1", vec!["https://x/question-1/", "https://x/question-2/"])]);

        let report = dispatch_links(&storage, &result, &targets(&["A1", "A2"]), "batch").await;

        assert_eq!(report.created, vec!["A1"]);
        assert_eq!(report.missing, vec!["A2"]);
        assert!(tmp.path().join("A1/links.json").is_file());
        assert!(!storage.exam_dir_exists("A2").await);

        let record = storage.load_links("A1").await.unwrap().unwrap();
        assert_eq!(record.status, STATUS_COMPLETE);
        assert_eq!(record.page_num, 9);
        assert_eq!(record.links_count, 2);
        assert_eq!(record.method, "batch");
    }

    #[tokio::test]
    async fn test_existing_content_counts_as_update() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let mut exam = ExamFile::default();
        exam.questions.push(Default::default());
        storage.save_exam("CAD", &exam).await.unwrap();

        let old = collection(&[("CAD", vec!["https://x/question-1/", "https://x/question-2/"])]);
        dispatch_links(&storage, &old, &targets(&["CAD"]), "batch").await;

        let new = collection(&[("CAD", vec!["https://x/question-3/"])]);
        let report = dispatch_links(&storage, &new, &targets(&["CAD"]), "batch").await;

        assert_eq!(report.updated, vec!["CAD"]);
        let record = storage.load_links("CAD").await.unwrap().unwrap();
        assert_eq!(record.urls(), vec!["https://x/question-3/"]);
    }

    #[tokio::test]
    async fn test_save_error_is_per_exam() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let result = collection(&[("../bad", vec!["https://x/1"]), ("CSA", vec!["https://x/2"])]);

        let report = dispatch_links(&storage, &result, &targets(&["../bad", "CSA"]), "batch").await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.created, vec!["CSA"]);
        assert_eq!(report.written(), 1);
    }
}
