// src/pipeline/process.rs

//! Question processing phase.

use std::time::Duration;

use crate::models::UpdateStats;
use crate::services::ItemProcessor;
use crate::storage::LocalStorage;
use crate::utils::log::{header, step, sub_item, summary};
use crate::utils::progress::LogProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamStatus {
    Success,
    /// Processed, but at least one question failed
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamResult {
    pub code: String,
    pub status: ExamStatus,
    pub question_count: usize,
    pub error: Option<String>,
    pub update_stats: UpdateStats,
}

impl ExamResult {
    fn failed(code: &str, error: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            status: ExamStatus::Failed,
            question_count: 0,
            error: Some(error.into()),
            update_stats: UpdateStats::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    pub results: Vec<ExamResult>,
}

impl ProcessReport {
    pub fn successful(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status != ExamStatus::Failed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.successful()
    }

    pub fn total_questions(&self) -> usize {
        self.results.iter().map(|r| r.question_count).sum()
    }

    pub fn totals(&self) -> UpdateStats {
        let mut totals = UpdateStats::default();
        for result in &self.results {
            totals.add(&result.update_stats);
        }
        totals
    }
}

/// Process every exam from its stored links record.
///
/// Exams without links, or whose processing fails, are reported and the
/// loop moves on. A fixed pause separates two processed exams.
pub async fn run_process(
    storage: &LocalStorage,
    processor: &dyn ItemProcessor,
    codes: &[String],
    force_update: bool,
    exam_pause: Duration,
) -> ProcessReport {
    header(&format!("Processing questions for {} exams", codes.len()));
    let mut report = ProcessReport::default();

    for (i, code) in codes.iter().enumerate() {
        step(i + 1, codes.len(), code);

        let links = match storage.load_links(code).await {
            Ok(Some(record)) if !record.links.is_empty() => record.urls(),
            Ok(_) => {
                log::error!("{code}: missing links");
                report.results.push(ExamResult::failed(code, "missing links"));
                continue;
            }
            Err(e) => {
                log::error!("{code}: unreadable links: {e}");
                report.results.push(ExamResult::failed(code, e.to_string()));
                continue;
            }
        };
        sub_item(&format!("{} questions to process", links.len()));

        let progress = LogProgress::new(code.as_str());
        let result = match processor.process(code, &links, &progress, force_update).await {
            Ok(outcome) => {
                let stats = outcome.update_stats;
                if let Some(error) = &outcome.error {
                    log::warn!("{code}: {error}");
                    log::warn!("{code}: {} questions retrieved despite errors", outcome.questions);
                }
                if !stats.is_empty() {
                    sub_item(&format!(
                        "new {}, updated {}, unchanged {}",
                        stats.new_count, stats.updated_count, stats.skipped_count
                    ));
                }
                ExamResult {
                    code: code.clone(),
                    status: if outcome.error.is_none() {
                        ExamStatus::Success
                    } else {
                        ExamStatus::Partial
                    },
                    question_count: outcome.questions,
                    error: outcome.error,
                    update_stats: stats,
                }
            }
            Err(e) => {
                log::error!("{code}: {e}");
                ExamResult::failed(code, e.to_string())
            }
        };
        report.results.push(result);

        if i + 1 < codes.len() && !exam_pause.is_zero() {
            log::info!("Pausing {}s before next exam", exam_pause.as_secs());
            tokio::time::sleep(exam_pause).await;
        }
    }

    let totals = report.totals();
    summary(
        "Question processing",
        &[
            ("Successful exams", report.successful().to_string()),
            ("Failed exams", report.failed().to_string()),
            ("Questions", report.total_questions().to_string()),
            ("New", totals.new_count.to_string()),
            ("Updated", totals.updated_count.to_string()),
            ("Unchanged", totals.skipped_count.to_string()),
        ],
    );
    report
}
