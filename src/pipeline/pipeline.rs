// src/pipeline/pipeline.rs

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::QuestionScraper;
use crate::storage::LocalStorage;
use crate::utils::http::{PageFetcher, Politeness};
use crate::utils::log::{header, step, summary};
use crate::utils::time::format_duration;

use super::collect::run_collect;
use super::dispatch::{DispatchReport, dispatch_links};
use super::manifest::{ManifestUpdateReport, run_update};
use super::process::{ProcessReport, run_process};

/// Which phases a pipeline run executes.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Collect and dispatch links, then stop
    pub links_only: bool,
    /// Reuse the stored links records
    pub questions_only: bool,
    /// Re-fetch questions that are already stored
    pub force_update: bool,
    /// Restrict the run to one exam
    pub exam: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub targets: Vec<String>,
    pub dispatch: Option<DispatchReport>,
    pub process: Option<ProcessReport>,
    pub manifest: Option<ManifestUpdateReport>,
    /// Wall time of each executed phase, in run order
    pub timings: Vec<(&'static str, Duration)>,
}

/// Exam codes listed in the manifest, optionally narrowed to one.
pub async fn load_targets(storage: &LocalStorage, exam: Option<&str>) -> Result<Vec<String>> {
    let manifest = storage.load_manifest_value().await?.ok_or_else(|| {
        AppError::config(format!(
            "no targets: manifest not found at {}",
            storage.manifest_path().display()
        ))
    })?;

    let mut codes: Vec<String> = manifest
        .get("exams")
        .and_then(Value::as_array)
        .map(|exams| {
            exams
                .iter()
                .filter_map(|e| e.get("code").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if codes.is_empty() {
        return Err(AppError::config("no targets: manifest lists no exams"));
    }

    if let Some(exam) = exam {
        if !codes.iter().any(|c| c == exam) {
            codes.sort();
            return Err(AppError::config(format!(
                "exam {exam} not in manifest; available: {}",
                codes.join(", ")
            )));
        }
        codes = vec![exam.to_string()];
    }
    Ok(codes)
}

/// Collect links for `targets` and write one links record per exam.
///
/// Aborts before writing anything when the listing yielded no link at all.
pub async fn run_links(
    config: &Config,
    storage: &LocalStorage,
    fetcher: &dyn PageFetcher,
    targets: &[String],
) -> Result<DispatchReport> {
    let collection = run_collect(config, fetcher, targets).await?;
    if collection.links.is_empty() {
        return Err(AppError::listing("no links collected for any target exam"));
    }
    Ok(dispatch_links(storage, &collection, targets, &config.listing.collection_method).await)
}

/// Scrape questions from the stored links, then refresh the manifest.
pub async fn run_questions(
    config: &Config,
    storage: &LocalStorage,
    fetcher: &dyn PageFetcher,
    targets: &[String],
    force_update: bool,
) -> Result<(ProcessReport, ManifestUpdateReport)> {
    let scraper = QuestionScraper::new(
        fetcher,
        storage,
        config.questions.clone(),
        Politeness::from(config.crawler.question_delay()),
    );
    let process = run_process(
        storage,
        &scraper,
        targets,
        force_update,
        config.crawler.exam_pause(),
    )
    .await;
    let manifest = run_update(storage, targets).await?;
    Ok((process, manifest))
}

/// Run the configured phases in order: links, questions, manifest.
pub async fn run_pipeline(
    config: &Config,
    storage: &LocalStorage,
    fetcher: &dyn PageFetcher,
    options: &PipelineOptions,
) -> Result<PipelineReport> {
    let started = Instant::now();
    let targets = load_targets(storage, options.exam.as_deref()).await?;

    let mode = if options.questions_only {
        "questions only"
    } else if options.links_only {
        "links only"
    } else {
        "complete"
    };
    header(&format!("Pipeline ({mode}) for {} exams", targets.len()));

    let total_steps = if options.questions_only || options.links_only {
        1
    } else {
        2
    };
    let mut current_step = 1;
    let mut report = PipelineReport {
        targets: targets.clone(),
        ..PipelineReport::default()
    };

    if !options.questions_only {
        step(current_step, total_steps, "Links - Collecting and dispatching");
        let phase = Instant::now();
        report.dispatch = Some(run_links(config, storage, fetcher, &targets).await?);
        report.timings.push(("Links", phase.elapsed()));
        current_step += 1;
    }

    if !options.links_only || options.questions_only {
        step(current_step, total_steps, "Questions - Scraping and updating manifest");
        let phase = Instant::now();
        let (process, manifest) =
            run_questions(config, storage, fetcher, &targets, options.force_update).await?;
        report.process = Some(process);
        report.manifest = Some(manifest);
        report.timings.push(("Questions", phase.elapsed()));
    }

    let mut items = vec![("Exams", targets.len().to_string())];
    items.extend(
        report
            .timings
            .iter()
            .map(|(phase, elapsed)| (*phase, format_duration(*elapsed))),
    );
    items.push(("Elapsed", format_duration(started.elapsed())));
    summary("Pipeline", &items);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_targets_require_manifest() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        assert!(matches!(load_targets(&storage, None).await, Err(AppError::Config(_))));

        std::fs::write(storage.manifest_path(), r#"{"exams": []}"#).unwrap();
        assert!(matches!(load_targets(&storage, None).await, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_targets_filter() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        std::fs::write(
            storage.manifest_path(),
            r#"{"exams": [{"code": "CSA"}, {"code": "CAD"}, {"name": "no code"}]}"#,
        )
        .unwrap();

        assert_eq!(load_targets(&storage, None).await.unwrap(), vec!["CSA", "CAD"]);
        assert_eq!(load_targets(&storage, Some("CAD")).await.unwrap(), vec!["CAD"]);

        let err = load_targets(&storage, Some("CIS-HR")).await.unwrap_err();
        assert!(err.to_string().contains("available: CAD, CSA"));
    }
}
