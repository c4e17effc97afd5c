// src/services/questions.rs

//! Question content processing.
//!
//! Turns an exam's collected links into stored questions in `exam.json`.

use async_trait::async_trait;
use scraper::{ElementRef, Html};

use crate::error::{AppError, Result};
use crate::models::{ExamFile, Question, QuestionConfig, UpdateStats, parse_selector};
use crate::storage::LocalStorage;
use crate::utils::http::{PageFetcher, Politeness};
use crate::utils::progress::ProgressReporter;
use crate::utils::{question_number, time};

/// Result of processing one exam.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    /// Questions stored for the exam after processing
    pub questions: usize,
    /// First error met; processing went on past it
    pub error: Option<String>,
    pub update_stats: UpdateStats,
}

/// Fetches and persists the content behind an exam's links.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(
        &self,
        code: &str,
        links: &[String],
        progress: &dyn ProgressReporter,
        force_update: bool,
    ) -> Result<ProcessOutcome>;
}

/// Extract one question from a discussion page.
pub fn parse_question(html: &str, selectors: &QuestionConfig, link: &str) -> Result<Question> {
    let document = Html::parse_document(html);
    let body_sel = parse_selector(&selectors.body_selector)?;
    let choice_sel = parse_selector(&selectors.choice_selector)?;
    let answer_sel = parse_selector(&selectors.answer_selector)?;

    let body = document
        .select(&body_sel)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if body.is_empty() {
        return Err(AppError::crawl(link, "question body not found"));
    }

    let choices = document
        .select(&choice_sel)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();

    let answer = document
        .select(&answer_sel)
        .map(element_text)
        .find(|t| !t.is_empty());

    Ok(Question {
        question_number: question_number(link),
        link: link.to_string(),
        body,
        choices,
        answer,
        scraped_at: Some(time::now()),
        ..Question::default()
    })
}

/// Element text with whitespace runs collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// [`ItemProcessor`] scraping question pages with CSS selectors.
pub struct QuestionScraper<'a> {
    fetcher: &'a dyn PageFetcher,
    storage: &'a LocalStorage,
    selectors: QuestionConfig,
    delay: Politeness,
}

impl<'a> QuestionScraper<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        storage: &'a LocalStorage,
        selectors: QuestionConfig,
        delay: Politeness,
    ) -> Self {
        Self {
            fetcher,
            storage,
            selectors,
            delay,
        }
    }

    async fn fetch_question(&self, link: &str) -> Result<Question> {
        let html = self.fetcher.fetch_text(link).await?;
        parse_question(&html, &self.selectors, link)
    }
}

#[async_trait]
impl<'a> ItemProcessor for QuestionScraper<'a> {
    async fn process(
        &self,
        code: &str,
        links: &[String],
        progress: &dyn ProgressReporter,
        force_update: bool,
    ) -> Result<ProcessOutcome> {
        let mut exam = self.storage.load_exam(code).await?.unwrap_or_default();
        if exam.exam_name.is_none() {
            exam.exam_name = Some(code.to_string());
        }

        let mut outcome = ProcessOutcome::default();
        let total = links.len();
        let mut fetched_any = false;

        for (i, link) in links.iter().enumerate() {
            progress.report(i as f64 / total as f64, &format!("question {}/{}", i + 1, total));

            let existing = exam.position(link);
            if existing.is_some() && !force_update {
                outcome.update_stats.skipped_count += 1;
                continue;
            }

            if fetched_any {
                self.delay.pause().await;
            }
            fetched_any = true;

            match self.fetch_question(link).await {
                Ok(question) => merge(&mut exam, existing, question, &mut outcome.update_stats),
                Err(e) => {
                    log::warn!("{code}: {link}: {e}");
                    if outcome.error.is_none() {
                        outcome.error = Some(e.to_string());
                    }
                }
            }
        }
        progress.report(1.0, "done");

        exam.sort_questions();
        outcome.questions = exam.questions.len();
        if !exam.questions.is_empty() {
            self.storage.save_exam(code, &exam).await?;
        }

        log::debug!(
            "{code}: {} new, {} updated, {} skipped",
            outcome.update_stats.new_count,
            outcome.update_stats.updated_count,
            outcome.update_stats.skipped_count
        );
        Ok(outcome)
    }
}

fn merge(exam: &mut ExamFile, existing: Option<usize>, mut question: Question, stats: &mut UpdateStats) {
    match existing {
        None => {
            exam.questions.push(question);
            stats.new_count += 1;
        }
        Some(idx) => {
            let current = &mut exam.questions[idx];
            if current.content_differs(&question) {
                question.extra = std::mem::take(&mut current.extra);
                *current = question;
                stats.updated_count += 1;
            } else {
                stats.skipped_count += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::services::collector::tests::FakeSite;
    use crate::utils::progress::NullProgress;

    fn question_page(body: &str, choices: &[&str], answer: &str) -> String {
        let items: String = choices
            .iter()
            .map(|c| format!(r#"<li class="multi-choice-item">{c}</li>"#))
            .collect();
        format!(
            r#"<html><body>
            <div class="question-body">
                <p class="card-text">{body}</p>
                <ul>{items}</ul>
                <span class="correct-answer">{answer}</span>
            </div></body></html>"#
        )
    }

    const Q1: &str = "https://site/view/1-exam-cad-question-1/";
    const Q2: &str = "https://site/view/2-exam-cad-question-2/";

    fn links() -> Vec<String> {
        // Deliberately out of order.
        vec![Q2.to_string(), Q1.to_string()]
    }

    async fn run(site: &FakeSite, storage: &LocalStorage, force: bool) -> ProcessOutcome {
        let scraper = QuestionScraper::new(site, storage, QuestionConfig::default(), Politeness::none());
        scraper.process("CAD", &links(), &NullProgress, force).await.unwrap()
    }

    #[test]
    fn test_parse_question() {
        let html = question_page("Which   table\n stores incidents?", &["A. incident", "B. task"], "A");
        let q = parse_question(&html, &QuestionConfig::default(), Q2).unwrap();
        assert_eq!(q.question_number, 2);
        assert_eq!(q.body, "Which table stores incidents?");
        assert_eq!(q.choices, vec!["A. incident", "B. task"]);
        assert_eq!(q.answer.as_deref(), Some("A"));
        assert!(q.scraped_at.is_some());
    }

    #[test]
    fn test_parse_question_without_body() {
        let err = parse_question("<html></html>", &QuestionConfig::default(), Q1).unwrap_err();
        assert!(matches!(err, AppError::Crawl { .. }));
    }

    #[tokio::test]
    async fn test_new_then_skipped() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let site = FakeSite::default()
            .with(Q1, question_page("first", &["A", "B"], "A"))
            .with(Q2, question_page("second", &["A", "B"], "B"));

        let outcome = run(&site, &storage, false).await;
        assert_eq!(outcome.questions, 2);
        assert_eq!(outcome.update_stats.new_count, 2);
        assert!(outcome.error.is_none());

        let exam = storage.load_exam("CAD").await.unwrap().unwrap();
        assert_eq!(exam.questions[0].link, Q1);
        assert_eq!(exam.questions[1].link, Q2);

        let again = run(&site, &storage, false).await;
        assert_eq!(again.update_stats.skipped_count, 2);
        assert_eq!(site.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_force_update_detects_changes() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let site = FakeSite::default()
            .with(Q1, question_page("first", &["A"], "A"))
            .with(Q2, question_page("second", &["A"], "A"));
        run(&site, &storage, false).await;

        let changed = FakeSite::default()
            .with(Q1, question_page("first", &["A"], "A"))
            .with(Q2, question_page("second, revised", &["A"], "A"));
        let outcome = run(&changed, &storage, true).await;

        assert_eq!(outcome.update_stats.updated_count, 1);
        assert_eq!(outcome.update_stats.skipped_count, 1);
        assert_eq!(outcome.update_stats.new_count, 0);

        let exam = storage.load_exam("CAD").await.unwrap().unwrap();
        assert_eq!(exam.questions[1].body, "second, revised");
    }

    #[tokio::test]
    async fn test_failure_recorded_and_processing_continues() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let site = FakeSite::default().with(Q1, question_page("first", &[], "A"));

        let outcome = run(&site, &storage, false).await;
        assert_eq!(outcome.questions, 1);
        assert_eq!(outcome.update_stats.new_count, 1);
        assert!(outcome.error.unwrap().contains(Q2));
    }

    #[tokio::test]
    async fn test_nothing_written_without_questions() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        let outcome = run(&FakeSite::default(), &storage, false).await;
        assert_eq!(outcome.questions, 0);
        assert!(outcome.error.is_some());
        assert!(!storage.has_exam_file("CAD").await);
    }
}
