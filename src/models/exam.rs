//! Question content persisted per exam (`<code>/exam.json`).

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::time;

/// Full question content for one exam.
///
/// Fields this crate does not know about are kept so files written by
/// other producers survive a rewrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExamFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_name: Option<String>,

    #[serde(default)]
    pub questions: Vec<Question>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExamFile {
    /// Index of the question scraped from `link`.
    pub fn position(&self, link: &str) -> Option<usize> {
        self.questions.iter().position(|q| q.link == link)
    }

    /// Keep questions in site order.
    pub fn sort_questions(&mut self) {
        self.questions
            .sort_by(|a, b| a.question_number.cmp(&b.question_number).then_with(|| a.link.cmp(&b.link)));
    }
}

/// The parts of an exam file the manifest needs; question bodies are skipped.
#[derive(Debug, Deserialize)]
pub struct ExamSummary {
    #[serde(default)]
    pub exam_name: Option<String>,

    #[serde(default)]
    pub questions: Vec<IgnoredAny>,
}

impl ExamSummary {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Display name, falling back to the exam code.
    pub fn display_name(&self, code: &str) -> String {
        match self.exam_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() && name != code => name.to_string(),
            _ => code.to_string(),
        }
    }
}

/// One scraped discussion question.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Question {
    #[serde(default)]
    pub question_number: u64,

    #[serde(default)]
    pub link: String,

    #[serde(default)]
    pub body: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde_ts_opt"
    )]
    pub scraped_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Question {
    /// Whether the scraped content differs, ignoring timestamps.
    pub fn content_differs(&self, other: &Question) -> bool {
        self.body != other.body || self.choices != other.choices || self.answer != other.answer
    }
}

/// Per-exam counters returned by the item processor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateStats {
    pub new_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
}

impl UpdateStats {
    pub fn is_empty(&self) -> bool {
        self.new_count == 0 && self.updated_count == 0 && self.skipped_count == 0
    }

    pub fn add(&mut self, other: &UpdateStats) {
        self.new_count += other.new_count;
        self.updated_count += other.updated_count;
        self.skipped_count += other.skipped_count;
    }
}
