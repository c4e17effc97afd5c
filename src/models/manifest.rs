//! Manifest: the summary index read by the front-end (`manifest.json`).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::utils::time;

/// Format revision written to `version`.
pub const MANIFEST_VERSION: &str = "3.0";

const REQUIRED_FIELDS: &[&str] = &["version", "generated", "totalExams", "totalQuestions", "exams"];
const REQUIRED_EXAM_FIELDS: &[&str] = &["code", "name", "questionCount", "lastUpdated"];

/// Summary index over every scraped exam.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,

    /// Time of the last write
    #[serde(with = "time::serde_ts")]
    pub generated: DateTime<Utc>,

    pub total_exams: usize,

    pub total_questions: usize,

    #[serde(default)]
    pub exams: Vec<ManifestEntry>,
}

impl Manifest {
    /// Assemble a manifest; aggregates and `generated` are computed here.
    pub fn new(exams: Vec<ManifestEntry>) -> Self {
        let mut manifest = Self {
            version: MANIFEST_VERSION.to_string(),
            generated: time::now(),
            total_exams: 0,
            total_questions: 0,
            exams,
        };
        manifest.refresh_totals();
        manifest
    }

    /// Recompute `totalExams`, `totalQuestions` and `generated`.
    pub fn refresh_totals(&mut self) {
        self.total_exams = self.exams.len();
        self.total_questions = self.exams.iter().map(|e| e.question_count).sum();
        self.generated = time::now();
    }

    /// Exam codes in manifest order.
    pub fn codes(&self) -> Vec<String> {
        self.exams.iter().map(|e| e.code.clone()).collect()
    }

    pub fn position(&self, code: &str) -> Option<usize> {
        self.exams.iter().position(|e| e.code == code)
    }

    pub fn sort_exams(&mut self) {
        self.exams.sort_by(|a, b| a.code.cmp(&b.code));
    }

    /// Exam counts per domain and per confidence level.
    pub fn domain_summary(&self) -> DomainSummary {
        let mut summary = DomainSummary::default();
        for exam in &self.exams {
            *summary.by_domain.entry(exam.domain.clone()).or_default() += 1;
            *summary
                .by_confidence
                .entry(exam.domain_detection.confidence)
                .or_default() += 1;
        }
        summary
    }

    /// Check a serialized manifest for every required field.
    pub fn validate_value(value: &Value) -> Result<()> {
        let root = value
            .as_object()
            .ok_or_else(|| AppError::validation("manifest is not a JSON object"))?;
        validate_root(root)
    }
}

fn validate_root(root: &Map<String, Value>) -> Result<()> {
    for field in REQUIRED_FIELDS {
        if !root.contains_key(*field) {
            return Err(AppError::validation(format!("missing field '{field}'")));
        }
    }

    let exams = root["exams"]
        .as_array()
        .ok_or_else(|| AppError::validation("'exams' is not an array"))?;

    for exam in exams {
        for field in REQUIRED_EXAM_FIELDS {
            if exam.get(*field).is_none() {
                let code = exam.get("code").and_then(Value::as_str).unwrap_or("unknown");
                return Err(AppError::validation(format!(
                    "exam {code} missing field '{field}'"
                )));
            }
        }
    }
    Ok(())
}

/// A manifest as stored on disk, edited in place.
///
/// Only the entries a caller replaces or inserts are rewritten. Every other
/// entry keeps its fields and values exactly as they were read, including
/// fields this crate does not model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ManifestDocument {
    root: Map<String, Value>,
}

impl ManifestDocument {
    /// Wrap a parsed manifest. The document must be an object with an
    /// `exams` array.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(root) = value else {
            return Err(AppError::validation("manifest is not a JSON object"));
        };
        if !root.get("exams").is_some_and(Value::is_array) {
            return Err(AppError::validation("'exams' is not an array"));
        }
        Ok(Self { root })
    }

    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        Self::from_value(serde_json::to_value(manifest)?)
    }

    /// Typed view; fails if any entry lacks a modelled field.
    pub fn to_manifest(&self) -> Result<Manifest> {
        Ok(serde_json::from_value(Value::Object(self.root.clone()))?)
    }

    fn exams(&self) -> &[Value] {
        self.root
            .get("exams")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn exams_mut(&mut self) -> Result<&mut Vec<Value>> {
        self.root
            .get_mut("exams")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| AppError::validation("'exams' is not an array"))
    }

    /// Exam codes in stored order; entries without a code are left out.
    pub fn codes(&self) -> Vec<String> {
        self.exams()
            .iter()
            .filter_map(entry_code)
            .map(str::to_string)
            .collect()
    }

    pub fn position(&self, code: &str) -> Option<usize> {
        self.exams().iter().position(|e| entry_code(e) == Some(code))
    }

    /// Raw entry for `code`.
    pub fn entry(&self, code: &str) -> Option<&Value> {
        self.exams().iter().find(|e| entry_code(e) == Some(code))
    }

    /// Overwrite the entry at `idx`; other entries are not touched.
    pub fn replace(&mut self, idx: usize, entry: &ManifestEntry) -> Result<()> {
        let value = serde_json::to_value(entry)?;
        let exams = self.exams_mut()?;
        let slot = exams
            .get_mut(idx)
            .ok_or_else(|| AppError::manifest(format!("no manifest entry at index {idx}")))?;
        *slot = value;
        Ok(())
    }

    /// Append an entry, then order the list by code.
    pub fn insert_sorted(&mut self, entry: &ManifestEntry) -> Result<()> {
        let value = serde_json::to_value(entry)?;
        let exams = self.exams_mut()?;
        exams.push(value);
        exams.sort_by(|a, b| entry_code(a).unwrap_or("").cmp(entry_code(b).unwrap_or("")));
        Ok(())
    }

    pub fn total_exams(&self) -> usize {
        self.exams().len()
    }

    /// Sum of every entry's `questionCount`; entries without one count 0.
    pub fn total_questions(&self) -> usize {
        self.exams()
            .iter()
            .filter_map(|e| e.get("questionCount").and_then(Value::as_u64))
            .map(|n| n as usize)
            .sum()
    }

    /// Recompute `totalExams`, `totalQuestions` and `generated`.
    pub fn refresh_totals(&mut self) {
        let total_exams = self.total_exams();
        let total_questions = self.total_questions();
        self.root
            .entry("version")
            .or_insert_with(|| Value::from(MANIFEST_VERSION));
        self.root
            .insert("generated".to_string(), Value::from(time::format(&time::now())));
        self.root.insert("totalExams".to_string(), Value::from(total_exams));
        self.root
            .insert("totalQuestions".to_string(), Value::from(total_questions));
    }

    pub fn validate(&self) -> Result<()> {
        validate_root(&self.root)
    }
}

fn entry_code(entry: &Value) -> Option<&str> {
    entry.get("code").and_then(Value::as_str)
}

/// Metadata for one exam.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub code: String,

    pub name: String,

    /// Operator-owned once non-empty
    #[serde(default)]
    pub description: String,

    pub question_count: usize,

    /// Modification time of the exam's content file
    #[serde(with = "time::serde_ts")]
    pub last_updated: DateTime<Utc>,

    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub domain_detection: DomainDetection,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
}

impl ManifestEntry {
    /// Description given to exams nobody has described yet.
    pub fn default_description(name: &str) -> String {
        format!("{name} certification exam questions")
    }

    /// Carry operator and detection data over from a previous entry.
    ///
    /// A non-empty previous description always wins. The previous
    /// `detectedAt` is kept when the classification did not change.
    pub fn inherit(&mut self, description: Option<&str>, detection: Option<(&str, &DomainDetection)>) {
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            self.description = description.to_string();
        }
        if let Some((domain, previous)) = detection {
            if domain == self.domain && previous.confidence == self.domain_detection.confidence {
                self.domain_detection.detected_at = previous.detected_at;
            }
        }
    }
}

/// How an entry's domain was determined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DomainDetection {
    pub confidence: Confidence,

    #[serde(default = "default_auto_detected")]
    pub auto_detected: bool,

    #[serde(with = "time::serde_ts")]
    pub detected_at: DateTime<Utc>,
}

fn default_auto_detected() -> bool {
    true
}

impl Default for DomainDetection {
    fn default() -> Self {
        Self {
            confidence: Confidence::Low,
            auto_detected: true,
            detected_at: DateTime::UNIX_EPOCH,
        }
    }
}

/// Classification confidence tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link collection status, present when the exam has a links record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceInfo {
    pub total_links: usize,
    pub scraped_links: usize,
    pub last_scan: String,
}

/// Diagnostic breakdown of a manifest; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSummary {
    pub by_domain: BTreeMap<String, usize>,
    pub by_confidence: BTreeMap<Confidence, usize>,
}
