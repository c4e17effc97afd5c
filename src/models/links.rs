//! Links record persisted per exam (`<code>/links.json`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::time;

/// Status written by a finished collection run.
pub const STATUS_COMPLETE: &str = "complete";

/// Ordered discussion links collected for one exam.
///
/// Replaced wholesale on every successful collection; never merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinksRecord {
    /// Number of listing pages the collection walked
    pub page_num: u32,

    pub status: String,

    pub links: Vec<LinkEntry>,

    #[serde(with = "time::serde_ts")]
    pub collected_at: DateTime<Utc>,

    pub method: String,

    pub exam_code: String,

    pub links_count: usize,
}

impl LinksRecord {
    /// Build a completed record from freshly collected links.
    pub fn complete(exam_code: &str, links: &[String], page_num: u32, method: &str) -> Self {
        Self {
            page_num,
            status: STATUS_COMPLETE.to_string(),
            links: links.iter().cloned().map(LinkEntry::Url).collect(),
            collected_at: time::now(),
            method: method.to_string(),
            exam_code: exam_code.to_string(),
            links_count: links.len(),
        }
    }

    /// Link URLs in stored order.
    pub fn urls(&self) -> Vec<String> {
        self.links.iter().map(|l| l.url().to_string()).collect()
    }
}

/// A stored link: a bare URL, or a URL with a scraped flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum LinkEntry {
    Url(String),
    Tracked {
        url: String,
        #[serde(default)]
        scraped: bool,
    },
}

impl LinkEntry {
    pub fn url(&self) -> &str {
        match self {
            LinkEntry::Url(url) | LinkEntry::Tracked { url, .. } => url,
        }
    }
}

/// Lenient view of a links file, as read by the manifest scan.
///
/// Missing fields and unknown link shapes do not fail the parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinksSummary {
    #[serde(default)]
    pub links: Vec<Value>,

    #[serde(default)]
    pub collected_at: Option<String>,
}

impl LinksSummary {
    pub fn total_links(&self) -> usize {
        self.links.len()
    }

    pub fn scraped_links(&self) -> usize {
        self.links
            .iter()
            .filter(|l| l.get("scraped").and_then(Value::as_bool).unwrap_or(false))
            .count()
    }

    /// Collection time as written, or `"unknown"`.
    pub fn last_scan(&self) -> String {
        self.collected_at
            .clone()
            .unwrap_or_else(|| "unknown".to_string())
    }
}
