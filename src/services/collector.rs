// src/services/collector.rs

//! Discussion link collector.
//!
//! Walks the paginated discussion listing exactly once and sorts every entry
//! that names a target exam into that exam's link list.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ListingConfig, parse_selector};
use crate::utils::http::{PageFetcher, Politeness};
use crate::utils::progress::ProgressReporter;
use crate::utils::{resolve_url, sort_by_question_number};

static EXAM_CODE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Exam\s+([A-Za-z0-9-]+)").ok());

/// Exam code named in a discussion title (`"Exam CIS-ITSM topic 1 ..."`).
pub fn extract_exam_code(title: &str) -> Option<&str> {
    EXAM_CODE
        .as_ref()?
        .captures(title)?
        .get(1)
        .map(|m| m.as_str())
}

/// One discussion entry on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    pub href: Option<String>,
}

/// Read the listing page count (the second counter element).
pub fn parse_page_count(html: &str, listing: &ListingConfig) -> Result<u32> {
    let document = Html::parse_document(html);
    let indicator_sel = parse_selector(&listing.page_indicator_selector)?;
    let count_sel = parse_selector(&listing.page_count_selector)?;

    let indicator = document.select(&indicator_sel).next().ok_or_else(|| {
        AppError::listing(format!(
            "page indicator '{}' not found",
            listing.page_indicator_selector
        ))
    })?;

    let counters: Vec<String> = indicator
        .select(&count_sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect();

    let raw = counters.get(1).ok_or_else(|| {
        AppError::listing(format!(
            "page indicator has {} '{}' element(s), expected at least 2",
            counters.len(),
            listing.page_count_selector
        ))
    })?;

    raw.parse()
        .map_err(|_| AppError::listing(format!("page count '{raw}' is not a number")))
}

/// Discussion entries of one listing page, in document order.
pub fn parse_entries(html: &str, listing: &ListingConfig) -> Result<Vec<ListingEntry>> {
    let document = Html::parse_document(html);
    let entry_sel = parse_selector(&listing.entry_selector)?;
    let link_sel = parse_selector(&listing.link_selector)?;

    let entries = document
        .select(&entry_sel)
        .map(|entry| ListingEntry {
            title: entry.text().collect::<String>().trim().to_string(),
            href: entry
                .select(&link_sel)
                .find_map(|a| a.value().attr("href"))
                .map(str::to_string),
        })
        .collect();
    Ok(entries)
}

/// Result of one collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Exam code to ordered links; exams without links are absent
    pub links: BTreeMap<String, Vec<String>>,
    pub total_pages: u32,
    pub pages_scanned: u32,
    pub failed_pages: Vec<u32>,
}

impl CollectionReport {
    /// Codes that received at least one link.
    pub fn found(&self) -> Vec<&str> {
        self.links.keys().map(String::as_str).collect()
    }

    pub fn total_links(&self) -> usize {
        self.links.values().map(Vec::len).sum()
    }

    /// Targets that received no link, in target order.
    pub fn missing<'t>(&self, targets: &'t [String]) -> Vec<&'t str> {
        targets
            .iter()
            .filter(|code| !self.links.contains_key(code.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Single-pass collector over the discussion listing.
pub struct LinkCollector<'a> {
    fetcher: &'a dyn PageFetcher,
    listing: ListingConfig,
    delay: Politeness,
}

impl<'a> LinkCollector<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, listing: ListingConfig, delay: Politeness) -> Self {
        Self {
            fetcher,
            listing,
            delay,
        }
    }

    /// Visit every listing page once and gather links for `targets`.
    ///
    /// Fails only when the listing root cannot be fetched or paginated; a
    /// page that fails to load is recorded in the report and skipped.
    pub async fn collect(
        &self,
        targets: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<CollectionReport> {
        let root_url = self.listing.root_url();
        let base = Url::parse(&root_url)?;
        let wanted: HashSet<&str> = targets.iter().map(String::as_str).collect();

        let root_html = self
            .fetcher
            .fetch_text(&root_url)
            .await
            .map_err(|e| AppError::listing(format!("listing root {root_url} unreachable: {e}")))?;
        let total_pages = parse_page_count(&root_html, &self.listing)?;
        log::info!("Listing has {total_pages} pages");

        let mut report = CollectionReport {
            total_pages,
            ..CollectionReport::default()
        };

        for page in 1..=total_pages {
            let url = self.listing.page_url(page);
            progress.report(
                f64::from(page - 1) / f64::from(total_pages),
                &format!("page {page}/{total_pages}"),
            );

            match self.scan_page(&url, &base, &wanted, &mut report.links).await {
                Ok(matched) => {
                    report.pages_scanned += 1;
                    log::debug!("Page {page}: {matched} matching link(s)");
                }
                Err(e) => {
                    report.failed_pages.push(page);
                    log::warn!("Page {page} skipped ({url}): {e}");
                }
            }

            if page < total_pages {
                self.delay.pause().await;
            }
        }

        for links in report.links.values_mut() {
            sort_by_question_number(links);
        }
        progress.report(1.0, "listing scanned");

        log::info!(
            "Scanned {}/{} pages, {} link(s) for {} exam(s)",
            report.pages_scanned,
            report.total_pages,
            report.total_links(),
            report.links.len()
        );
        Ok(report)
    }

    async fn scan_page(
        &self,
        url: &str,
        base: &Url,
        wanted: &HashSet<&str>,
        links: &mut BTreeMap<String, Vec<String>>,
    ) -> Result<usize> {
        let html = self.fetcher.fetch_text(url).await?;
        let entries = parse_entries(&html, &self.listing)?;

        let mut matched = 0;
        for entry in entries {
            let Some(code) = extract_exam_code(&entry.title) else {
                continue;
            };
            if !wanted.contains(code) {
                continue;
            }
            if let Some(href) = entry.href {
                links
                    .entry(code.to_string())
                    .or_default()
                    .push(resolve_url(base, &href));
                matched += 1;
            }
        }
        Ok(matched)
    }
}
