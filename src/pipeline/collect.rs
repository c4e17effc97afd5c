// src/pipeline/collect.rs

//! Link collection phase.

use crate::error::Result;
use crate::models::Config;
use crate::services::{CollectionReport, LinkCollector};
use crate::utils::http::{PageFetcher, Politeness};
use crate::utils::log::{header, percent, sub_item, summary};
use crate::utils::progress::LogProgress;

/// Walk the listing once for `targets` and report what was found.
pub async fn run_collect(
    config: &Config,
    fetcher: &dyn PageFetcher,
    targets: &[String],
) -> Result<CollectionReport> {
    header("Collecting discussion links");
    log::info!(
        "Listing: {} ({} target exams)",
        config.listing.root_url(),
        targets.len()
    );

    let collector = LinkCollector::new(
        fetcher,
        config.listing.clone(),
        Politeness::from(config.crawler.page_delay()),
    );
    let progress = LogProgress::new("listing");
    let report = collector.collect(targets, &progress).await?;

    for (code, links) in &report.links {
        sub_item(&format!("{code}: {} links", links.len()));
    }
    let missing = report.missing(targets);
    if !missing.is_empty() {
        log::warn!("No links for: {}", missing.join(", "));
    }
    if !report.failed_pages.is_empty() {
        let pages: Vec<String> = report.failed_pages.iter().map(u32::to_string).collect();
        log::warn!("Unreachable pages: {}", pages.join(", "));
    }

    summary(
        "Link collection",
        &[
            (
                "Pages scanned",
                format!("{}/{}", report.pages_scanned, report.total_pages),
            ),
            (
                "Exams found",
                format!(
                    "{}/{} ({})",
                    report.links.len(),
                    targets.len(),
                    percent(report.links.len(), targets.len())
                ),
            ),
            ("Links", report.total_links().to_string()),
        ],
    );
    Ok(report)
}
