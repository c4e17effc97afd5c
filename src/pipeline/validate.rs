// src/pipeline/validate.rs

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::DomainTable;
use crate::services::classifier::REFERENCE_CASES;
use crate::utils::log::{header, sub_item, summary};

/// Validate the configuration and log the effective settings.
pub fn run_validate(config: &Config) -> Result<()> {
    header("Validating configuration");

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {e}");
        return Err(e);
    }

    log::info!("Config OK");
    sub_item(&format!("User agent: {}", config.crawler.user_agent));
    sub_item(&format!("Timeout: {}s", config.crawler.timeout_secs));
    sub_item(&format!(
        "Page delay: {}-{} ms",
        config.crawler.page_delay_min_ms, config.crawler.page_delay_max_ms
    ));
    sub_item(&format!(
        "Question delay: {}-{} ms",
        config.crawler.question_delay_min_ms, config.crawler.question_delay_max_ms
    ));
    sub_item(&format!("Listing: {}", config.listing.root_url()));
    sub_item(&format!("Data directory: {}", config.paths.data_dir.display()));

    run_classify_check(&DomainTable::builtin()?)
}

/// Classify the given codes and log each result.
pub fn run_classify(table: &DomainTable, codes: &[String]) {
    for code in codes {
        let detection = table.classify(code);
        log::info!("{code} -> {} ({})", detection.domain, detection.confidence);
    }
}

/// Check the table against the reference cases.
pub fn run_classify_check(table: &DomainTable) -> Result<()> {
    let mut failures = Vec::new();
    for (code, domain, confidence) in REFERENCE_CASES {
        let got = table.classify(code);
        if got.domain == *domain && got.confidence == *confidence {
            sub_item(&format!("ok   {code} -> {domain} ({confidence})"));
        } else {
            sub_item(&format!(
                "FAIL {code} -> {} ({}), expected {domain} ({confidence})",
                got.domain, got.confidence
            ));
            failures.push(*code);
        }
    }

    summary(
        "Domain classification",
        &[
            ("Passed", (REFERENCE_CASES.len() - failures.len()).to_string()),
            ("Failed", failures.len().to_string()),
        ],
    );

    if failures.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "domain classification mismatch for {}",
            failures.join(", ")
        )))
    }
}
