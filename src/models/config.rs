//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and pacing behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Discussion listing location and selectors
    #[serde(default)]
    pub listing: ListingConfig,

    /// Selectors for individual question pages
    #[serde(default)]
    pub questions: QuestionConfig,

    /// Storage locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.page_delay_min_ms > self.crawler.page_delay_max_ms {
            return Err(AppError::validation(
                "crawler.page_delay_min_ms must not exceed crawler.page_delay_max_ms",
            ));
        }
        if self.crawler.question_delay_min_ms > self.crawler.question_delay_max_ms {
            return Err(AppError::validation(
                "crawler.question_delay_min_ms must not exceed crawler.question_delay_max_ms",
            ));
        }
        if self.listing.category.trim().is_empty() {
            return Err(AppError::validation("listing.category is empty"));
        }
        url::Url::parse(&self.listing.root_url())?;

        for selector in [
            &self.listing.page_indicator_selector,
            &self.listing.page_count_selector,
            &self.listing.entry_selector,
            &self.listing.link_selector,
            &self.questions.body_selector,
            &self.questions.choice_selector,
            &self.questions.answer_selector,
        ] {
            parse_selector(selector)?;
        }
        Ok(())
    }
}

/// Parse a CSS selector, mapping failures onto [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// HTTP client and pacing settings.
///
/// All requests are issued one at a time; the delays only control how long
/// the client waits between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Lower bound of the random pause between listing pages
    #[serde(default = "defaults::page_delay_min")]
    pub page_delay_min_ms: u64,

    /// Upper bound of the random pause between listing pages
    #[serde(default = "defaults::page_delay_max")]
    pub page_delay_max_ms: u64,

    /// Lower bound of the random pause between question pages
    #[serde(default = "defaults::question_delay_min")]
    pub question_delay_min_ms: u64,

    /// Upper bound of the random pause between question pages
    #[serde(default = "defaults::question_delay_max")]
    pub question_delay_max_ms: u64,

    /// Fixed pause between two exams during question processing
    #[serde(default = "defaults::exam_pause")]
    pub exam_pause_secs: u64,
}

impl CrawlerConfig {
    pub fn page_delay(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.page_delay_min_ms),
            Duration::from_millis(self.page_delay_max_ms),
        )
    }

    pub fn question_delay(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.question_delay_min_ms),
            Duration::from_millis(self.question_delay_max_ms),
        )
    }

    pub fn exam_pause(&self) -> Duration {
        Duration::from_secs(self.exam_pause_secs)
    }

    /// Disable every pause. Used by tests and offline replays.
    pub fn without_delays(mut self) -> Self {
        self.page_delay_min_ms = 0;
        self.page_delay_max_ms = 0;
        self.question_delay_min_ms = 0;
        self.question_delay_max_ms = 0;
        self.exam_pause_secs = 0;
        self
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            page_delay_min_ms: defaults::page_delay_min(),
            page_delay_max_ms: defaults::page_delay_max(),
            question_delay_min_ms: defaults::question_delay_min(),
            question_delay_max_ms: defaults::question_delay_max(),
            exam_pause_secs: defaults::exam_pause(),
        }
    }
}

/// Paginated discussion listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Discussions root, e.g. `https://www.examtopics.com/discussions/`
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Vendor category appended to the base URL
    #[serde(default = "defaults::category")]
    pub category: String,

    /// Element holding the "page X of N" counter
    #[serde(default = "defaults::page_indicator_selector")]
    pub page_indicator_selector: String,

    /// Elements inside the counter; the second one holds N
    #[serde(default = "defaults::page_count_selector")]
    pub page_count_selector: String,

    /// One element per discussion entry
    #[serde(default = "defaults::entry_selector")]
    pub entry_selector: String,

    /// Link element inside an entry
    #[serde(default = "defaults::link_selector")]
    pub link_selector: String,

    /// Tag written to the `method` field of links records
    #[serde(default = "defaults::collection_method")]
    pub collection_method: String,
}

impl ListingConfig {
    /// URL of the listing root (also the first page).
    pub fn root_url(&self) -> String {
        format!(
            "{}/{}/",
            self.base_url.trim_end_matches('/'),
            self.category.trim_matches('/')
        )
    }

    /// URL of a 1-based listing page.
    pub fn page_url(&self, page: u32) -> String {
        format!("{}{}/", self.root_url(), page)
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            category: defaults::category(),
            page_indicator_selector: defaults::page_indicator_selector(),
            page_count_selector: defaults::page_count_selector(),
            entry_selector: defaults::entry_selector(),
            link_selector: defaults::link_selector(),
            collection_method: defaults::collection_method(),
        }
    }
}

/// Question page selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionConfig {
    #[serde(default = "defaults::body_selector")]
    pub body_selector: String,

    #[serde(default = "defaults::choice_selector")]
    pub choice_selector: String,

    #[serde(default = "defaults::answer_selector")]
    pub answer_selector: String,
}

impl Default for QuestionConfig {
    fn default() -> Self {
        Self {
            body_selector: defaults::body_selector(),
            choice_selector: defaults::choice_selector(),
            answer_selector: defaults::answer_selector(),
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding `manifest.json` and one subdirectory per exam
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; examsync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn page_delay_min() -> u64 {
        2_000
    }
    pub fn page_delay_max() -> u64 {
        4_000
    }
    pub fn question_delay_min() -> u64 {
        5_000
    }
    pub fn question_delay_max() -> u64 {
        10_000
    }
    pub fn exam_pause() -> u64 {
        15
    }

    // Listing defaults
    pub fn base_url() -> String {
        "https://www.examtopics.com/discussions/".into()
    }
    pub fn category() -> String {
        "servicenow".into()
    }
    pub fn page_indicator_selector() -> String {
        "span.discussion-list-page-indicator".into()
    }
    pub fn page_count_selector() -> String {
        "strong".into()
    }
    pub fn entry_selector() -> String {
        // The site spells it this way.
        "div.dicussion-title-container".into()
    }
    pub fn link_selector() -> String {
        "a".into()
    }
    pub fn collection_method() -> String {
        "servicenow_batch_collection".into()
    }

    // Question page defaults
    pub fn body_selector() -> String {
        "div.question-body p.card-text".into()
    }
    pub fn choice_selector() -> String {
        "li.multi-choice-item".into()
    }
    pub fn answer_selector() -> String {
        "span.correct-answer".into()
    }

    // Path defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("public/data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_delay_range() {
        let mut config = Config::default();
        config.crawler.page_delay_min_ms = 5_000;
        config.crawler.page_delay_max_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_selector() {
        let mut config = Config::default();
        config.listing.entry_selector = "div[".to_string();
        assert!(matches!(
            config.validate(),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn test_listing_urls() {
        let listing = ListingConfig::default();
        assert_eq!(
            listing.root_url(),
            "https://www.examtopics.com/discussions/servicenow/"
        );
        assert_eq!(
            listing.page_url(3),
            "https://www.examtopics.com/discussions/servicenow/3/"
        );
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            page_delay_min_ms = 10
            page_delay_max_ms = 20

            [paths]
            data_dir = "/tmp/exams"
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.page_delay_min_ms, 10);
        assert_eq!(config.crawler.timeout_secs, 30);
        assert_eq!(config.listing.category, "servicenow");
        assert_eq!(config.paths.data_dir, PathBuf::from("/tmp/exams"));
    }

    #[test]
    fn test_without_delays_zeroes_every_pause() {
        let crawler = CrawlerConfig::default().without_delays();
        assert_eq!(crawler.page_delay(), (Duration::ZERO, Duration::ZERO));
        assert_eq!(crawler.question_delay(), (Duration::ZERO, Duration::ZERO));
        assert_eq!(crawler.exam_pause(), Duration::ZERO);
    }
}
