// src/models/mod.rs

//! Domain models for the scraper application.
//!
//! Everything persisted under the data directory is defined here, together
//! with the configuration structures.

mod config;
mod exam;
mod links;
mod manifest;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, ListingConfig, PathsConfig, QuestionConfig, parse_selector,
};
pub use exam::{ExamFile, ExamSummary, Question, UpdateStats};
pub use links::{LinkEntry, LinksRecord, LinksSummary, STATUS_COMPLETE};
pub use manifest::{
    Confidence, DomainDetection, DomainSummary, MANIFEST_VERSION, Manifest, ManifestDocument,
    ManifestEntry, SourceInfo,
};
