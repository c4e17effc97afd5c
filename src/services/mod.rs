//! Service layer for the scraper application.
//!
//! This module contains the business logic for:
//! - Listing pagination and link collection (`LinkCollector`)
//! - Question page scraping (`QuestionScraper`)
//! - Exam domain classification (`DomainTable`)
//! - Manifest reconciliation (`ManifestReconciler`)

pub mod classifier;
pub mod collector;
pub mod questions;
pub mod reconciler;

pub use classifier::{Detection, DomainTable};
pub use collector::{CollectionReport, LinkCollector};
pub use questions::{ItemProcessor, ProcessOutcome, QuestionScraper};
pub use reconciler::{ManifestReconciler, Reconciliation, ScanOutcome, SkipReason, UpdateAction, UpdateOutcome};
