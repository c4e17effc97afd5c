//! Pipeline entry points.
//!
//! - `run_links`: Collect listing links and dispatch them per exam
//! - `run_questions`: Scrape questions from stored links, then update the manifest
//! - `run_generate` / `run_update`: Rebuild or patch the manifest
//! - `run_pipeline`: All of the above in order
//!
//! Phases only talk through the files in the data directory.

pub mod collect;
pub mod dispatch;
pub mod manifest;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod process;
pub mod validate;

pub use collect::run_collect;
pub use dispatch::{DispatchReport, dispatch_links};
pub use manifest::{ManifestUpdateReport, run_generate, run_info, run_update};
pub use pipeline::{
    PipelineOptions, PipelineReport, load_targets, run_links, run_pipeline, run_questions,
};
pub use process::{ExamResult, ExamStatus, ProcessReport, run_process};
pub use validate::{run_classify, run_classify_check, run_validate};
