//! File storage for exam data and the manifest.
//!
//! Every pipeline stage reads and writes only these files, so any stage can
//! be rerun on its own.
//!
//! ## Directory Structure
//!
//! ```text
//! {data_dir}/
//! ├── manifest.json         # Summary index read by the front-end
//! ├── manifest.json.backup  # Previous manifest (single generation)
//! └── {exam_code}/
//!     ├── links.json        # Collected discussion links
//!     └── exam.json         # Scraped questions
//! ```

pub mod local;

// Re-export for convenience
pub use local::LocalStorage;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const BACKUP_FILE: &str = "manifest.json.backup";
pub const LINKS_FILE: &str = "links.json";
pub const EXAM_FILE: &str = "exam.json";

/// Result of a manifest save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Whether the previous manifest was copied to the backup path
    pub backed_up: bool,
    pub total_exams: usize,
    pub total_questions: usize,
}
