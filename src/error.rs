//! Error types for the telegram-analytics pipeline.
//!
//! Stage-level failures are `PipelineError` values propagated with `?` and
//! abort the run. Record-level problems (one bad file, one bad image) are
//! represented as [`RecordSkip`] values collected into stage summaries; they
//! never escalate to a stage failure.

use thiserror::Error;

/// Errors that abort a pipeline stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV artifact errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A source path that does not follow the `<root>/<date>/<channel>/<file>` layout
    #[error("Invalid source path {path}: {reason}")]
    PathLayout { path: String, reason: String },

    /// A malformed row in the detections artifact; any such row aborts the batch
    #[error("Malformed artifact row {row}: {reason}")]
    ArtifactRow { row: usize, reason: String },

    /// Invalid configuration or a missing required resource
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Detection model errors
    #[error("Detection model error: {0}")]
    Detection(String),

    /// External scrape step failed
    #[error("Scrape step failed: {0}")]
    Scrape(String),

    /// External transform step failed
    #[error("Transform step failed: {0}")]
    Transform(String),
}

/// Convenience type alias for Result with PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// A single input that was passed over without failing its stage.
///
/// Call sites decide explicitly between skipping (produce a `RecordSkip`,
/// log, continue) and aborting (return `Err(PipelineError)`).
#[derive(Debug, Clone)]
pub struct RecordSkip {
    /// The file or record that was skipped
    pub input: String,
    /// Why it was skipped
    pub reason: String,
}

impl RecordSkip {
    pub fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
