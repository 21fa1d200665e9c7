//! Raw message loading stage.
//!
//! Discovers per-channel JSON dumps, flattens them, and bulk-upserts the
//! result into `raw_telegram_messages`. The stage is idempotent: re-running
//! it over the same files leaves one row per natural key with the latest
//! field values.

use std::path::Path;
use std::time::Instant;

use metrics::counter;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::Database;
use crate::discovery;
use crate::error::{RecordSkip, Result};
use crate::flatten;
use crate::metrics as pipeline_metrics;
use crate::schema::raw_messages;

/// Outcome of one raw-load stage execution.
#[derive(Debug, Default)]
pub struct LoadSummary {
    /// JSON files discovered under the raw-data root
    pub files_found: usize,
    /// Files that flattened cleanly
    pub files_loaded: usize,
    /// Messages flattened across all files
    pub messages: usize,
    /// Rows written through the upsert
    pub rows_upserted: usize,
    /// Single-file failures that were skipped
    pub skipped: Vec<RecordSkip>,
}

/// Run the raw message loading stage.
///
/// An empty batch (no files, or nothing flattened) is a logged no-op, not an
/// error; existing table state is left untouched. Database failures abort
/// the stage.
pub fn load_raw_messages(config: &AppConfig) -> Result<LoadSummary> {
    let start = Instant::now();
    let root = Path::new(&config.ingest.raw_data_root);
    let files = discovery::find_json_files(root);
    counter!(pipeline_metrics::FILES_DISCOVERED).increment(files.len() as u64);

    let mut summary = LoadSummary {
        files_found: files.len(),
        ..LoadSummary::default()
    };

    let mut batch = Vec::new();
    for file in &files {
        match flatten::read_message_file(file) {
            Ok(mut rows) => {
                summary.files_loaded += 1;
                batch.append(&mut rows);
            }
            Err(e) => {
                error!("Failed to process {}: {}", file.display(), e);
                summary
                    .skipped
                    .push(RecordSkip::new(file.display().to_string(), e.to_string()));
            }
        }
    }
    pipeline_metrics::record_skips("load_raw", summary.skipped.len());

    summary.messages = batch.len();
    info!(
        "Flattened {} messages from {} of {} files",
        summary.messages, summary.files_loaded, summary.files_found
    );

    if batch.is_empty() {
        warn!("No messages to load");
        pipeline_metrics::record_stage("load_raw", start.elapsed(), true);
        return Ok(summary);
    }

    let mut db = Database::open(&config.database)?;
    db.ensure_raw_messages_table()?;
    summary.rows_upserted = db.upsert_raw_messages(&batch)?;
    counter!(pipeline_metrics::MESSAGES_LOADED).increment(summary.rows_upserted as u64);

    info!(
        "All messages loaded into the {} table",
        raw_messages::TABLE
    );
    pipeline_metrics::record_stage("load_raw", start.elapsed(), true);
    Ok(summary)
}
