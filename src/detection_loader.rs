//! Detection loading stage.
//!
//! Reads the intermediate CSV artifact and bulk-inserts the tuples into
//! `fct_image_detections` with conflict-do-nothing semantics. Type coercion
//! is explicit: a single unparseable row aborts the whole batch rather than
//! loading it partially.

use std::path::Path;
use std::time::Instant;

use metrics::counter;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::Database;
use crate::error::{PipelineError, Result};
use crate::metrics as pipeline_metrics;
use crate::models::Detection;
use crate::schema::detections;

/// Outcome of one detection-load stage execution.
#[derive(Debug, Default)]
pub struct DetectionLoadSummary {
    /// Rows read from the artifact
    pub rows_read: usize,
    /// Rows actually inserted (duplicates are silently dropped)
    pub rows_inserted: usize,
}

/// One raw artifact row before type coercion.
#[derive(Debug, Deserialize)]
struct ArtifactRow {
    message_id: String,
    image_path: String,
    detected_object_class: String,
    confidence_score: String,
}

impl ArtifactRow {
    fn coerce(self, row: usize) -> Result<Detection> {
        let message_id = self.message_id.trim().parse::<i64>().map_err(|e| {
            PipelineError::ArtifactRow {
                row,
                reason: format!("message_id {:?}: {e}", self.message_id),
            }
        })?;
        let confidence_score = self.confidence_score.trim().parse::<f64>().map_err(|e| {
            PipelineError::ArtifactRow {
                row,
                reason: format!("confidence_score {:?}: {e}", self.confidence_score),
            }
        })?;
        Ok(Detection {
            message_id,
            image_path: self.image_path,
            detected_object_class: self.detected_object_class,
            confidence_score,
        })
    }
}

/// Run the detection loading stage.
///
/// An absent artifact is logged as an error and the stage returns without
/// touching the database; an empty artifact is a logged warning. Both leave
/// existing table state untouched.
pub fn load_detections(config: &AppConfig) -> Result<DetectionLoadSummary> {
    let start = Instant::now();
    let artifact = Path::new(&config.ingest.detections_csv);

    let mut summary = DetectionLoadSummary::default();
    if !artifact.exists() {
        error!("Detections artifact not found: {}", artifact.display());
        pipeline_metrics::record_stage("load_detections", start.elapsed(), true);
        return Ok(summary);
    }

    let mut reader = csv::Reader::from_path(artifact)?;
    let mut rows: Vec<Detection> = Vec::new();
    for (index, record) in reader.deserialize::<ArtifactRow>().enumerate() {
        let raw = record?;
        rows.push(raw.coerce(index + 1)?);
    }
    summary.rows_read = rows.len();
    info!(
        "Loaded {} detection records from {}",
        rows.len(),
        artifact.display()
    );

    if rows.is_empty() {
        warn!("No detection records to load");
        pipeline_metrics::record_stage("load_detections", start.elapsed(), true);
        return Ok(summary);
    }

    let mut db = Database::open(&config.database)?;
    db.ensure_detections_table()?;
    summary.rows_inserted = db.insert_detections(&rows)?;
    counter!(pipeline_metrics::DETECTIONS_LOADED).increment(summary.rows_inserted as u64);

    info!(
        "All detection records loaded into the {} table",
        detections::TABLE
    );
    pipeline_metrics::record_stage("load_detections", start.elapsed(), true);
    Ok(summary)
}
