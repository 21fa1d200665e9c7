//! Detection enrichment stage.
//!
//! For every scraped image that follows the `photo_<message_id>.jpg` naming
//! contract, runs the detection model and collects one row per detected
//! object. The full result set is persisted to the intermediate CSV artifact
//! consumed by the detection loader. A single image never aborts the stage.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

use metrics::counter;
use regex::Regex;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::detect::ObjectDetector;
use crate::discovery;
use crate::error::{RecordSkip, Result};
use crate::metrics as pipeline_metrics;
use crate::models::Detection;

/// Outcome of one enrichment stage execution.
#[derive(Debug, Default)]
pub struct EnrichSummary {
    /// Images discovered under the raw-data root
    pub images_found: usize,
    /// Images the model processed successfully
    pub images_processed: usize,
    /// Detection rows collected across all images
    pub detections: usize,
    /// True when the artifact was (re)written this run
    pub artifact_written: bool,
    /// Per-image skips (bad filename, model failure)
    pub skipped: Vec<RecordSkip>,
}

// The scraper names downloads photo_<message_id>.jpg; anything else carries
// no message id.
#[allow(clippy::expect_used)]
fn photo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^photo_(\d+)\.jpg$").expect("pattern is valid"))
}

/// Derive the message id from an image filename.
///
/// Returns `None` for any name outside the `photo_<id>.jpg` contract.
pub fn message_id_from_filename(path: &Path) -> Option<i64> {
    let name = path.file_name()?.to_str()?;
    let captures = photo_pattern().captures(name)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Run the enrichment stage.
///
/// Zero discovered images is a logged warning that terminates the stage
/// without touching the artifact. Zero detections across all images likewise
/// leaves any prior artifact in place, so the loader only ever sees a
/// complete result set.
pub fn enrich_images(config: &AppConfig, detector: &mut dyn ObjectDetector) -> Result<EnrichSummary> {
    let start = Instant::now();
    let root = Path::new(&config.ingest.raw_data_root);
    let images = discovery::find_image_files(root);

    let mut summary = EnrichSummary {
        images_found: images.len(),
        ..EnrichSummary::default()
    };

    if images.is_empty() {
        warn!(
            "No images found under {}; check the data directory structure",
            root.display()
        );
        pipeline_metrics::record_stage("enrich", start.elapsed(), true);
        return Ok(summary);
    }

    let mut rows: Vec<Detection> = Vec::new();
    for image in &images {
        let Some(message_id) = message_id_from_filename(image) else {
            warn!("Could not extract message id from {}", image.display());
            summary.skipped.push(RecordSkip::new(
                image.display().to_string(),
                "filename outside the photo_<id>.jpg contract",
            ));
            continue;
        };

        match detector.detect(image) {
            Ok(objects) => {
                for object in &objects {
                    let class = detector
                        .class_name(object.class_id)
                        .map_or_else(|| format!("class_{}", object.class_id), ToString::to_string);
                    rows.push(Detection {
                        message_id,
                        image_path: image.display().to_string(),
                        detected_object_class: class,
                        confidence_score: f64::from(object.confidence),
                    });
                }
                summary.images_processed += 1;
                info!("Processed {}: {} detections", image.display(), objects.len());
            }
            Err(e) => {
                error!("Error processing {}: {}", image.display(), e);
                summary
                    .skipped
                    .push(RecordSkip::new(image.display().to_string(), e.to_string()));
            }
        }
    }
    counter!(pipeline_metrics::IMAGES_PROCESSED).increment(summary.images_processed as u64);
    pipeline_metrics::record_skips("enrich", summary.skipped.len());

    summary.detections = rows.len();
    if rows.is_empty() {
        warn!("No detections found in any images");
        pipeline_metrics::record_stage("enrich", start.elapsed(), true);
        return Ok(summary);
    }

    write_artifact(Path::new(&config.ingest.detections_csv), &rows)?;
    summary.artifact_written = true;
    counter!(pipeline_metrics::DETECTIONS_WRITTEN).increment(rows.len() as u64);
    info!(
        "Saved {} detection rows to {}",
        rows.len(),
        config.ingest.detections_csv
    );

    pipeline_metrics::record_stage("enrich", start.elapsed(), true);
    Ok(summary)
}

/// Replace the intermediate artifact with the full result set.
fn write_artifact(path: &Path, rows: &[Detection]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_contract_extracts_id() {
        assert_eq!(
            message_id_from_filename(Path::new("data/2024-07-10/chemed/photo_123.jpg")),
            Some(123)
        );
    }

    #[test]
    fn filename_contract_rejects_other_names() {
        assert_eq!(message_id_from_filename(Path::new("banner.jpg")), None);
        assert_eq!(message_id_from_filename(Path::new("photo_.jpg")), None);
        assert_eq!(message_id_from_filename(Path::new("photo_12.png")), None);
    }
}
