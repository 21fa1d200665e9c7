//! Metrics collection for the pipeline stages.
//!
//! Metric names follow the `telegram_<subsystem>_<metric>` convention. With
//! no recorder installed every call is a no-op, so stages record
//! unconditionally.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Duration;

/// Total JSON files discovered per run
pub const FILES_DISCOVERED: &str = "telegram_ingest_files_discovered_total";
/// Total messages upserted into the raw table
pub const MESSAGES_LOADED: &str = "telegram_ingest_messages_loaded_total";
/// Total inputs skipped at record level
pub const RECORDS_SKIPPED: &str = "telegram_ingest_records_skipped_total";
/// Total images run through the detection model
pub const IMAGES_PROCESSED: &str = "telegram_enrich_images_processed_total";
/// Total detection rows written to the artifact
pub const DETECTIONS_WRITTEN: &str = "telegram_enrich_detections_written_total";
/// Total detection rows inserted into the detections table
pub const DETECTIONS_LOADED: &str = "telegram_load_detections_loaded_total";
/// Stage wall-clock duration
pub const STAGE_DURATION: &str = "telegram_pipeline_stage_duration_seconds";
/// Total pipeline runs, labeled by outcome
pub const RUNS_TOTAL: &str = "telegram_pipeline_runs_total";

/// Register metric descriptions once at startup.
pub fn describe() {
    describe_counter!(FILES_DISCOVERED, "JSON files discovered per run");
    describe_counter!(MESSAGES_LOADED, "Messages upserted into the raw table");
    describe_counter!(RECORDS_SKIPPED, "Inputs skipped at record level");
    describe_counter!(IMAGES_PROCESSED, "Images run through the detection model");
    describe_counter!(DETECTIONS_WRITTEN, "Detection rows written to the artifact");
    describe_counter!(DETECTIONS_LOADED, "Detection rows inserted into the detections table");
    describe_histogram!(STAGE_DURATION, Unit::Seconds, "Stage wall-clock duration");
    describe_counter!(RUNS_TOTAL, "Pipeline runs by outcome");
}

/// Record one stage execution.
pub fn record_stage(stage: &'static str, duration: Duration, success: bool) {
    histogram!(STAGE_DURATION, "stage" => stage).record(duration.as_secs_f64());
    if !success {
        counter!(RUNS_TOTAL, "outcome" => "failed").increment(1);
    }
}

/// Record a completed pipeline run.
pub fn record_run(success: bool) {
    let outcome = if success { "success" } else { "failed" };
    counter!(RUNS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a batch of skipped inputs for a stage.
pub fn record_skips(stage: &'static str, count: usize) {
    if count > 0 {
        counter!(RECORDS_SKIPPED, "stage" => stage).increment(count as u64);
    }
}
