use std::fs;
use std::path::Path;

use telegram_analytics::config::AppConfig;
use telegram_analytics::db::Database;
use telegram_analytics::detection_loader::load_detections;
use telegram_analytics::error::PipelineError;

const HEADER: &str = "message_id,image_path,detected_object_class,confidence_score";

fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.path = dir.join("telegram.db").display().to_string();
    config.ingest.raw_data_root = dir.join("raw").display().to_string();
    config.ingest.detections_csv = dir.join("yolo_detections.csv").display().to_string();
    config
}

fn write_artifact(config: &AppConfig, rows: &[&str]) {
    let mut body = String::from(HEADER);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    body.push('\n');
    fs::write(&config.ingest.detections_csv, body).expect("write artifact");
}

#[test]
fn duplicate_tuples_collapse_to_one_row() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());

    write_artifact(
        &config,
        &[
            "123,raw/2024-07-10/chemed/photo_123.jpg,person,0.91",
            "123,raw/2024-07-10/chemed/photo_123.jpg,person,0.91",
            "123,raw/2024-07-10/chemed/photo_123.jpg,bottle,0.40",
        ],
    );

    let summary = load_detections(&config).expect("load");
    assert_eq!(summary.rows_read, 3);
    assert_eq!(summary.rows_inserted, 2);

    let db = Database::open_path(Path::new(&config.database.path)).expect("open db");
    assert_eq!(db.detection_count().expect("count"), 2);
}

#[test]
fn reloading_the_artifact_is_idempotent() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());

    write_artifact(
        &config,
        &["7,raw/2024-07-10/chemed/photo_7.jpg,car,0.55"],
    );

    load_detections(&config).expect("first load");
    let second = load_detections(&config).expect("second load");
    assert_eq!(second.rows_read, 1);
    assert_eq!(second.rows_inserted, 0);

    let db = Database::open_path(Path::new(&config.database.path)).expect("open db");
    assert_eq!(db.detection_count().expect("count"), 1);

    let rows = db.get_detections_for_message(7).expect("detections");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].detected_object_class, "car");
    assert!((rows[0].confidence_score - 0.55).abs() < 1e-9);
}

#[test]
fn absent_artifact_is_a_logged_no_op() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());

    let summary = load_detections(&config).expect("load without artifact");
    assert_eq!(summary.rows_read, 0);
    assert_eq!(summary.rows_inserted, 0);
    // No artifact, no connection: the store file is never created.
    assert!(!Path::new(&config.database.path).exists());
}

#[test]
fn empty_artifact_returns_without_db_work() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());

    write_artifact(&config, &[]);

    let summary = load_detections(&config).expect("load empty artifact");
    assert_eq!(summary.rows_read, 0);
    assert!(!Path::new(&config.database.path).exists());
}

#[test]
fn an_unparseable_row_aborts_the_whole_batch() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());

    write_artifact(
        &config,
        &[
            "7,raw/2024-07-10/chemed/photo_7.jpg,car,0.55",
            "not-a-number,raw/2024-07-10/chemed/photo_8.jpg,person,0.70",
        ],
    );

    let err = load_detections(&config).expect_err("parse failure must abort");
    assert!(matches!(err, PipelineError::ArtifactRow { row: 2, .. }));

    // Nothing from the batch may be visible.
    assert!(!Path::new(&config.database.path).exists());
}

#[test]
fn a_bad_confidence_aborts_too() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());

    write_artifact(
        &config,
        &["7,raw/2024-07-10/chemed/photo_7.jpg,car,very-sure"],
    );

    let err = load_detections(&config).expect_err("parse failure must abort");
    assert!(matches!(err, PipelineError::ArtifactRow { row: 1, .. }));
}
