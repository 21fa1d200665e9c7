use std::fs;
use std::path::{Path, PathBuf};

use telegram_analytics::config::AppConfig;
use telegram_analytics::detect::{DetectedObject, ObjectDetector};
use telegram_analytics::enrich::enrich_images;
use telegram_analytics::error::PipelineError;

fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.path = dir.join("telegram.db").display().to_string();
    config.ingest.raw_data_root = dir.join("raw").display().to_string();
    config.ingest.detections_csv = dir.join("yolo_detections.csv").display().to_string();
    config
}

fn seed_image(config: &AppConfig, scrape_date: &str, channel: &str, name: &str) -> PathBuf {
    let dir = Path::new(&config.ingest.raw_data_root)
        .join(scrape_date)
        .join(channel);
    fs::create_dir_all(&dir).expect("create channel dir");
    let path = dir.join(name);
    fs::write(&path, b"not a real jpeg").expect("write image");
    path
}

/// Deterministic stand-in for the opaque detection model.
struct StubDetector {
    objects: Vec<DetectedObject>,
    fail_on: Option<&'static str>,
}

impl StubDetector {
    fn returning(objects: Vec<DetectedObject>) -> Self {
        Self {
            objects,
            fail_on: None,
        }
    }
}

impl ObjectDetector for StubDetector {
    fn detect(&mut self, image_path: &Path) -> telegram_analytics::Result<Vec<DetectedObject>> {
        if let Some(marker) = self.fail_on {
            if image_path.to_string_lossy().contains(marker) {
                return Err(PipelineError::Detection("corrupt image".to_string()));
            }
        }
        Ok(self.objects.clone())
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        ["person", "car", "bottle"].get(class_id).copied()
    }
}

#[test]
fn detections_flow_into_the_artifact() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());
    seed_image(&config, "2024-07-10", "chemed", "photo_123.jpg");

    let mut detector = StubDetector::returning(vec![
        DetectedObject {
            class_id: 0,
            confidence: 0.91,
        },
        DetectedObject {
            class_id: 2,
            confidence: 0.40,
        },
    ]);

    let summary = enrich_images(&config, &mut detector).expect("enrich");
    assert_eq!(summary.images_found, 1);
    assert_eq!(summary.images_processed, 1);
    assert_eq!(summary.detections, 2);
    assert!(summary.artifact_written);

    let artifact = fs::read_to_string(&config.ingest.detections_csv).expect("artifact");
    let mut lines = artifact.lines();
    assert_eq!(
        lines.next(),
        Some("message_id,image_path,detected_object_class,confidence_score")
    );
    let body: Vec<&str> = lines.collect();
    assert_eq!(body.len(), 2);
    assert!(body[0].starts_with("123,"));
    assert!(body[0].contains(",person,"));
    assert!(body[1].contains(",bottle,"));
}

#[test]
fn images_outside_the_naming_contract_are_skipped() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());
    seed_image(&config, "2024-07-10", "chemed", "photo_123.jpg");
    seed_image(&config, "2024-07-10", "chemed", "banner.jpg");

    let mut detector = StubDetector::returning(vec![DetectedObject {
        class_id: 1,
        confidence: 0.7,
    }]);

    let summary = enrich_images(&config, &mut detector).expect("enrich");
    assert_eq!(summary.images_found, 2);
    assert_eq!(summary.images_processed, 1);
    assert_eq!(summary.skipped.len(), 1);
    assert!(summary.skipped[0].input.contains("banner.jpg"));
    assert_eq!(summary.detections, 1);
}

#[test]
fn one_failing_image_does_not_abort_the_stage() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());
    seed_image(&config, "2024-07-10", "chemed", "photo_1.jpg");
    seed_image(&config, "2024-07-10", "chemed", "photo_2.jpg");

    let mut detector = StubDetector {
        objects: vec![DetectedObject {
            class_id: 0,
            confidence: 0.8,
        }],
        fail_on: Some("photo_1"),
    };

    let summary = enrich_images(&config, &mut detector).expect("enrich");
    assert_eq!(summary.images_processed, 1);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.detections, 1);
    assert!(summary.artifact_written);
}

#[test]
fn zero_detections_leaves_the_prior_artifact_in_place() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());
    seed_image(&config, "2024-07-10", "chemed", "photo_9.jpg");

    fs::write(&config.ingest.detections_csv, "prior artifact").expect("seed artifact");

    let mut detector = StubDetector::returning(Vec::new());
    let summary = enrich_images(&config, &mut detector).expect("enrich");

    assert_eq!(summary.detections, 0);
    assert!(!summary.artifact_written);
    let artifact = fs::read_to_string(&config.ingest.detections_csv).expect("artifact");
    assert_eq!(artifact, "prior artifact");
}

#[test]
fn no_images_terminates_the_stage_quietly() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());

    let mut detector = StubDetector::returning(Vec::new());
    let summary = enrich_images(&config, &mut detector).expect("enrich");

    assert_eq!(summary.images_found, 0);
    assert!(!summary.artifact_written);
    assert!(!Path::new(&config.ingest.detections_csv).exists());
}

#[test]
fn unknown_class_indices_get_a_stable_fallback_label() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(dir.path());
    seed_image(&config, "2024-07-10", "chemed", "photo_5.jpg");

    let mut detector = StubDetector::returning(vec![DetectedObject {
        class_id: 99,
        confidence: 0.5,
    }]);

    enrich_images(&config, &mut detector).expect("enrich");
    let artifact = fs::read_to_string(&config.ingest.detections_csv).expect("artifact");
    assert!(artifact.contains(",class_99,"));
}
