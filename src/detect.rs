//! Object detection model boundary.
//!
//! The pipeline treats the model as an opaque function from an image to a
//! list of (class, confidence) pairs, expressed by [`ObjectDetector`]. The
//! production implementation runs a YOLO-family ONNX export through ONNX
//! Runtime; tests substitute a stub.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use tracing::{debug, info, warn};

use crate::config::DetectionConfig;
use crate::error::{PipelineError, Result};

/// Model input edge length used when the graph does not fix one.
const INPUT_SIZE: u32 = 640;
/// Overlap threshold above which two same-class boxes are considered one.
const IOU_THRESHOLD: f32 = 0.45;

/// One detected object in an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedObject {
    /// Index into the model's class label table
    pub class_id: usize,
    /// Model confidence in [0, 1]
    pub confidence: f32,
}

/// Opaque detection model: image in, scored classes out.
pub trait ObjectDetector {
    /// Run the model on one image.
    fn detect(&mut self, image_path: &Path) -> Result<Vec<DetectedObject>>;

    /// Resolve a class index through the model's label table.
    fn class_name(&self, class_id: usize) -> Option<&str>;
}

/// YOLO-family detector over ONNX Runtime.
pub struct YoloDetector {
    session: Session,
    input_name: String,
    output_name: String,
    labels: Vec<String>,
    confidence_threshold: f32,
}

impl YoloDetector {
    /// Build a session from the configured model weights.
    ///
    /// Missing weights are a configuration error at stage entry, not a
    /// per-image failure.
    pub fn from_config(config: &DetectionConfig) -> Result<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(PipelineError::InvalidConfig(format!(
                "Model weights not found: {}",
                model_path.display()
            )));
        }

        ort::init()
            .with_name("telegram-analytics")
            .commit()
            .map_err(|e| PipelineError::Detection(format!("Failed to init ONNX Runtime: {e}")))?;

        let session = Session::builder()
            .map_err(|e| PipelineError::Detection(format!("{e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level1)
            .map_err(|e| PipelineError::Detection(format!("{e}")))?
            .with_parallel_execution(false)
            .map_err(|e| PipelineError::Detection(format!("{e}")))?
            .commit_from_file(model_path)
            .map_err(|e| PipelineError::Detection(format!("{e}")))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "images".to_string());
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "output0".to_string());

        let labels = load_labels(model_path, config.labels_path.as_deref());
        info!(
            "Loaded detection model {} ({} classes)",
            model_path.display(),
            labels.len()
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            labels,
            confidence_threshold: config.confidence_threshold as f32,
        })
    }
}

impl ObjectDetector for YoloDetector {
    fn detect(&mut self, image_path: &Path) -> Result<Vec<DetectedObject>> {
        let img = image::open(image_path)
            .map_err(|e| PipelineError::Detection(format!("{}: {e}", image_path.display())))?;
        let resized = img
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
            .to_rgb8();

        let size = INPUT_SIZE as usize;
        let mut input = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                input[[0, channel, y as usize, x as usize]] =
                    f32::from(pixel[channel]) / 255.0;
            }
        }

        let tensor = TensorRef::from_array_view(&input)
            .map_err(|e| PipelineError::Detection(format!("Invalid input tensor: {e}")))?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| PipelineError::Detection(format!("Model run failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            PipelineError::Detection(format!("Model output {:?} missing", self.output_name))
        })?;
        let view = output
            .try_extract_array::<f32>()
            .map_err(|e| PipelineError::Detection(format!("Output extraction failed: {e}")))?;

        let shape = view.shape().to_vec();
        let data: Vec<f32> = view.iter().copied().collect();
        let candidates = postprocess(&shape, &data, self.confidence_threshold)?;
        let kept = non_max_suppression(candidates, IOU_THRESHOLD);

        Ok(kept
            .into_iter()
            .map(|c| DetectedObject {
                class_id: c.class_id,
                confidence: c.confidence.clamp(0.0, 1.0),
            })
            .collect())
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }
}

/// A thresholded box before non-maximum suppression.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    class_id: usize,
    confidence: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

/// Decode a YOLO `[1, 4 + classes, anchors]` output into thresholded boxes.
fn postprocess(shape: &[usize], data: &[f32], threshold: f32) -> Result<Vec<Candidate>> {
    if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
        return Err(PipelineError::Detection(format!(
            "Unexpected model output shape {shape:?}"
        )));
    }
    let attrs = shape[1];
    let anchors = shape[2];
    let classes = attrs - 4;
    if data.len() != attrs * anchors {
        return Err(PipelineError::Detection(format!(
            "Output data length {} does not match shape {shape:?}",
            data.len()
        )));
    }

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let mut best_class = 0;
        let mut best_score = 0.0_f32;
        for class in 0..classes {
            let score = data[(4 + class) * anchors + anchor];
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        if best_score < threshold {
            continue;
        }

        let cx = data[anchor];
        let cy = data[anchors + anchor];
        let w = data[2 * anchors + anchor];
        let h = data[3 * anchors + anchor];
        candidates.push(Candidate {
            class_id: best_class,
            confidence: best_score,
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        });
    }
    Ok(candidates)
}

/// Greedy class-wise non-maximum suppression, highest confidence first.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<Candidate> = Vec::new();
    'next: for candidate in candidates {
        for existing in &kept {
            if existing.class_id == candidate.class_id
                && iou(existing, &candidate) > iou_threshold
            {
                continue 'next;
            }
        }
        kept.push(candidate);
    }
    kept
}

fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let ix = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let iy = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let intersection = ix * iy;
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Resolve the class label table.
///
/// Precedence: explicit config path, then the model's `.labels.txt` sidecar,
/// then the built-in COCO table the stock YOLO exports ship with.
fn load_labels(model_path: &Path, explicit: Option<&str>) -> Vec<String> {
    if let Some(path) = explicit {
        if let Some(labels) = read_label_file(Path::new(path)) {
            return labels;
        }
        warn!("Configured labels file {path} unreadable; falling back");
    }

    let sidecar = model_path.with_extension("labels.txt");
    if let Some(labels) = read_label_file(&sidecar) {
        debug!("Loaded labels sidecar {}", sidecar.display());
        return labels;
    }

    debug!("No labels sidecar; using built-in COCO table");
    COCO_LABELS.iter().map(|s| (*s).to_string()).collect()
}

fn read_label_file(path: &Path) -> Option<Vec<String>> {
    let contents = fs::read_to_string(path).ok()?;
    let labels: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect();
    if labels.is_empty() {
        None
    } else {
        Some(labels)
    }
}

/// COCO class table, in the order stock YOLO exports use.
const COCO_LABELS: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a `[1, 4 + classes, anchors]` output buffer from (bbox, scores)
    /// columns.
    fn output_from_columns(classes: usize, columns: &[([f32; 4], Vec<f32>)]) -> (Vec<usize>, Vec<f32>) {
        let anchors = columns.len();
        let attrs = 4 + classes;
        let mut data = vec![0.0; attrs * anchors];
        for (anchor, (bbox, scores)) in columns.iter().enumerate() {
            for (row, value) in bbox.iter().enumerate() {
                data[row * anchors + anchor] = *value;
            }
            for (class, score) in scores.iter().enumerate() {
                data[(4 + class) * anchors + anchor] = *score;
            }
        }
        (vec![1, attrs, anchors], data)
    }

    #[test]
    fn postprocess_keeps_boxes_above_threshold() {
        let (shape, data) = output_from_columns(
            2,
            &[
                ([100.0, 100.0, 50.0, 50.0], vec![0.9, 0.1]),
                ([400.0, 400.0, 50.0, 50.0], vec![0.05, 0.1]),
            ],
        );
        let candidates = postprocess(&shape, &data, 0.25).expect("valid output");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_id, 0);
        assert!((candidates[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn postprocess_rejects_unexpected_shape() {
        let err = postprocess(&[1, 3], &[0.0; 3], 0.25);
        assert!(err.is_err());
    }

    #[test]
    fn nms_merges_overlapping_same_class_boxes() {
        let (shape, data) = output_from_columns(
            1,
            &[
                ([100.0, 100.0, 50.0, 50.0], vec![0.9]),
                ([102.0, 101.0, 50.0, 50.0], vec![0.7]),
                ([400.0, 400.0, 50.0, 50.0], vec![0.8]),
            ],
        );
        let candidates = postprocess(&shape, &data, 0.25).expect("valid output");
        let kept = non_max_suppression(candidates, IOU_THRESHOLD);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn nms_keeps_overlapping_boxes_of_different_classes() {
        let (shape, data) = output_from_columns(
            2,
            &[
                ([100.0, 100.0, 50.0, 50.0], vec![0.9, 0.0]),
                ([101.0, 100.0, 50.0, 50.0], vec![0.0, 0.8]),
            ],
        );
        let candidates = postprocess(&shape, &data, 0.25).expect("valid output");
        let kept = non_max_suppression(candidates, IOU_THRESHOLD);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn builtin_label_table_resolves_classes() {
        let labels = load_labels(Path::new("missing/model.onnx"), None);
        assert_eq!(labels.len(), 80);
        assert_eq!(labels[0], "person");
        assert_eq!(labels[2], "car");
    }
}
