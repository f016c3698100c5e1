//! Recognizer backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::{ModelConfig, OcrConfig};

use super::{RecognitionMode, Recognizer};

/// OCR engine backed by `pure-onnx-ocr`.
pub struct PureOcrEngine {
    // pure-onnx-ocr makes no Sync promise for OcrEngine, so recognition
    // calls are serialized here and the recognizer stays Send + Sync.
    engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
    keep_unk: bool,
}

/// A recognized fragment with its axis-aligned position.
struct Fragment {
    x: f32,
    y: f32,
    text: String,
}

impl PureOcrEngine {
    /// Create an engine from model files in a directory.
    pub fn from_dir(model_dir: &Path, models: &ModelConfig, config: &OcrConfig) -> Result<Self, OcrError> {
        let det_path = model_dir.join(&models.detection_model);
        let rec_path = model_dir.join(&models.recognition_model);
        let dict_path = model_dir.join(&models.dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!("missing {}", path.display())));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());

        Ok(Self {
            engine: Mutex::new(engine),
            keep_unk: config.keep_unk,
        })
    }

    fn run(&self, image: &DynamicImage) -> Result<Vec<Fragment>, OcrError> {
        let engine = self
            .engine
            .lock()
            .map_err(|_| OcrError::Recognition("engine lock poisoned".to_string()))?;

        let results = engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        Ok(results
            .iter()
            .map(|r| {
                let (x, y) = polygon_origin(&r.bounding_box);
                let text = if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                Fragment { x, y, text }
            })
            .collect())
    }
}

impl Recognizer for PureOcrEngine {
    fn recognize(&self, region: &DynamicImage, mode: RecognitionMode) -> Result<String, OcrError> {
        let start = Instant::now();
        let (width, height) = region.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidRegion(format!("{}x{}", width, height)));
        }

        let mut fragments = self.run(region)?;

        let text = match mode {
            RecognitionMode::SingleLine => {
                fragments.sort_by(|a, b| a.x.total_cmp(&b.x));
                fragments
                    .iter()
                    .map(|f| f.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            RecognitionMode::Block => {
                // Sort by reading order
                fragments.sort_by(|a, b| {
                    let row_a = (a.y / 20.0) as i32;
                    let row_b = (b.y / 20.0) as i32;
                    row_a.cmp(&row_b).then(a.x.total_cmp(&b.x))
                });
                join_lines(&fragments)
            }
        };

        debug!(
            "pure-onnx-ocr {:?} on {}x{}: {} fragments in {}ms",
            mode,
            width,
            height,
            fragments.len(),
            start.elapsed().as_millis()
        );

        Ok(text)
    }

    fn name(&self) -> &str {
        "pure-onnx-ocr"
    }
}

/// Create a recognizer from the configured model directory.
pub fn create_engine_from_dir(
    model_dir: &Path,
    models: &ModelConfig,
    config: &OcrConfig,
) -> Result<PureOcrEngine, OcrError> {
    PureOcrEngine::from_dir(model_dir, models, config)
}

/// Join fragments on the same visual line with spaces, lines with newlines.
fn join_lines(fragments: &[Fragment]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current_row = i32::MIN;

    for fragment in fragments {
        let row = (fragment.y / 20.0) as i32;
        match lines.last_mut() {
            Some(line) if row == current_row => {
                line.push(' ');
                line.push_str(fragment.text.trim());
            }
            _ => {
                lines.push(fragment.text.trim().to_string());
                current_row = row;
            }
        }
    }

    lines.join("\n")
}

/// Top-left corner of a detection polygon.
fn polygon_origin(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32) {
    polygon
        .exterior()
        .coords()
        .take(4)
        .fold((f32::INFINITY, f32::INFINITY), |(x, y), c| {
            (x.min(c.x as f32), y.min(c.y as f32))
        })
}
