//! Configuration structures for the structuring pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, InvgridError};
use crate::invoice::rules::RuleSpec;

/// Main configuration for the invgrid pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvgridConfig {
    /// Image normalization.
    pub imaging: ImagingConfig,

    /// Structural line isolation.
    pub grid: GridConfig,

    /// Cell segmentation.
    pub cells: CellConfig,

    /// Row assembly.
    pub rows: RowConfig,

    /// OCR orchestration.
    pub ocr: OcrConfig,

    /// Field and line-item extraction.
    pub extraction: ExtractionConfig,

    /// Persistence sink collections.
    pub sink: SinkConfig,

    /// OCR model files.
    pub models: ModelConfig,
}

/// How the smoothed grayscale image is turned into a binary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Binarization {
    /// Global Otsu threshold.
    Otsu,
    /// Local mean threshold over a square block.
    Adaptive { block_radius: u32 },
}

/// Image normalizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingConfig {
    /// Gaussian blur sigma applied before binarization (<= 0 disables).
    pub blur_sigma: f32,

    /// Binarization mode.
    pub binarization: Binarization,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            binarization: Binarization::Otsu,
        }
    }
}

/// Grid recoverer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Line element length is the image dimension divided by this.
    pub line_scale: u32,

    /// Lower bound on the line element length in pixels.
    pub min_line_length: u32,

    /// Dilation radius applied to the line mask before subtraction.
    pub line_dilation: u8,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            line_scale: 40,
            min_line_length: 10,
            line_dilation: 1,
        }
    }
}

/// Cell segmenter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    /// Minimum cell width in pixels (exclusive).
    pub min_width: u32,

    /// Minimum cell height in pixels (exclusive).
    pub min_height: u32,

    /// Horizontal background gaps up to this width are closed before tracing.
    pub merge_gap_x: u32,

    /// Vertical background gaps up to this height are closed before tracing.
    pub merge_gap_y: u32,

    /// Padding added around each box when cropping for OCR.
    pub padding: u32,

    /// Upper bound on OCR calls per image.
    pub max_cells: usize,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            min_width: 30,
            min_height: 15,
            merge_gap_x: 12,
            merge_gap_y: 3,
            padding: 2,
            max_cells: 400,
        }
    }
}

/// Row assembler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RowConfig {
    /// Quantization bucket height for row keys, in pixels.
    pub row_height: u32,
}

impl Default for RowConfig {
    fn default() -> Self {
        Self { row_height: 20 }
    }
}

/// OCR orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Worker threads for per-cell recognition.
    pub workers: usize,

    /// Overall deadline for one invocation, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Keep `[UNK]` tokens emitted by the recognizer.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout_ms: None,
            keep_unk: false,
        }
    }
}

/// Extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Rule table to use, or `auto` to infer it from the page text.
    pub layout: String,

    /// Table used when inference finds no signal.
    pub default_layout: String,

    /// Keywords that mark a table row as a line item.
    pub item_keywords: Vec<String>,

    /// Unit tokens recognized in item rows.
    pub unit_tokens: Vec<String>,

    /// Extra or replacement rule tables keyed by layout name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rule_tables: BTreeMap<String, Vec<RuleSpec>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            layout: "auto".to_string(),
            default_layout: "en".to_string(),
            item_keywords: [
                "bread", "buns", "burger", "cake", "roll", "toast", "croissant", "baguette",
                "muffin", "cheese",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            unit_tokens: [
                "pcs", "pc", "kg", "g", "box", "ctn", "pack", "pkt", "bag", "tray", "each", "ea",
                "unit", "szt", "l",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            rule_tables: BTreeMap::new(),
        }
    }
}

/// Persistence sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Append records to the sink at all.
    pub enabled: bool,

    /// Collection receiving one header row per invoice.
    pub header_collection: String,

    /// Collection receiving one row per line item.
    pub items_collection: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_collection: "Sheet1".to_string(),
            items_collection: "Sheet2".to_string(),
        }
    }
}

/// Model file paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
        }
    }
}

impl InvgridConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, InvgridError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), InvgridError> {
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Parse)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check settings that would make a stage divide by zero or spin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, reason: &str| ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if self.rows.row_height == 0 {
            return Err(invalid("rows.row_height", "must be positive"));
        }
        if self.grid.line_scale == 0 {
            return Err(invalid("grid.line_scale", "must be positive"));
        }
        if self.ocr.workers == 0 {
            return Err(invalid("ocr.workers", "must be positive"));
        }
        if let Binarization::Adaptive { block_radius: 0 } = self.imaging.binarization {
            return Err(invalid("imaging.binarization.block_radius", "must be positive"));
        }
        Ok(())
    }

    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models.model_dir.join(model_name)
    }
}
