//! OCR capability consumed by the pipeline.
//!
//! Recognition itself is external: the pipeline only needs something that
//! turns an image region into text. A `pure-onnx-ocr` backed implementation
//! is available with the `native` feature.

#[cfg(feature = "native")]
mod pure_engine;

#[cfg(feature = "native")]
pub use pure_engine::{PureOcrEngine, create_engine_from_dir};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// How the recognizer should treat the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMode {
    /// The region holds one line of text (a table cell).
    SingleLine,
    /// The region is a block of text (a whole page).
    Block,
}

/// Black-box text recognition.
pub trait Recognizer: Send + Sync {
    /// Recognize the text in `region`.
    fn recognize(&self, region: &DynamicImage, mode: RecognitionMode) -> Result<String, OcrError>;

    /// Engine name recorded in diagnostics.
    fn name(&self) -> &str {
        "unknown"
    }
}

impl<R: Recognizer + ?Sized> Recognizer for &R {
    fn recognize(&self, region: &DynamicImage, mode: RecognitionMode) -> Result<String, OcrError> {
        (**self).recognize(region, mode)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<R: Recognizer + ?Sized> Recognizer for Box<R> {
    fn recognize(&self, region: &DynamicImage, mode: RecognitionMode) -> Result<String, OcrError> {
        (**self).recognize(region, mode)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Recognizer that returns fixed page text and no cell text.
///
/// Used when the page text is already known, e.g. from a sidecar file.
#[derive(Debug, Clone, Default)]
pub struct StaticTextRecognizer {
    page_text: String,
}

impl StaticTextRecognizer {
    pub fn new(page_text: impl Into<String>) -> Self {
        Self {
            page_text: page_text.into(),
        }
    }
}

impl Recognizer for StaticTextRecognizer {
    fn recognize(&self, _region: &DynamicImage, mode: RecognitionMode) -> Result<String, OcrError> {
        match mode {
            RecognitionMode::Block => Ok(self.page_text.clone()),
            RecognitionMode::SingleLine => Ok(String::new()),
        }
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic recognizer for pipeline tests.
    //!
    //! Test images draw each cell as a solid block with a unique gray level;
    //! the darkest pixel in a cropped region identifies which cell it is.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    pub struct ScriptedRecognizer {
        pub page_text: String,
        pub cells: HashMap<u8, String>,
        pub fail_page: bool,
        pub calls: AtomicUsize,
    }

    impl ScriptedRecognizer {
        pub fn new(page_text: &str) -> Self {
            Self {
                page_text: page_text.to_string(),
                cells: HashMap::new(),
                fail_page: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_cell(mut self, level: u8, text: &str) -> Self {
            self.cells.insert(level, text.to_string());
            self
        }

        pub fn failing_page(mut self) -> Self {
            self.fail_page = true;
            self
        }

        pub fn cell_calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Recognizer for ScriptedRecognizer {
        fn recognize(&self, region: &DynamicImage, mode: RecognitionMode) -> Result<String, OcrError> {
            match mode {
                RecognitionMode::Block if self.fail_page => {
                    Err(OcrError::Recognition("scripted failure".to_string()))
                }
                RecognitionMode::Block => Ok(self.page_text.clone()),
                RecognitionMode::SingleLine => {
                    self.calls.fetch_add(1, Ordering::SeqCst);
                    let darkest = region.to_luma8().pixels().map(|p| p.0[0]).min().unwrap_or(255);
                    Ok(self.cells.get(&darkest).cloned().unwrap_or_default())
                }
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
