//! Per-cell recognition on a bounded worker pool.

use std::time::Instant;

use image::{DynamicImage, GrayImage};
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, warn};

use super::rows::Cell;
use crate::error::DegradedExtraction;
use crate::imaging::BoundingBox;
use crate::ocr::{RecognitionMode, Recognizer};

/// Outcome of recognizing one box.
enum Outcome {
    Text(String),
    Failed(String),
    Skipped,
}

/// Cells read from one page.
#[derive(Debug, Default)]
pub struct CellBatch {
    /// Recognized cells, in box order.
    pub cells: Vec<Cell>,
    pub diagnostics: Vec<DegradedExtraction>,
    /// Set when the deadline stopped recognition early.
    pub timed_out: bool,
}

/// Crops each box from the page and runs single-line recognition.
pub struct CellReader<'a, R: Recognizer + ?Sized> {
    recognizer: &'a R,
    pool: Option<&'a ThreadPool>,
    padding: u32,
    deadline: Option<Instant>,
}

impl<'a, R: Recognizer + ?Sized> CellReader<'a, R> {
    pub fn new(recognizer: &'a R) -> Self {
        Self {
            recognizer,
            pool: None,
            padding: 0,
            deadline: None,
        }
    }

    /// Run recognition on `pool` instead of the calling thread.
    pub fn with_pool(mut self, pool: Option<&'a ThreadPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Stop issuing recognition calls after `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Recognize every box; results are matched back to boxes by index.
    pub fn read(&self, page: &GrayImage, boxes: &[BoundingBox]) -> CellBatch {
        let start = Instant::now();

        let outcomes: Vec<Outcome> = match self.pool {
            Some(pool) => pool.install(|| {
                boxes
                    .par_iter()
                    .map(|bbox| self.read_one(page, bbox))
                    .collect()
            }),
            None => boxes.iter().map(|bbox| self.read_one(page, bbox)).collect(),
        };

        let mut batch = CellBatch::default();
        let mut skipped = 0usize;

        for (index, (bbox, outcome)) in boxes.iter().zip(outcomes).enumerate() {
            match outcome {
                Outcome::Text(text) => batch.cells.push(Cell::new(*bbox, text)),
                Outcome::Failed(reason) => {
                    warn!("Cell {} recognition failed: {}", index, reason);
                    batch
                        .diagnostics
                        .push(DegradedExtraction::CellOcr { index, reason });
                }
                Outcome::Skipped => skipped += 1,
            }
        }

        if skipped > 0 {
            batch.timed_out = true;
            let recognized = boxes.len() - skipped;
            warn!(
                "Deadline reached: {} of {} cells recognized",
                recognized,
                boxes.len()
            );
            batch.diagnostics.push(DegradedExtraction::Deadline {
                recognized,
                total: boxes.len(),
            });
        }

        debug!(
            "Read {} cells in {}ms",
            batch.cells.len(),
            start.elapsed().as_millis()
        );

        batch
    }

    fn read_one(&self, page: &GrayImage, bbox: &BoundingBox) -> Outcome {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Outcome::Skipped;
        }

        let (width, height) = page.dimensions();
        let region = bbox.padded(self.padding, width, height);
        if region.width == 0 || region.height == 0 {
            return Outcome::Failed(format!("empty region {:?}", bbox));
        }

        let crop = image::imageops::crop_imm(page, region.x, region.y, region.width, region.height)
            .to_image();

        match self
            .recognizer
            .recognize(&DynamicImage::ImageLuma8(crop), RecognitionMode::SingleLine)
        {
            Ok(text) => Outcome::Text(text),
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::Luma;

    use super::*;
    use crate::error::OcrError;
    use crate::ocr::testing::ScriptedRecognizer;

    fn page() -> (GrayImage, Vec<BoundingBox>) {
        let mut img = GrayImage::from_pixel(200, 60, Luma([255]));
        let boxes = vec![
            BoundingBox::new(10, 10, 40, 20),
            BoundingBox::new(80, 10, 40, 20),
            BoundingBox::new(150, 10, 40, 20),
        ];
        for (i, b) in boxes.iter().enumerate() {
            for y in b.y..b.bottom() {
                for x in b.x..b.right() {
                    img.put_pixel(x, y, Luma([10 + i as u8 * 10]));
                }
            }
        }
        (img, boxes)
    }

    #[test]
    fn test_pool_results_keep_box_order() {
        let (img, boxes) = page();
        let recognizer = ScriptedRecognizer::new("")
            .with_cell(10, "1")
            .with_cell(20, "Bread")
            .with_cell(30, "2.00");
        let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap();

        let batch = CellReader::new(&recognizer)
            .with_pool(Some(&pool))
            .with_padding(2)
            .read(&img, &boxes);

        let texts: Vec<_> = batch.cells.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "Bread", "2.00"]);
        assert_eq!(batch.cells[1].bbox, boxes[1]);
        assert!(!batch.timed_out);
    }

    #[test]
    fn test_expired_deadline_skips_all_cells() {
        let (img, boxes) = page();
        let recognizer = ScriptedRecognizer::new("");
        let deadline = Instant::now() - Duration::from_millis(1);

        let batch = CellReader::new(&recognizer)
            .with_deadline(Some(deadline))
            .read(&img, &boxes);

        assert!(batch.cells.is_empty());
        assert!(batch.timed_out);
        assert_eq!(recognizer.cell_calls(), 0);
        assert_eq!(
            batch.diagnostics,
            vec![DegradedExtraction::Deadline {
                recognized: 0,
                total: 3
            }]
        );
    }

    struct FailingRecognizer;

    impl Recognizer for FailingRecognizer {
        fn recognize(&self, _: &DynamicImage, _: RecognitionMode) -> Result<String, OcrError> {
            Err(OcrError::Recognition("boom".to_string()))
        }
    }

    #[test]
    fn test_failed_cells_become_diagnostics() {
        let (img, boxes) = page();
        let batch = CellReader::new(&FailingRecognizer).read(&img, &boxes);

        assert!(batch.cells.is_empty());
        assert_eq!(batch.diagnostics.len(), 3);
        assert!(!batch.timed_out);
    }
}
