//! End-to-end structuring of one invoice image.

use std::time::{Duration, Instant};

use image::{DynamicImage, GenericImageView};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::error::{DegradedExtraction, Result};
use crate::imaging::{CellSegmenter, GridRecoverer, ImageNormalizer, decode};
use crate::invoice::{FieldExtractor, LineItemReconciler, RecordAssembler};
use crate::models::config::InvgridConfig;
use crate::models::record::{InvoiceRecord, ItemSource};
use crate::ocr::{RecognitionMode, Recognizer};
use crate::table::{CellReader, RowAssembler, text_grid};

/// Turns invoice images into [`InvoiceRecord`]s.
///
/// Holds no per-request state; one pipeline can serve many threads.
pub struct InvoicePipeline<R: Recognizer> {
    config: InvgridConfig,
    recognizer: R,
    normalizer: ImageNormalizer,
    grid: GridRecoverer,
    segmenter: CellSegmenter,
    rows: RowAssembler,
    fields: FieldExtractor,
    items: LineItemReconciler,
    pool: Option<ThreadPool>,
}

impl<R: Recognizer> InvoicePipeline<R> {
    /// Build a pipeline; invalid settings and rule patterns fail here.
    pub fn new(config: InvgridConfig, recognizer: R) -> Result<Self> {
        config.validate()?;
        let fields = FieldExtractor::from_config(&config.extraction)?;

        let pool = match ThreadPoolBuilder::new()
            .num_threads(config.ocr.workers)
            .thread_name(|i| format!("invgrid-ocr-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Failed to build OCR pool, cells run sequentially: {}", e);
                None
            }
        };

        info!(
            "Pipeline ready: recognizer={}, workers={}, layouts={:?}",
            recognizer.name(),
            config.ocr.workers,
            fields.book().layouts().collect::<Vec<_>>()
        );

        Ok(Self {
            normalizer: ImageNormalizer::from_config(&config.imaging),
            grid: GridRecoverer::new(&config.grid),
            segmenter: CellSegmenter::new(&config.cells),
            rows: RowAssembler::new(config.rows.row_height),
            items: LineItemReconciler::from_config(&config.extraction),
            fields,
            pool,
            config,
            recognizer,
        })
    }

    pub fn config(&self) -> &InvgridConfig {
        &self.config
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Decode and structure raw image bytes. Only decoding can fail.
    pub fn structure_invoice(&self, bytes: &[u8]) -> Result<InvoiceRecord> {
        let image = decode(bytes)?;
        Ok(self.structure_image(&image))
    }

    /// Structure a decoded image. Every failure past decoding degrades
    /// into warnings on the record.
    pub fn structure_image(&self, image: &DynamicImage) -> InvoiceRecord {
        let start = Instant::now();
        let deadline = self
            .config
            .ocr
            .timeout_ms
            .map(|ms| start + Duration::from_millis(ms));
        let (width, height) = image.dimensions();
        info!("Structuring {}x{} image", width, height);

        let mut assembler = RecordAssembler::new();

        // Header fields come first so a deadline never costs them.
        let page_text = match self.recognizer.recognize(image, RecognitionMode::Block) {
            Ok(text) => text,
            Err(e) => {
                warn!("Page recognition failed: {}", e);
                assembler.warn(DegradedExtraction::PageOcr(e.to_string()));
                String::new()
            }
        };
        debug!("Page text: {} chars", page_text.len());
        assembler = assembler.fields(&self.fields.extract(&page_text));

        let normalized = self.normalizer.normalize(image);
        let masks = self.grid.recover(&normalized.binary);

        let mut table = Vec::new();
        let mut cell_count = 0;

        if masks.is_empty() {
            warn!("{}", DegradedExtraction::EmptyContentMask);
            assembler.warn(DegradedExtraction::EmptyContentMask);
        } else {
            let segmentation = self.segmenter.segment(&masks.content);
            if segmentation.dropped > 0 {
                let diagnostic = DegradedExtraction::CellLimit {
                    dropped: segmentation.dropped,
                };
                warn!("{}", diagnostic);
                assembler.warn(diagnostic);
            }

            let batch = CellReader::new(&self.recognizer)
                .with_pool(self.pool.as_ref())
                .with_padding(self.config.cells.padding)
                .with_deadline(deadline)
                .read(&normalized.gray, &segmentation.boxes);

            if batch.timed_out {
                assembler.mark_partial();
            }
            assembler.warn_all(batch.diagnostics);

            cell_count = batch.cells.len();
            let rows = self.rows.assemble(batch.cells);
            table = text_grid(&rows);
            info!("Reconstructed table: {} rows, {} cells", table.len(), cell_count);
        }

        let reconciled = self.items.reconcile(&table);
        assembler.warn_all(reconciled.diagnostics);

        let (items, source) = if reconciled.items.is_empty() {
            (self.items.from_text(&page_text), ItemSource::Text)
        } else {
            (reconciled.items, ItemSource::Table)
        };

        assembler
            .table(table, cell_count)
            .items(items, source)
            .finish(Some(start.elapsed()))
    }

    /// Field extraction and text-line items over already recognized text.
    pub fn extract_from_text(&self, text: &str) -> InvoiceRecord {
        let start = Instant::now();
        let items = self.items.from_text(text);

        RecordAssembler::new()
            .fields(&self.fields.extract(text))
            .items(items, ItemSource::Text)
            .finish(Some(start.elapsed()))
    }
}
