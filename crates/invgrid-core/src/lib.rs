//! Core library for structuring invoice images.
//!
//! This crate provides:
//! - Image normalization and table grid recovery (rule-line isolation)
//! - Cell segmentation, per-cell OCR orchestration and row assembly
//! - Data-driven field extraction with typed coercion and sentinels
//! - Line-item reconciliation and record assembly
//!
//! OCR and persistence are capabilities supplied by the caller through
//! [`Recognizer`] and [`RecordSink`].

pub mod error;
pub mod imaging;
pub mod invoice;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod sink;
pub mod table;

pub use error::{DecodeError, DegradedExtraction, InvgridError, OcrError, Result, SinkError};
pub use imaging::BoundingBox;
pub use invoice::{RuleBook, RuleSpec, persist};
pub use models::config::InvgridConfig;
pub use models::record::{FieldKey, FieldValue, InvoiceRecord, LineItem, NOT_AVAILABLE};
pub use ocr::{RecognitionMode, Recognizer, StaticTextRecognizer};
#[cfg(feature = "native")]
pub use ocr::{PureOcrEngine, create_engine_from_dir};
pub use pipeline::InvoicePipeline;
pub use sink::{MemorySink, RecordSink, SinkValue};
pub use table::{Cell, Row};
