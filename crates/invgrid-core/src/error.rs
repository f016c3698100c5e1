//! Error types for the invgrid-core library.

use thiserror::Error;

/// Main error type for the invgrid library.
#[derive(Error, Debug)]
pub enum InvgridError {
    /// The input could not be decoded into pixels.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// OCR capability error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persistence sink error.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal input errors, raised before the pipeline starts.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The bytes are not a supported image format.
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    /// The image decoded but has no pixels.
    #[error("image has zero size ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// Errors reported by an OCR capability.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image region.
    #[error("invalid region: {0}")]
    InvalidRegion(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field rule pattern failed to compile.
    #[error("invalid pattern for {label}: {source}")]
    Pattern {
        label: String,
        #[source]
        source: regex::Error,
    },

    /// A field rule names a field that is not part of the record.
    #[error("unknown field label: {0}")]
    UnknownField(String),

    /// The requested rule table does not exist.
    #[error("unknown layout: {0}")]
    UnknownLayout(String),

    /// A numeric setting is out of range.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by a persistence sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The collection could not be written.
    #[error("failed to append to {collection}: {reason}")]
    Append { collection: String, reason: String },

    /// I/O failure in a file-backed sink.
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Diagnostic for non-fatal, partial extraction.
///
/// These never abort a request; they are collected into the record
/// metadata so callers can see what was skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DegradedExtraction {
    /// Whole-page recognition failed, header fields fall back to defaults.
    #[error("page recognition failed: {0}")]
    PageOcr(String),

    /// No content regions survived line removal, table path skipped.
    #[error("no table content found, table reconstruction skipped")]
    EmptyContentMask,

    /// Recognition of a single cell failed.
    #[error("cell {index} recognition failed: {reason}")]
    CellOcr { index: usize, reason: String },

    /// Too many candidate cells, the rest were dropped.
    #[error("cell limit reached, dropped {dropped} candidate cells")]
    CellLimit { dropped: usize },

    /// The deadline passed before all cells were recognized.
    #[error("deadline reached after {recognized} of {total} cells")]
    Deadline { recognized: usize, total: usize },

    /// A row looked like an item but a required field was unusable.
    #[error("skipped malformed item row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
}

/// A matched field value that could not be cast to the rule's type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot coerce {value:?} for {label}")]
pub struct CoercionFailure {
    pub label: String,
    pub value: String,
}

/// Result type for the invgrid library.
pub type Result<T> = std::result::Result<T, InvgridError>;
