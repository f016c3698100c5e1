//! Persistence sink capability.
//!
//! The pipeline hands finished rows to a [`RecordSink`]; where they end up
//! (a spreadsheet, CSV files, memory) is the implementation's concern.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::SinkError;
use crate::models::record::FieldValue;

/// One cell of a persisted row.
pub type SinkValue = FieldValue;

/// Append-only tabular store. Implementations must accept concurrent appends.
pub trait RecordSink: Send + Sync {
    /// Append one row of values to `collection`.
    fn append(&self, collection: &str, values: &[SinkValue]) -> Result<(), SinkError>;
}

impl<S: RecordSink + ?Sized> RecordSink for &S {
    fn append(&self, collection: &str, values: &[SinkValue]) -> Result<(), SinkError> {
        (**self).append(collection, values)
    }
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn append(&self, collection: &str, values: &[SinkValue]) -> Result<(), SinkError> {
        (**self).append(collection, values)
    }
}

/// In-memory sink, rows grouped by collection.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<BTreeMap<String, Vec<Vec<SinkValue>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows appended to `collection` so far.
    pub fn rows(&self, collection: &str) -> Vec<Vec<SinkValue>> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Names of collections that received rows.
    pub fn collections(&self) -> Vec<String> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

impl RecordSink for MemorySink {
    fn append(&self, collection: &str, values: &[SinkValue]) -> Result<(), SinkError> {
        let mut rows = self.rows.lock().map_err(|_| SinkError::Append {
            collection: collection.to_string(),
            reason: "sink lock poisoned".to_string(),
        })?;
        rows.entry(collection.to_string())
            .or_default()
            .push(values.to_vec());
        Ok(())
    }
}
