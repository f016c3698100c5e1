//! Header and summary field extraction over whole-page text.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info};

use super::rules::RuleBook;
use crate::error::ConfigError;
use crate::models::config::ExtractionConfig;
use crate::models::record::{FieldKey, FieldValue, InvoiceRecord};

/// Field values found on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    /// Rule table that produced the values.
    pub layout: String,
    /// One entry per field; unmatched fields hold the sentinel.
    pub values: BTreeMap<FieldKey, FieldValue>,
}

impl ExtractedFields {
    /// All fields missing, under `layout`.
    pub fn empty(layout: &str) -> Self {
        Self {
            layout: layout.to_string(),
            values: FieldKey::ALL
                .into_iter()
                .map(|k| (k, FieldValue::Missing))
                .collect(),
        }
    }

    pub fn get(&self, key: FieldKey) -> &FieldValue {
        self.values.get(&key).unwrap_or(&FieldValue::Missing)
    }

    /// Number of fields with a value.
    pub fn found(&self) -> usize {
        self.values.values().filter(|v| !v.is_missing()).count()
    }

    /// Copy every value into the record.
    pub fn apply_to(&self, record: &mut InvoiceRecord) {
        for (key, value) in &self.values {
            record.set_field(*key, value.clone());
        }
        record.metadata.layout = self.layout.clone();
    }
}

/// Runs the selected rule table against page text.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    book: RuleBook,
}

impl FieldExtractor {
    pub fn new(book: RuleBook) -> Self {
        Self { book }
    }

    /// Build from configuration; pattern errors surface here.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(RuleBook::from_config(config)?))
    }

    pub fn book(&self) -> &RuleBook {
        &self.book
    }

    /// Extract every field. Never fails; empty text yields all sentinels.
    pub fn extract(&self, text: &str) -> ExtractedFields {
        let start = Instant::now();

        let Some(table) = self.book.select(text) else {
            return ExtractedFields::empty("none");
        };

        let fields = ExtractedFields {
            layout: table.name().to_string(),
            values: table.apply(text),
        };

        info!(
            "Extracted {}/{} fields with layout {}",
            fields.found(),
            FieldKey::ALL.len(),
            fields.layout
        );
        debug!("Field extraction took {:?}", start.elapsed());

        fields
    }
}
