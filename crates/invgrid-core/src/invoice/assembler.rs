//! Record assembly and persistence.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::fields::ExtractedFields;
use crate::error::{DegradedExtraction, SinkError};
use crate::models::config::SinkConfig;
use crate::models::record::{FieldKey, FieldValue, InvoiceRecord, ItemSource, LineItem};
use crate::sink::{RecordSink, SinkValue};

/// Collects stage outputs into one [`InvoiceRecord`].
#[derive(Debug, Default)]
pub struct RecordAssembler {
    record: InvoiceRecord,
    warnings: Vec<DegradedExtraction>,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(mut self, fields: &ExtractedFields) -> Self {
        fields.apply_to(&mut self.record);
        self
    }

    /// Reconstructed grid and the number of cells it was built from.
    pub fn table(mut self, table: Vec<Vec<String>>, cell_count: usize) -> Self {
        self.record.table = table;
        self.record.metadata.cell_count = cell_count;
        self
    }

    pub fn items(mut self, items: Vec<LineItem>, source: ItemSource) -> Self {
        self.record.metadata.item_source = if items.is_empty() {
            ItemSource::None
        } else {
            source
        };
        self.record.items = items;
        self
    }

    pub fn warn(&mut self, diagnostic: DegradedExtraction) {
        self.warnings.push(diagnostic);
    }

    pub fn warn_all(&mut self, diagnostics: impl IntoIterator<Item = DegradedExtraction>) {
        self.warnings.extend(diagnostics);
    }

    pub fn mark_partial(&mut self) {
        self.record.metadata.partial = true;
    }

    pub fn warnings(&self) -> &[DegradedExtraction] {
        &self.warnings
    }

    pub fn finish(mut self, elapsed: Option<Duration>) -> InvoiceRecord {
        self.record.metadata.warnings = self.warnings.iter().map(|w| w.to_string()).collect();
        self.record.metadata.processing_time_ms = elapsed.map(|d| d.as_millis() as u64);

        info!(
            "Assembled record: {} items, {} missing fields, {} warnings{}",
            self.record.items.len(),
            self.record.missing_fields().len(),
            self.warnings.len(),
            if self.record.metadata.partial { " (partial)" } else { "" }
        );

        self.record
    }
}

/// Header row in collection column order.
pub fn header_row(record: &InvoiceRecord) -> Vec<SinkValue> {
    FieldKey::ALL
        .into_iter()
        .map(|k| record.field(k).clone())
        .collect()
}

/// One row per item, prefixed by the invoice number.
pub fn item_rows(record: &InvoiceRecord) -> Vec<Vec<SinkValue>> {
    record
        .items
        .iter()
        .map(|item| {
            vec![
                record.header.invoice_number.clone(),
                FieldValue::Text(item.item_no.clone()),
                FieldValue::Text(item.name.clone()),
                FieldValue::Number(item.quantity),
                FieldValue::Text(item.unit.clone()),
                FieldValue::Number(item.unit_price),
                FieldValue::Number(item.total_price),
            ]
        })
        .collect()
}

/// What [`persist`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub header_written: bool,
    pub items_written: usize,
}

/// Append a record to the sink.
///
/// The header row is only written when the invoice number was found.
/// Items are always written, linked by the invoice number (or `N/A`).
pub fn persist<S: RecordSink + ?Sized>(
    record: &InvoiceRecord,
    sink: &S,
    config: &SinkConfig,
) -> Result<PersistSummary, SinkError> {
    let mut summary = PersistSummary::default();
    if !config.enabled {
        debug!("Sink disabled, nothing persisted");
        return Ok(summary);
    }

    if record.is_persistable() {
        sink.append(&config.header_collection, &header_row(record))?;
        summary.header_written = true;
    } else {
        warn!(
            "Skipping {} append: missing {}",
            config.header_collection,
            FieldKey::InvoiceNumber.label()
        );
    }

    for row in item_rows(record) {
        sink.append(&config.items_collection, &row)?;
        summary.items_written += 1;
    }

    if summary.items_written == 0 {
        debug!("No items for {}", config.items_collection);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn record_with_item(invoice_no: Option<&str>) -> InvoiceRecord {
        let mut fields = ExtractedFields::empty("en");
        if let Some(no) = invoice_no {
            fields.values.insert(FieldKey::InvoiceNumber, no.into());
        }
        fields.values.insert(
            FieldKey::Total,
            FieldValue::Number(Decimal::from_str("7.00").unwrap()),
        );

        let item = LineItem {
            item_no: "1".to_string(),
            name: "Cheese Burger".to_string(),
            quantity: Decimal::from(2),
            unit: "pcs".to_string(),
            unit_price: Decimal::from_str("3.50").unwrap(),
            total_price: Decimal::from_str("7.00").unwrap(),
        };

        RecordAssembler::new()
            .fields(&fields)
            .items(vec![item], ItemSource::Table)
            .finish(None)
    }

    #[test]
    fn test_header_row_order() {
        let record = record_with_item(Some("4021"));
        let row = header_row(&record);

        assert_eq!(row.len(), 11);
        assert_eq!(row[0], FieldValue::Text("4021".to_string()));
        assert_eq!(row[6].display(), "7.00");
        assert!(row[10].is_missing());
    }

    #[test]
    fn test_header_row_follows_field_key_order() {
        let record = record_with_item(Some("4021"));
        let row = header_row(&record);

        assert_eq!(row.len(), FieldKey::ALL.len());
        for (value, key) in row.iter().zip(FieldKey::ALL) {
            assert_eq!(value, record.field(key), "{}", key.label());
        }
    }

    #[test]
    fn test_persist_writes_header_and_items() {
        let sink = MemorySink::new();
        let record = record_with_item(Some("4021"));

        let summary = persist(&record, &sink, &SinkConfig::default()).unwrap();
        assert_eq!(
            summary,
            PersistSummary {
                header_written: true,
                items_written: 1
            }
        );

        let items = sink.rows("Sheet2");
        assert_eq!(items[0][0], FieldValue::Text("4021".to_string()));
        assert_eq!(items[0][2], FieldValue::Text("Cheese Burger".to_string()));
        assert_eq!(items[0][5].display(), "3.50");
    }

    #[test]
    fn test_persist_skips_header_without_invoice_number() {
        let sink = MemorySink::new();
        let record = record_with_item(None);

        let summary = persist(&record, &sink, &SinkConfig::default()).unwrap();
        assert!(!summary.header_written);
        assert!(sink.rows("Sheet1").is_empty());
        assert_eq!(sink.rows("Sheet2")[0][0], FieldValue::Missing);
    }

    #[test]
    fn test_disabled_sink_writes_nothing() {
        let sink = MemorySink::new();
        let config = SinkConfig {
            enabled: false,
            ..SinkConfig::default()
        };
        persist(&record_with_item(Some("1")), &sink, &config).unwrap();
        assert!(sink.collections().is_empty());
    }

    struct BrokenSink;

    impl RecordSink for BrokenSink {
        fn append(&self, collection: &str, _: &[SinkValue]) -> Result<(), SinkError> {
            Err(SinkError::Append {
                collection: collection.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    #[test]
    fn test_sink_failure_leaves_record_intact() {
        let record = record_with_item(Some("4021"));
        let err = persist(&record, &BrokenSink, &SinkConfig::default());

        assert!(matches!(err, Err(SinkError::Append { .. })));
        assert_eq!(record.items.len(), 1);
    }

    #[test]
    fn test_warnings_are_recorded() {
        let mut assembler = RecordAssembler::new();
        assembler.warn(DegradedExtraction::EmptyContentMask);
        assembler.mark_partial();
        let record = assembler.finish(Some(Duration::from_millis(12)));

        assert!(record.metadata.partial);
        assert_eq!(record.metadata.warnings.len(), 1);
        assert_eq!(record.metadata.processing_time_ms, Some(12));
        assert_eq!(record.metadata.item_source, ItemSource::None);
    }
}
