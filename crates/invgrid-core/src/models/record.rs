//! Structured invoice record produced by the pipeline.
//!
//! Every field is always present. A value that could not be extracted is
//! carried as [`FieldValue::Missing`], which serializes as `"N/A"`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

/// Sentinel written for fields that could not be extracted.
pub const NOT_AVAILABLE: &str = "N/A";

/// A scalar field value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// Monetary or numeric amount.
    Number(Decimal),
    /// No value could be extracted.
    #[default]
    Missing,
}

impl FieldValue {
    /// Whether this is the `N/A` sentinel.
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    /// Numeric content, if this is a number.
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Render for tabular output.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Missing => NOT_AVAILABLE.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<Decimal> for FieldValue {
    fn from(n: Decimal) -> Self {
        FieldValue::Number(n)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Number(n) => rust_decimal::serde::float::serialize(n, serializer),
            FieldValue::Missing => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

/// Identifies one scalar field of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldKey {
    #[serde(rename = "Sales_Invoice_No")]
    InvoiceNumber,
    #[serde(rename = "Customer_Name")]
    CustomerName,
    #[serde(rename = "Date")]
    Date,
    #[serde(rename = "TAX_NUMBER")]
    TaxNumber,
    #[serde(rename = "Company_Name")]
    CompanyName,
    #[serde(rename = "Company_Address_Contact")]
    CompanyContact,
    #[serde(rename = "Total_Summary")]
    Total,
    #[serde(rename = "Discount")]
    Discount,
    #[serde(rename = "Net_Amount")]
    NetAmount,
    #[serde(rename = "Sales_Tax")]
    SalesTax,
    #[serde(rename = "Note")]
    Note,
}

impl FieldKey {
    /// All fields, in header-row order.
    pub const ALL: [FieldKey; 11] = [
        FieldKey::InvoiceNumber,
        FieldKey::CustomerName,
        FieldKey::Date,
        FieldKey::TaxNumber,
        FieldKey::CompanyName,
        FieldKey::CompanyContact,
        FieldKey::Total,
        FieldKey::Discount,
        FieldKey::NetAmount,
        FieldKey::SalesTax,
        FieldKey::Note,
    ];

    /// Column label used in serialized records and sinks.
    pub fn label(&self) -> &'static str {
        match self {
            FieldKey::InvoiceNumber => "Sales_Invoice_No",
            FieldKey::CustomerName => "Customer_Name",
            FieldKey::Date => "Date",
            FieldKey::TaxNumber => "TAX_NUMBER",
            FieldKey::CompanyName => "Company_Name",
            FieldKey::CompanyContact => "Company_Address_Contact",
            FieldKey::Total => "Total_Summary",
            FieldKey::Discount => "Discount",
            FieldKey::NetAmount => "Net_Amount",
            FieldKey::SalesTax => "Sales_Tax",
            FieldKey::Note => "Note",
        }
    }

    /// Look up a field by its column label (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.label().eq_ignore_ascii_case(label.trim()))
    }
}

/// Header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceHeader {
    #[serde(rename = "Sales_Invoice_No")]
    pub invoice_number: FieldValue,

    #[serde(rename = "Customer_Name")]
    pub customer_name: FieldValue,

    #[serde(rename = "Date")]
    pub date: FieldValue,

    #[serde(rename = "TAX_NUMBER")]
    pub tax_number: FieldValue,

    #[serde(rename = "Company_Name")]
    pub company_name: FieldValue,

    #[serde(rename = "Company_Address_Contact")]
    pub company_contact: FieldValue,

    #[serde(rename = "Note")]
    pub note: FieldValue,
}

/// Summary totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceSummary {
    #[serde(rename = "Total_Summary")]
    pub total: FieldValue,

    #[serde(rename = "Discount")]
    pub discount: FieldValue,

    #[serde(rename = "Net_Amount")]
    pub net_amount: FieldValue,

    #[serde(rename = "Sales_Tax")]
    pub sales_tax: FieldValue,
}

/// A single line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    /// Item number as printed.
    #[serde(rename = "Item_No")]
    pub item_no: String,

    /// Product description.
    #[serde(rename = "Item_Name")]
    pub name: String,

    #[serde(rename = "Qty", with = "rust_decimal::serde::float")]
    pub quantity: Decimal,

    /// Unit of measure, or `N/A`.
    #[serde(rename = "Unit")]
    pub unit: String,

    #[serde(rename = "Price", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,

    #[serde(rename = "Total_Price", with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

/// Diagnostics about how the record was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordMetadata {
    /// Rule table used for field extraction.
    pub layout: String,

    /// Number of table cells recognized.
    pub cell_count: usize,

    /// Where the line items came from.
    pub item_source: ItemSource,

    /// Set when the deadline cut the table path short.
    pub partial: bool,

    /// Degraded-extraction diagnostics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Processing time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

/// Origin of the extracted line items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSource {
    /// Reconstructed table grid.
    Table,
    /// Lines of whole-page text.
    Text,
    #[default]
    None,
}

/// The structured invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceRecord {
    #[serde(flatten)]
    pub header: InvoiceHeader,

    #[serde(flatten)]
    pub summary: InvoiceSummary,

    #[serde(rename = "Items")]
    pub items: Vec<LineItem>,

    /// Reconstructed row/cell grid.
    #[serde(rename = "Table")]
    pub table: Vec<Vec<String>>,

    #[serde(rename = "Metadata")]
    pub metadata: RecordMetadata,
}

impl InvoiceRecord {
    /// Get a scalar field.
    pub fn field(&self, key: FieldKey) -> &FieldValue {
        match key {
            FieldKey::InvoiceNumber => &self.header.invoice_number,
            FieldKey::CustomerName => &self.header.customer_name,
            FieldKey::Date => &self.header.date,
            FieldKey::TaxNumber => &self.header.tax_number,
            FieldKey::CompanyName => &self.header.company_name,
            FieldKey::CompanyContact => &self.header.company_contact,
            FieldKey::Total => &self.summary.total,
            FieldKey::Discount => &self.summary.discount,
            FieldKey::NetAmount => &self.summary.net_amount,
            FieldKey::SalesTax => &self.summary.sales_tax,
            FieldKey::Note => &self.header.note,
        }
    }

    /// Set a scalar field.
    pub fn set_field(&mut self, key: FieldKey, value: FieldValue) {
        let slot = match key {
            FieldKey::InvoiceNumber => &mut self.header.invoice_number,
            FieldKey::CustomerName => &mut self.header.customer_name,
            FieldKey::Date => &mut self.header.date,
            FieldKey::TaxNumber => &mut self.header.tax_number,
            FieldKey::CompanyName => &mut self.header.company_name,
            FieldKey::CompanyContact => &mut self.header.company_contact,
            FieldKey::Total => &mut self.summary.total,
            FieldKey::Discount => &mut self.summary.discount,
            FieldKey::NetAmount => &mut self.summary.net_amount,
            FieldKey::SalesTax => &mut self.summary.sales_tax,
            FieldKey::Note => &mut self.header.note,
        };
        *slot = value;
    }

    /// Fields still holding the sentinel.
    pub fn missing_fields(&self) -> Vec<FieldKey> {
        FieldKey::ALL
            .into_iter()
            .filter(|k| self.field(*k).is_missing())
            .collect()
    }

    /// A header row is only worth persisting with an invoice number.
    pub fn is_persistable(&self) -> bool {
        !self.header.invoice_number.is_missing()
    }

    /// Cross-check items against the summary and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.header.invoice_number.is_missing() {
            issues.push("Missing invoice number".to_string());
        }

        if self.items.is_empty() {
            issues.push("No line items".to_string());
        }

        for item in &self.items {
            let expected = item.quantity * item.unit_price;
            if (expected - item.total_price).abs() > Decimal::new(1, 2) {
                issues.push(format!(
                    "Item {} total ({}) differs from quantity x price ({})",
                    item.item_no, item.total_price, expected
                ));
            }
        }

        if let Some(total) = self.summary.total.as_number() {
            if !self.items.is_empty() {
                let items_total: Decimal = self.items.iter().map(|i| i.total_price).sum();
                if (items_total - total).abs() > Decimal::new(1, 2) {
                    issues.push(format!(
                        "Line item total ({}) differs from summary ({})",
                        items_total, total
                    ));
                }
            }
        }

        issues
    }
}
