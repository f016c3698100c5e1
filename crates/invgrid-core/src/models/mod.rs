//! Data models for the structuring pipeline.

pub mod config;
pub mod record;

pub use config::InvgridConfig;
pub use record::{FieldKey, FieldValue, InvoiceRecord, LineItem, NOT_AVAILABLE};
