//! Invoice field extraction, line-item reconciliation and record assembly.

mod assembler;
mod fields;
mod items;
pub mod rules;

pub use assembler::{PersistSummary, RecordAssembler, header_row, item_rows, persist};
pub use fields::{ExtractedFields, FieldExtractor};
pub use items::{LineItemReconciler, Reconciled, RowKind};
pub use rules::{Coercion, FieldRule, RuleBook, RuleSpec, RuleTable};
