//! Table reconstruction: per-cell recognition and row assembly.

mod reader;
mod rows;

pub use reader::{CellBatch, CellReader};
pub use rows::{Cell, Row, RowAssembler, text_grid};
