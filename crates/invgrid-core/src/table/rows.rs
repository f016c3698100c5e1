//! Row assembly by row-key quantization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::imaging::BoundingBox;

/// Recognized content of one table cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub bbox: BoundingBox,
    pub text: String,
}

impl Cell {
    pub fn new(bbox: BoundingBox, text: impl Into<String>) -> Self {
        Self {
            bbox,
            text: text.into(),
        }
    }
}

/// Cells sharing a row key, ordered left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Quantized y-coordinate.
    pub key: u32,
    pub cells: Vec<Cell>,
}

impl Row {
    /// Cell texts in column order.
    pub fn texts(&self) -> Vec<String> {
        self.cells.iter().map(|c| c.text.clone()).collect()
    }
}

/// Groups unordered cells into ordered rows.
///
/// Cells closer than one bucket but straddling a bucket boundary land in
/// different rows, and two visual rows inside one bucket collide. Neither
/// is corrected.
pub struct RowAssembler {
    row_height: u32,
}

impl RowAssembler {
    pub fn new(row_height: u32) -> Self {
        Self {
            row_height: row_height.max(1),
        }
    }

    /// Row key for a y-coordinate.
    pub fn row_key(&self, y: u32) -> u32 {
        y / self.row_height
    }

    /// Group cells by row key; blank cells are dropped.
    pub fn assemble(&self, cells: Vec<Cell>) -> Vec<Row> {
        let total = cells.len();
        let mut groups: BTreeMap<u32, Vec<Cell>> = BTreeMap::new();

        for mut cell in cells {
            let trimmed = cell.text.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.len() != cell.text.len() {
                cell.text = trimmed.to_string();
            }
            groups.entry(self.row_key(cell.bbox.y)).or_default().push(cell);
        }

        let rows: Vec<Row> = groups
            .into_iter()
            .map(|(key, mut cells)| {
                cells.sort_by_key(|c| (c.bbox.x, c.bbox.y));
                Row { key, cells }
            })
            .collect();

        debug!("Assembled {} rows from {} cells", rows.len(), total);
        rows
    }
}

/// Text grid of assembled rows.
pub fn text_grid(rows: &[Row]) -> Vec<Vec<String>> {
    rows.iter().map(Row::texts).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(x: u32, y: u32, text: &str) -> Cell {
        Cell::new(BoundingBox::new(x, y, 40, 16), text)
    }

    #[test]
    fn test_cells_are_ordered_by_row_then_x() {
        let cells = vec![
            cell(300, 62, "7.00"),
            cell(10, 21, "No"),
            cell(10, 60, "1"),
            cell(100, 25, "Item"),
            cell(100, 61, "Cheese Burger"),
        ];

        let rows = RowAssembler::new(20).assemble(cells);
        assert_eq!(
            text_grid(&rows),
            vec![
                vec!["No".to_string(), "Item".to_string()],
                vec!["1".to_string(), "Cheese Burger".to_string(), "7.00".to_string()],
            ]
        );
    }

    #[test]
    fn test_same_bucket_always_merges() {
        let assembler = RowAssembler::new(20);
        for y in 40..60 {
            let rows = assembler.assemble(vec![cell(0, 40, "a"), cell(50, y, "b")]);
            assert_eq!(rows.len(), 1, "y = {}", y);
        }
    }

    #[test]
    fn test_cells_more_than_a_bucket_apart_never_merge() {
        let assembler = RowAssembler::new(20);
        for y in 0..200 {
            let other = y + 21;
            let rows = assembler.assemble(vec![cell(0, y, "a"), cell(50, other, "b")]);
            assert_eq!(rows.len(), 2, "y = {}", y);
        }
    }

    #[test]
    fn test_blank_cells_are_dropped_and_text_trimmed() {
        let rows = RowAssembler::new(20).assemble(vec![cell(0, 0, "  "), cell(50, 0, " 2 ")]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].texts(), vec!["2".to_string()]);
    }
}
