//! Table grid type.

use serde::{Deserialize, Serialize};

/// Separator between cells when a grid is flattened to text.
pub const CELL_SEPARATOR: &str = " | ";

/// A raw `rows x cols` grid of cell strings as detected on a page.
///
/// Rows may be ragged; the column count follows the first row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableGrid {
    rows: Vec<Vec<String>>,
}

impl TableGrid {
    /// Create a grid from rows of cells.
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Create a grid from string slices.
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns (based on first row).
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    /// Check if the grid has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First non-blank cell in row-major order, trimmed.
    pub fn first_non_empty_cell(&self) -> Option<&str> {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .map(|cell| cell.trim())
            .find(|cell| !cell.is_empty())
    }

    /// Flatten to text: cells joined with `" | "`, rows with newlines.
    ///
    /// Empty rows are left out and the result is trimmed.
    pub fn plain_text(&self) -> String {
        self.rows
            .iter()
            .filter(|row| !row.is_empty())
            .map(|row| row.join(CELL_SEPARATOR))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimensions() {
        let grid = TableGrid::from_strs(&[&["Name", "Age"], &["Alice", "30"], &["Bob", "25"]]);
        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.column_count(), 2);
        assert!(!grid.is_empty());
        assert_eq!(TableGrid::default().column_count(), 0);
    }

    #[test]
    fn test_plain_text() {
        let grid = TableGrid::from_strs(&[&["Name", "Age"], &["Alice", ""]]);
        assert_eq!(grid.plain_text(), "Name | Age\nAlice |");

        let grid = TableGrid::from_strs(&[&["", "x"], &[], &["y", "z"]]);
        assert_eq!(grid.plain_text(), "| x\ny | z");
    }

    #[test]
    fn test_first_non_empty_cell() {
        let grid = TableGrid::from_strs(&[&["  ", ""], &["", " Total "]]);
        assert_eq!(grid.first_non_empty_cell(), Some("Total"));
        assert_eq!(TableGrid::from_strs(&[&[""]]).first_non_empty_cell(), None);
    }
}
