//! Workbook abstraction consumed by the extractor.

use crate::error::{ExtractionError, ExtractionResult};
use crate::types::Value;

/// A sheet's cells, row-major. The first non-empty row is the header row.
pub type Grid = Vec<Vec<Value>>;

/// A multi-sheet workbook: ordered sheet names plus a cell grid per sheet.
///
/// Reading takes `&mut self` because file-backed readers decode lazily; it never changes
/// what the workbook contains.
pub trait Workbook {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Read one sheet into a [`Grid`].
    fn read_sheet(&mut self, name: &str) -> ExtractionResult<Grid>;
}

/// A workbook held entirely in memory.
///
/// Useful for tests and for callers that already have cell grids from another source.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkbook {
    sheets: Vec<(String, Grid)>,
}

impl InMemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet (builder style).
    pub fn with_sheet(mut self, name: impl Into<String>, grid: Grid) -> Self {
        self.push_sheet(name, grid);
        self
    }

    /// Append a sheet.
    pub fn push_sheet(&mut self, name: impl Into<String>, grid: Grid) {
        self.sheets.push((name.into(), grid));
    }
}

impl Workbook for InMemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> ExtractionResult<Grid> {
        self.sheets
            .iter()
            .find(|(sheet, _)| sheet == name)
            .map(|(_, grid)| grid.clone())
            .ok_or_else(|| ExtractionError::UnreadableSheet {
                sheet: name.to_string(),
                message: "no such sheet".to_string(),
            })
    }
}

impl<W: Workbook + ?Sized> Workbook for Box<W> {
    fn sheet_names(&self) -> Vec<String> {
        (**self).sheet_names()
    }

    fn read_sheet(&mut self, name: &str) -> ExtractionResult<Grid> {
        (**self).read_sheet(name)
    }
}

/// Shorthand for building a text cell.
pub fn text(s: impl Into<String>) -> Value {
    Value::Utf8(s.into())
}
