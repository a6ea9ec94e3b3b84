//! Sheet extraction: workbook sheets → schema-clean [`DataSet`]s.
//!
//! Most callers should use [`extract`], which walks every sheet in workbook order and returns
//! one [`ExtractedSheet`] per sheet:
//!
//! - the first non-empty row is the header row; each header goes through
//!   [`crate::naming::normalize`] and repeats are suffixed `_2`, `_3`, …
//! - every later row is a data row with its original cell types (dates stay dates)
//! - the sheet name is normalized into the destination table name
//! - an empty sheet yields a dataset with no columns and no rows
//!
//! Workbook sources live under:
//! - [`workbook`] (the [`Workbook`] trait and [`InMemoryWorkbook`])
//! - [`excel`] (calamine-backed files, feature `excel`)
//! - [`artifact`] (optional per-sheet CSV export)

pub mod artifact;
#[cfg(feature = "excel")]
pub mod excel;
pub mod workbook;

use log::debug;

use crate::error::{ExtractionError, ExtractionResult};
use crate::naming::{disambiguate, normalize, normalize_all};
use crate::types::{DataSet, Value};

pub use workbook::{Grid, InMemoryWorkbook, Workbook};

/// One sheet rendered into a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSheet {
    /// Sheet name as it appears in the workbook.
    pub sheet_name: String,
    /// Normalized, workbook-unique destination table name.
    pub table_name: String,
    pub dataset: DataSet,
}

/// Map workbook sheet names to unique destination table names, in order.
pub fn plan_table_names<S: AsRef<str>>(sheet_names: &[S]) -> Vec<String> {
    disambiguate(sheet_names.iter().map(|s| normalize(s.as_ref())))
}

/// Extract every sheet of `workbook`, failing on the first unreadable sheet.
///
/// Use [`extract_sheet`] per sheet when failures must stay isolated (the pipeline does).
pub fn extract<W: Workbook + ?Sized>(workbook: &mut W) -> ExtractionResult<Vec<ExtractedSheet>> {
    let sheet_names = workbook.sheet_names();
    if sheet_names.is_empty() {
        return Err(ExtractionError::EmptyWorkbook);
    }

    let table_names = plan_table_names(&sheet_names);
    let mut out = Vec::with_capacity(sheet_names.len());
    for (sheet_name, table_name) in sheet_names.into_iter().zip(table_names) {
        let dataset = extract_sheet(workbook, &sheet_name)?;
        out.push(ExtractedSheet {
            sheet_name,
            table_name,
            dataset,
        });
    }
    Ok(out)
}

/// Read and render a single sheet.
pub fn extract_sheet<W: Workbook + ?Sized>(workbook: &mut W, sheet_name: &str) -> ExtractionResult<DataSet> {
    let grid = workbook.read_sheet(sheet_name)?;
    let dataset = dataset_from_grid(grid);
    debug!(
        "extracted sheet '{sheet_name}': columns={} rows={}",
        dataset.column_count(),
        dataset.row_count()
    );
    Ok(dataset)
}

/// Render a header-first cell grid into a [`DataSet`].
///
/// - A cell is blank when it is null or whitespace-only text. Blank cells keep their value in
///   data rows; blankness only decides which rows and trailing header cells are skipped.
/// - Leading blank rows are skipped; the first remaining row is the header.
/// - Trailing header cells are dropped when both the header and every value below are empty.
/// - Blank data rows are skipped; short rows are padded with nulls and cells beyond
///   the header width are dropped.
pub fn dataset_from_grid(grid: Grid) -> DataSet {
    let mut rows = grid.into_iter().skip_while(|row| is_blank_row(row));
    let Some(header) = rows.next() else {
        return DataSet::empty();
    };

    let body: Vec<Vec<Value>> = rows.filter(|row| !is_blank_row(row)).collect();

    let mut width = header.len();
    while width > 0
        && is_blank(&header[width - 1])
        && body.iter().all(|row| row.get(width - 1).is_none_or(Value::is_null))
    {
        width -= 1;
    }

    let labels: Vec<Option<String>> = header[..width].iter().map(header_label).collect();
    let columns = normalize_all(labels.iter().map(Option::as_deref));

    let rows = body
        .into_iter()
        .map(|mut row| {
            row.resize(width, Value::Null);
            row
        })
        .collect();

    DataSet::new(columns, rows)
}

fn is_blank_row(row: &[Value]) -> bool {
    row.iter().all(is_blank)
}

/// Null, or text that is only whitespace.
fn is_blank(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::Utf8(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Header text for a cell; numeric headers render without a trailing `.0`.
fn header_label(cell: &Value) -> Option<String> {
    match cell {
        cell if is_blank(cell) => None,
        Value::Utf8(s) => Some(s.clone()),
        Value::Float64(f) if f.fract() == 0.0 && f.is_finite() => Some((*f as i64).to_string()),
        other => Some(other.to_string()),
    }
}
