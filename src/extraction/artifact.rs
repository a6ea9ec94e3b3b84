//! Per-sheet delimited-text artifacts for inspection and debugging.
//!
//! One UTF-8, comma-separated file per table, named `<table>.csv`, with a header of the
//! normalized column names. Nulls are empty fields and dates are ISO-8601.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ExtractionResult;
use crate::types::DataSet;

/// Write `dataset` to `<dir>/<table_name>.csv`, creating `dir` if needed.
pub fn write_csv_artifact(
    dir: impl AsRef<Path>,
    table_name: &str,
    dataset: &DataSet,
) -> ExtractionResult<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{table_name}.csv"));

    let file = fs::File::create(&path)?;
    write_csv(file, dataset)?;
    Ok(path)
}

/// Write `dataset` as CSV to any writer.
pub fn write_csv<W: io::Write>(writer: W, dataset: &DataSet) -> ExtractionResult<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    if !dataset.columns.is_empty() {
        wtr.write_record(&dataset.columns)?;
    }
    for row in &dataset.rows {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}
