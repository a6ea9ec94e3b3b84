//! One-off corrective rewrites of loaded tables.
//!
//! A sheet exported with its header twice ends up with a data row whose key cell is the
//! column's own name (in `people`, a row with `regional_manager = 'regional_manager'`).
//! [`reconcile_people`] removes such rows and rewrites the table through the loader's
//! replace, keeping the stored schema.

use log::info;
use serde::Serialize;

use crate::error::CleanupError;
use crate::loading::TableLoader;
use crate::naming::normalize;
use crate::types::{DataSet, TableRef, Value};

pub const PEOPLE_TABLE: &str = "people";
pub const PEOPLE_KEY_COLUMN: &str = "regional_manager";

/// The `people` corrective transform as warehouse SQL, for running it outside this crate.
pub const PEOPLE_HEADER_ARTIFACT_CLEANUP_SQL: &str =
    "SELECT * FROM people WHERE regional_manager IS NULL OR regional_manager <> 'regional_manager'";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub removed: usize,
    pub remaining: usize,
}

/// True when `value` is the header label of `column` rather than data.
pub fn is_header_artifact(value: &Value, column: &str) -> bool {
    value.as_str().is_some_and(|s| s == column || normalize(s) == column)
}

/// Copy of `dataset` without rows whose `key_column` cell repeats that column's header.
///
/// Returns `None` when `key_column` does not exist.
pub fn remove_header_artifacts(dataset: &DataSet, key_column: &str) -> Option<DataSet> {
    let idx = dataset.index_of(key_column)?;
    Some(dataset.filter_rows(|row| !row.get(idx).is_some_and(|v| is_header_artifact(v, key_column))))
}

/// Remove header-artifact rows from `table` and replace it in place.
///
/// The table is left untouched when nothing needs removing.
pub fn reconcile_header_artifacts(
    loader: &TableLoader,
    table: &TableRef,
    key_column: &str,
) -> Result<ReconcileOutcome, CleanupError> {
    let stored = loader.warehouse().read_table(table)?;
    let dataset = stored.to_dataset();
    let cleaned = remove_header_artifacts(&dataset, key_column).ok_or_else(|| CleanupError::MissingColumn {
        table: table.clone(),
        column: key_column.to_string(),
    })?;

    let removed = dataset.row_count() - cleaned.row_count();
    if removed > 0 {
        loader.load_with_schema(&cleaned, table, Some(&stored.schema))?;
        info!("{table}: removed {removed} header artifact row(s)");
    }
    Ok(ReconcileOutcome {
        removed,
        remaining: cleaned.row_count(),
    })
}

/// Apply the `people` corrective transform in `container`.
pub fn reconcile_people(loader: &TableLoader, container: &str) -> Result<ReconcileOutcome, CleanupError> {
    reconcile_header_artifacts(loader, &TableRef::new(container, PEOPLE_TABLE), PEOPLE_KEY_COLUMN)
}
