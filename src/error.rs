use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::types::TableRef;

/// Convenience result type for extraction operations.
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Convenience result type for warehouse operations.
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Convenience result type for table loads.
pub type LoadResult<T> = Result<T, LoadError>;

/// Convenience result type for pipeline runs.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned while reading a workbook or rendering its sheets.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The workbook exposes no sheets at all.
    #[error("workbook has no sheets")]
    EmptyWorkbook,

    /// One sheet could not be read; other sheets are unaffected.
    #[error("sheet '{sheet}' could not be read: {message}")]
    UnreadableSheet { sheet: String, message: String },

    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "excel")]
    /// Workbook container error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// Delimited-text artifact error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Error type reported by [`crate::warehouse::Warehouse`] implementations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("container '{0}' does not exist")]
    ContainerNotFound(String),

    #[error("table {0} does not exist")]
    TableNotFound(TableRef),

    /// Rows do not match the schema handed to the warehouse.
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The service could not be reached or refused temporarily (network, 5xx, quota back-off).
    #[error("warehouse unavailable: {0}")]
    Unavailable(String),

    #[error("warehouse state lock poisoned")]
    Poisoned,
}

impl WarehouseError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            WarehouseError::Unavailable(_) => true,
            WarehouseError::Io(err) => is_transient_io(err),
            // Polars/parquet errors often wrap I/O, but not always in a structured way.
            WarehouseError::Polars(err) => error_chain_has_transient_io(err),
            WarehouseError::Parquet(err) => error_chain_has_transient_io(err),
            _ => false,
        }
    }
}

fn is_transient_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::BrokenPipe
    )
}

fn error_chain_has_transient_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return is_transient_io(io_err);
        }
        cur = err.source();
    }
    false
}

/// Error type returned by [`crate::loading::TableLoader`]. Every variant names its destination.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The destination container was missing and could not be created (permissions, quota).
    #[error("failed to create container for {table}: {source}")]
    ContainerCreateFailed {
        table: TableRef,
        #[source]
        source: WarehouseError,
    },

    /// The resolved schema cannot represent the data.
    #[error("schema conflict for {table}: {message}")]
    SchemaConflict { table: TableRef, message: String },

    /// The replace itself failed; the previous table contents are untouched.
    #[error("write to {table} failed after {attempts} attempt(s): {source}")]
    WriteFailed {
        table: TableRef,
        attempts: u32,
        transient: bool,
        #[source]
        source: WarehouseError,
    },
}

impl LoadError {
    /// The destination the failed load targeted.
    pub fn table(&self) -> &TableRef {
        match self {
            LoadError::ContainerCreateFailed { table, .. }
            | LoadError::SchemaConflict { table, .. }
            | LoadError::WriteFailed { table, .. } => table,
        }
    }

    /// True for failures a later rerun may clear without changing the input.
    pub fn is_transient(&self) -> bool {
        match self {
            LoadError::ContainerCreateFailed { source, .. } => source.is_transient(),
            LoadError::SchemaConflict { .. } => false,
            LoadError::WriteFailed { transient, .. } => *transient,
        }
    }
}

/// Failure recorded against a single sheet of a pipeline run.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Error type for pipeline construction and whole-run outcomes.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The workbook could not be opened or has no sheets; no sheet was processed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Aggregate outcome: some sheets failed while others may have loaded.
    #[error("{failed} of {total} sheet(s) failed: {}", .sheets.join(", "))]
    PartialFailure {
        failed: usize,
        total: usize,
        sheets: Vec<String>,
    },
}

/// Error type for corrective rewrites of already-loaded tables.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("table {table} has no column '{column}'")]
    MissingColumn { table: TableRef, column: String },
}

/// Error type for the analytical query layer (feature `sql`).
#[cfg(feature = "sql")]
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("unknown query '{0}'")]
    UnknownQuery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeouts_are_transient() {
        let err = WarehouseError::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(err.is_transient());
        let err = WarehouseError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(!err.is_transient());
    }

    #[test]
    fn schema_conflicts_are_never_transient() {
        let err = LoadError::SchemaConflict {
            table: TableRef::new("ds", "orders"),
            message: "bad".to_string(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.table().table, "orders");
        assert_eq!(err.to_string(), "schema conflict for ds.orders: bad");
    }

    #[test]
    fn partial_failure_lists_sheets() {
        let err = PipelineError::PartialFailure {
            failed: 1,
            total: 3,
            sheets: vec!["Returns".to_string()],
        };
        assert_eq!(err.to_string(), "1 of 3 sheet(s) failed: Returns");
    }
}
