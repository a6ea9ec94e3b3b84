//! Warehouse abstraction: containers of replaceable, schema-typed tables.
//!
//! The loader only talks to the [`Warehouse`] trait. Two implementations ship with the crate:
//!
//! - [`MemoryWarehouse`]: in-process, for tests and dry runs
//! - [`ParquetWarehouse`]: one directory per container, one Parquet file per table
//!
//! Every implementation must make [`Warehouse::replace_table`] atomic per table (readers see the
//! previous contents or the complete new contents, never a mix) and allow at most one writer per
//! table at a time.

mod frame;
pub mod memory;
pub mod parquet;

use std::collections::HashSet;

use crate::error::{WarehouseError, WarehouseResult};
use crate::types::{DataType, Schema, TableRef, Value, WarehouseTable};

pub use frame::{from_frame, to_frame};
pub use memory::MemoryWarehouse;
pub use self::parquet::ParquetWarehouse;

/// Region used when a container has to be created and none was configured.
pub const DEFAULT_REGION: &str = "asia-southeast1";

/// What [`Warehouse::create_container_if_absent`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Existing,
}

/// Destination of a load: named containers holding named tables.
pub trait Warehouse: Send + Sync {
    /// Create container `name` in `region` unless it already exists. Idempotent; an existing
    /// container keeps its original region.
    fn create_container_if_absent(&self, name: &str, region: &str) -> WarehouseResult<ContainerStatus>;

    /// Replace the whole table with `rows` (REPLACE, never append) and return the number of
    /// rows now stored. The container must exist.
    fn replace_table(&self, table: &TableRef, schema: &Schema, rows: &[Vec<Value>]) -> WarehouseResult<usize>;

    /// Read back a table's schema and rows.
    fn read_table(&self, table: &TableRef) -> WarehouseResult<WarehouseTable>;

    /// Names of the tables in `container`, sorted.
    fn list_tables(&self, container: &str) -> WarehouseResult<Vec<String>>;

    /// Region of an existing container, `None` if it does not exist.
    fn container_region(&self, name: &str) -> WarehouseResult<Option<String>>;
}

impl<W: Warehouse + ?Sized> Warehouse for std::sync::Arc<W> {
    fn create_container_if_absent(&self, name: &str, region: &str) -> WarehouseResult<ContainerStatus> {
        (**self).create_container_if_absent(name, region)
    }

    fn replace_table(&self, table: &TableRef, schema: &Schema, rows: &[Vec<Value>]) -> WarehouseResult<usize> {
        (**self).replace_table(table, schema, rows)
    }

    fn read_table(&self, table: &TableRef) -> WarehouseResult<WarehouseTable> {
        (**self).read_table(table)
    }

    fn list_tables(&self, container: &str) -> WarehouseResult<Vec<String>> {
        (**self).list_tables(container)
    }

    fn container_region(&self, name: &str) -> WarehouseResult<Option<String>> {
        (**self).container_region(name)
    }
}

/// Check that `rows` fit `schema` exactly before anything is written.
pub(crate) fn validate_rows(schema: &Schema, rows: &[Vec<Value>]) -> WarehouseResult<()> {
    if schema.is_empty() {
        return Err(WarehouseError::InvalidData(
            "a table needs at least one column".to_string(),
        ));
    }
    let mut names = HashSet::with_capacity(schema.len());
    if let Some(dup) = schema.fields.iter().find(|f| !names.insert(f.name.as_str())) {
        return Err(WarehouseError::InvalidData(format!(
            "column '{}' is declared more than once",
            dup.name
        )));
    }
    for (row_idx, row) in rows.iter().enumerate() {
        if row.len() != schema.len() {
            return Err(WarehouseError::InvalidData(format!(
                "row {row_idx} has {} value(s), schema has {} field(s)",
                row.len(),
                schema.len()
            )));
        }
        for (value, field) in row.iter().zip(&schema.fields) {
            let ok = match value {
                Value::Null => field.nullable,
                other => value_has_type(other, field.data_type),
            };
            if !ok {
                return Err(WarehouseError::InvalidData(format!(
                    "row {row_idx} column '{}': value '{value}' does not fit {}{}",
                    field.name,
                    field.data_type,
                    if field.nullable { "" } else { " NOT NULL" }
                )));
            }
        }
    }
    Ok(())
}

fn value_has_type(value: &Value, data_type: DataType) -> bool {
    matches!(
        (value, data_type),
        (Value::Int64(_), DataType::Int64)
            | (Value::Float64(_), DataType::Float64)
            | (Value::Bool(_), DataType::Bool)
            | (Value::Utf8(_), DataType::Utf8)
            | (Value::Date(_), DataType::Date)
            | (Value::Timestamp(_), DataType::Timestamp)
    )
}

/// Container names are used as directory names and SQL qualifiers.
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
