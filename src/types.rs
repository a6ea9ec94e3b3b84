//! Core data model types shared by extraction, loading and the warehouse.
//!
//! Extraction produces a [`DataSet`] (named columns plus positional rows). Loading resolves a
//! [`Schema`] of typed [`Field`]s for it and writes it to the table named by a [`TableRef`].

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
    /// Calendar date without a time component.
    Date,
    /// Date and time without a timezone.
    Timestamp,
}

impl DataType {
    /// Warehouse-facing type name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DataType::Int64 => "INTEGER",
            DataType::Float64 => "FLOAT",
            DataType::Bool => "BOOLEAN",
            DataType::Utf8 => "STRING",
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named, typed column descriptor in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
    /// Whether the column may hold [`Value::Null`].
    pub nullable: bool,
}

impl Field {
    /// Create a new nullable field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Create a field that rejects nulls.
    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }

    /// Returns a copy of this field with the given nullability.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Ordered list of fields describing a warehouse table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// A schema declaring every column as a nullable string.
    pub fn all_utf8<S: AsRef<str>>(columns: &[S]) -> Self {
        Self::new(
            columns
                .iter()
                .map(|c| Field::new(c.as_ref(), DataType::Utf8))
                .collect(),
        )
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the string payload of a [`Value::Utf8`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Text rendering used for header labels and delimited-text export.
///
/// Nulls render as the empty string, dates as ISO-8601.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Utf8(v) => f.write_str(v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

static NULL: Value = Value::Null;

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>`, each row holding one value per entry of `columns`
/// in the same order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    /// Column names, unique and in sheet order.
    pub columns: Vec<String>,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from column names and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// A dataset with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the dataset.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate the values of one column, top to bottom.
    ///
    /// Rows that are shorter than `idx` yield [`Value::Null`].
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |row| row.get(idx).unwrap_or(&NULL))
    }

    /// Create a new dataset containing only rows that match `predicate`.
    ///
    /// The returned dataset preserves the original columns.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }
}

/// Identity of a warehouse table: `(container, table_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Container (dataset) holding the table.
    pub container: String,
    /// Table name inside the container.
    pub table: String,
}

impl TableRef {
    pub fn new(container: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.container, self.table)
    }
}

/// A table as stored in (or read back from) a warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseTable {
    pub table: TableRef,
    pub schema: Schema,
    pub rows: Vec<Vec<Value>>,
}

impl WarehouseTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Copy the table contents into a [`DataSet`] keyed by the schema's field names.
    pub fn to_dataset(&self) -> DataSet {
        DataSet::new(
            self.schema.field_names().map(str::to_owned).collect(),
            self.rows.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataset() -> DataSet {
        DataSet::new(
            vec!["id".to_string(), "active".to_string(), "name".to_string()],
            vec![
                vec![Value::Int64(1), Value::Bool(true), Value::Utf8("a".to_string())],
                vec![Value::Int64(2), Value::Bool(false), Value::Utf8("b".to_string())],
                vec![Value::Int64(3), Value::Bool(true), Value::Utf8("c".to_string())],
            ],
        )
    }

    #[test]
    fn index_of_works() {
        let ds = sample_dataset();
        assert_eq!(ds.index_of("id"), Some(0));
        assert_eq!(ds.index_of("name"), Some(2));
        assert_eq!(ds.index_of("missing"), None);
    }

    #[test]
    fn filter_rows_by_bool_predicate() {
        let ds = sample_dataset();
        let active_idx = ds.index_of("active").unwrap();

        let out = ds.filter_rows(|row| matches!(row.get(active_idx), Some(Value::Bool(true))));

        assert_eq!(out.columns, ds.columns);
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.rows[1][2], Value::Utf8("c".to_string()));
        // Original unchanged
        assert_eq!(ds.row_count(), 3);
    }

    #[test]
    fn column_values_pads_short_rows() {
        let ds = DataSet::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Value::Int64(1)], vec![Value::Int64(2), Value::Int64(3)]],
        );
        let b: Vec<&Value> = ds.column_values(1).collect();
        assert_eq!(b, vec![&Value::Null, &Value::Int64(3)]);
    }

    #[test]
    fn value_display_renders_iso_dates_and_empty_null() {
        let d = NaiveDate::from_ymd_opt(2016, 11, 8).unwrap();
        assert_eq!(Value::Date(d).to_string(), "2016-11-08");
        assert_eq!(
            Value::Timestamp(d.and_hms_opt(9, 30, 0).unwrap()).to_string(),
            "2016-11-08T09:30:00"
        );
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float64(261.96).to_string(), "261.96");
    }
}
