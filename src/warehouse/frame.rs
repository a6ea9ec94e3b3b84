//! Conversion between warehouse rows and Polars `DataFrame`s.
//!
//! Type mapping:
//!
//! | [`DataType`]  | Polars dtype                   |
//! |---------------|--------------------------------|
//! | `Int64`       | `Int64`                        |
//! | `Float64`     | `Float64`                      |
//! | `Bool`        | `Boolean`                      |
//! | `Utf8`        | `String`                       |
//! | `Date`        | `Date`                         |
//! | `Timestamp`   | `Datetime(Microseconds, None)` |

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::{
    AnyValue, Column, DataFrame, DataType as PlDataType, NamedFrom, PlSmallStr, PolarsResult,
    Series, TimeUnit,
};

use crate::types::{DataType, Field, Schema, Value};

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

static NULL: Value = Value::Null;

/// Build a `DataFrame` with one column per schema field.
///
/// Values that do not match their field type become nulls; callers validate rows first.
pub fn to_frame(schema: &Schema, rows: &[Vec<Value>]) -> PolarsResult<DataFrame> {
    let mut columns = Vec::with_capacity(schema.len());
    for (idx, field) in schema.fields.iter().enumerate() {
        columns.push(series_for(field, rows.iter().map(|row| row.get(idx).unwrap_or(&NULL)))?);
    }
    DataFrame::new(rows.len(), columns.into_iter().map(Column::from).collect())
}

fn series_for<'a>(field: &Field, cells: impl Iterator<Item = &'a Value>) -> PolarsResult<Series> {
    let name = PlSmallStr::from(field.name.as_str());
    let series = match field.data_type {
        DataType::Int64 => Series::new(
            name,
            cells
                .map(|v| match v {
                    Value::Int64(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        ),
        DataType::Float64 => Series::new(
            name,
            cells
                .map(|v| match v {
                    Value::Float64(f) => Some(*f),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        ),
        DataType::Bool => Series::new(
            name,
            cells
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        ),
        DataType::Utf8 => Series::new(
            name,
            cells
                .map(|v| match v {
                    Value::Utf8(s) => Some(s.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        ),
        DataType::Date => Series::new(
            name,
            cells
                .map(|v| match v {
                    Value::Date(d) => Some(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )
        .cast(&PlDataType::Date)?,
        DataType::Timestamp => Series::new(
            name,
            cells
                .map(|v| match v {
                    Value::Timestamp(ts) => Some(ts.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )
        .cast(&PlDataType::Datetime(TimeUnit::Microseconds, None))?,
    };
    Ok(series)
}

/// Read a `DataFrame` back into a schema and rows.
///
/// Parquet files carry no nullability for our purposes, so a field is reported nullable iff
/// the column holds at least one null.
pub fn from_frame(df: &DataFrame) -> PolarsResult<(Schema, Vec<Vec<Value>>)> {
    let columns: &[Column] = df.columns();
    let fields = columns
        .iter()
        .map(|c| {
            Field::new(c.name().as_str(), data_type_for(c.dtype())).with_nullable(c.null_count() > 0)
        })
        .collect();

    let mut rows = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut row = Vec::with_capacity(columns.len());
        for column in columns {
            row.push(value_from_any(column.get(row_idx)?));
        }
        rows.push(row);
    }
    Ok((Schema::new(fields), rows))
}

fn data_type_for(dtype: &PlDataType) -> DataType {
    match dtype {
        PlDataType::Int32 | PlDataType::Int64 | PlDataType::UInt32 | PlDataType::UInt64 => DataType::Int64,
        PlDataType::Float32 | PlDataType::Float64 => DataType::Float64,
        PlDataType::Boolean => DataType::Bool,
        PlDataType::Date => DataType::Date,
        PlDataType::Datetime(_, _) => DataType::Timestamp,
        _ => DataType::Utf8,
    }
}

fn value_from_any(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int32(v) => Value::Int64(i64::from(v)),
        AnyValue::Int64(v) => Value::Int64(v),
        AnyValue::UInt32(v) => Value::Int64(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).map_or(Value::Float64(v as f64), Value::Int64),
        AnyValue::Float32(v) => Value::Float64(f64::from(v)),
        AnyValue::Float64(v) => Value::Float64(v),
        AnyValue::String(s) => Value::Utf8(s.to_string()),
        AnyValue::StringOwned(s) => Value::Utf8(s.to_string()),
        AnyValue::Date(days) => date_from_days(days).map_or(Value::Null, Value::Date),
        AnyValue::Datetime(v, unit, _) => timestamp_from(v, unit).map_or(Value::Null, Value::Timestamp),
        other => Value::Utf8(other.to_string()),
    }
}

fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn timestamp_from(v: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
    };
    dt.map(|dt| dt.naive_utc())
}
