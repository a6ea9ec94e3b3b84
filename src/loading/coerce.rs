//! Conforming dataset rows to a resolved schema before anything is written.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};

use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::infer::is_integral;

static NULL: Value = Value::Null;

/// Reorder and convert `dataset` rows so each holds exactly one value per schema field.
///
/// Rules:
///
/// - Schema field names must be unique.
/// - Schema fields and dataset columns must name the same set of columns (order can differ).
/// - Each value must convert to its field type without loss; numeric strings are accepted
///   for numeric fields and every value renders into a string field.
/// - Nulls are only accepted in nullable fields.
///
/// Returns a human-readable conflict message on the first violation.
pub(crate) fn conform_rows(dataset: &DataSet, schema: &Schema) -> Result<Vec<Vec<Value>>, String> {
    let mut names = HashSet::with_capacity(schema.len());
    if let Some(dup) = schema.fields.iter().find(|f| !names.insert(f.name.as_str())) {
        return Err(format!("schema declares column '{}' more than once", dup.name));
    }

    let mut col_idxs = Vec::with_capacity(schema.len());
    for field in &schema.fields {
        match dataset.index_of(&field.name) {
            Some(idx) => col_idxs.push(idx),
            None => {
                return Err(format!(
                    "schema column '{}' is not present in the data. columns={:?}",
                    field.name, dataset.columns
                ));
            }
        }
    }
    if let Some(extra) = dataset.columns.iter().find(|c| schema.index_of(c).is_none()) {
        return Err(format!("data column '{extra}' is not declared in the schema"));
    }

    let mut rows = Vec::with_capacity(dataset.row_count());
    for (row_idx0, row) in dataset.rows.iter().enumerate() {
        // Report 1-based row number for users; +1 again because the header is row 1.
        let user_row = row_idx0 + 2;
        let mut out = Vec::with_capacity(schema.len());
        for (field, &idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let value = row.get(idx).unwrap_or(&NULL);
            out.push(coerce_value(value, field).map_err(|message| {
                format!(
                    "row {user_row} column '{}': {message} (raw='{value}')",
                    field.name
                )
            })?);
        }
        rows.push(out);
    }
    Ok(rows)
}

fn coerce_value(value: &Value, field: &Field) -> Result<Value, String> {
    if value.is_null() {
        return if field.nullable {
            Ok(Value::Null)
        } else {
            Err("null value in non-nullable column".to_string())
        };
    }

    match field.data_type {
        DataType::Utf8 => Ok(match value {
            Value::Utf8(s) => Value::Utf8(s.clone()),
            other => Value::Utf8(other.to_string()),
        }),
        DataType::Int64 => match value {
            Value::Int64(i) => Ok(Value::Int64(*i)),
            Value::Float64(f) if is_integral(*f) => Ok(Value::Int64(*f as i64)),
            Value::Utf8(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| format!("expected integer: {e}")),
            _ => Err("expected integer".to_string()),
        },
        DataType::Float64 => match value {
            Value::Float64(f) => Ok(Value::Float64(*f)),
            Value::Int64(i) => Ok(Value::Float64(*i as f64)),
            Value::Utf8(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float64)
                .map_err(|e| format!("expected number: {e}")),
            _ => Err("expected number".to_string()),
        },
        DataType::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Utf8(s) => parse_bool(s).map(Value::Bool),
            _ => Err("expected bool".to_string()),
        },
        DataType::Date => match value {
            Value::Date(d) => Ok(Value::Date(*d)),
            Value::Timestamp(ts) if ts.time() == chrono::NaiveTime::MIN => Ok(Value::Date(ts.date())),
            Value::Utf8(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| format!("expected date (YYYY-MM-DD): {e}")),
            _ => Err("expected date".to_string()),
        },
        DataType::Timestamp => match value {
            Value::Timestamp(ts) => Ok(Value::Timestamp(*ts)),
            Value::Date(d) => Ok(Value::Timestamp(d.and_time(chrono::NaiveTime::MIN))),
            Value::Utf8(s) => parse_timestamp(s.trim())
                .map(Value::Timestamp)
                .ok_or_else(|| "expected timestamp (ISO-8601)".to_string()),
            _ => Err("expected timestamp".to_string()),
        },
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}
