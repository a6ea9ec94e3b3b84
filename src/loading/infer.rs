//! Schema inference from observed values.

use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Infer a [`Schema`] by scanning every row of `dataset`.
///
/// Per column the narrowest type that represents every non-null value losslessly wins:
///
/// - integers (including floats with no fractional part) → [`DataType::Int64`]
/// - any non-integral number among numbers → [`DataType::Float64`]
/// - only booleans → [`DataType::Bool`]
/// - only dates → [`DataType::Date`]; dates mixed with timestamps → [`DataType::Timestamp`]
/// - any other mix, or no non-null value at all → [`DataType::Utf8`]
///
/// A column is nullable iff it holds at least one null. The merge is order-independent, so
/// inferring twice from the same data always gives the same schema.
pub fn infer_schema(dataset: &DataSet) -> Schema {
    let fields = dataset
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| infer_field(name, dataset.column_values(idx)))
        .collect();
    Schema::new(fields)
}

fn infer_field<'a>(name: &str, values: impl Iterator<Item = &'a Value>) -> Field {
    let mut kind = Kind::Unknown;
    let mut nullable = false;
    for value in values {
        match Kind::of(value) {
            Some(k) => kind = kind.merge(k),
            None => nullable = true,
        }
    }
    Field::new(name, kind.into_data_type()).with_nullable(nullable)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Unknown,
    Bool,
    Int,
    Float,
    Date,
    Timestamp,
    Text,
}

impl Kind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Kind::Bool),
            Value::Int64(_) => Some(Kind::Int),
            Value::Float64(f) if is_integral(*f) => Some(Kind::Int),
            Value::Float64(_) => Some(Kind::Float),
            Value::Date(_) => Some(Kind::Date),
            Value::Timestamp(_) => Some(Kind::Timestamp),
            Value::Utf8(_) => Some(Kind::Text),
        }
    }

    fn merge(self, other: Kind) -> Kind {
        use Kind::*;
        match (self, other) {
            (Unknown, k) | (k, Unknown) => k,
            (a, b) if a == b => a,
            (Int, Float) | (Float, Int) => Float,
            (Date, Timestamp) | (Timestamp, Date) => Timestamp,
            _ => Text,
        }
    }

    fn into_data_type(self) -> DataType {
        match self {
            Kind::Bool => DataType::Bool,
            Kind::Int => DataType::Int64,
            Kind::Float => DataType::Float64,
            Kind::Date => DataType::Date,
            Kind::Timestamp => DataType::Timestamp,
            Kind::Unknown | Kind::Text => DataType::Utf8,
        }
    }
}

/// Whole-valued float that round-trips through `i64`.
pub(crate) fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}
