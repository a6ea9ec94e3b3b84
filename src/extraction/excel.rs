#![cfg(feature = "excel")]

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use log::debug;

use crate::error::{ExtractionError, ExtractionResult};
use crate::types::Value;

use super::workbook::{Grid, Workbook};

/// A workbook file (`.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`) read through calamine.
///
/// Behavior:
/// - Sheet order is the workbook's own tab order
/// - Cell types are preserved: numbers stay numeric, date-formatted cells become
///   [`Value::Date`] (whole days) or [`Value::Timestamp`]
/// - Empty cells and error cells map to [`Value::Null`]; text cells keep their exact contents
pub struct ExcelWorkbook {
    path: PathBuf,
    inner: Sheets<BufReader<File>>,
}

impl ExcelWorkbook {
    /// Open a workbook, choosing the reader from the file extension.
    pub fn open(path: impl AsRef<Path>) -> ExtractionResult<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = open_workbook_auto(&path)?;
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ExcelWorkbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExcelWorkbook").field("path", &self.path).finish()
    }
}

impl Workbook for ExcelWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names().to_vec()
    }

    fn read_sheet(&mut self, name: &str) -> ExtractionResult<Grid> {
        let range = self
            .inner
            .worksheet_range(name)
            .map_err(|e| ExtractionError::UnreadableSheet {
                sheet: name.to_string(),
                message: e.to_string(),
            })?;

        Ok(range
            .rows()
            .map(|row| row.iter().map(convert_cell).collect())
            .collect())
    }
}

fn convert_cell(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Null,
        Data::String(s) => Value::Utf8(s.clone()),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_value(serial).unwrap_or(Value::Float64(serial))
        }
        Data::DateTimeIso(s) => parse_iso_datetime(s).unwrap_or_else(|| Value::Utf8(s.clone())),
        Data::DurationIso(s) => Value::Utf8(s.clone()),
        Data::Error(e) => {
            debug!("error cell mapped to null: {e:?}");
            Value::Null
        }
    }
}

/// Convert a 1900-system Excel serial into a date (whole days) or timestamp.
///
/// Serials below 60 sit before Excel's phantom 1900-02-29 and are shifted by one day.
pub(crate) fn excel_serial_to_value(serial: f64) -> Option<Value> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;

    let mut days = serial.trunc() as i64;
    if days < 60 {
        days += 1;
    }
    let seconds = (serial.fract() * 86_400.0).round() as i64;

    let date = epoch.checked_add_signed(TimeDelta::try_days(days)?)?;
    if seconds == 0 {
        return Some(Value::Date(date));
    }
    let ts = date
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::try_seconds(seconds)?)?;
    Some(Value::Timestamp(ts))
}

fn parse_iso_datetime(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(if ts.time() == chrono::NaiveTime::MIN {
            Value::Date(ts.date())
        } else {
            Value::Timestamp(ts)
        });
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Value::Date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn whole_day_serials_become_dates() {
        assert_eq!(excel_serial_to_value(42682.0), Some(Value::Date(date(2016, 11, 8))));
        assert_eq!(excel_serial_to_value(1.0), Some(Value::Date(date(1900, 1, 1))));
        assert_eq!(excel_serial_to_value(61.0), Some(Value::Date(date(1900, 3, 1))));
    }

    #[test]
    fn fractional_serials_become_timestamps() {
        let expected = date(2016, 11, 8).and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(excel_serial_to_value(42682.5), Some(Value::Timestamp(expected)));
    }

    #[test]
    fn invalid_serials_are_rejected() {
        assert_eq!(excel_serial_to_value(-1.0), None);
        assert_eq!(excel_serial_to_value(f64::NAN), None);
    }

    #[test]
    fn cells_keep_their_types() {
        assert_eq!(convert_cell(&Data::Empty), Value::Null);
        assert_eq!(
            convert_cell(&Data::String("  ".to_string())),
            Value::Utf8("  ".to_string())
        );
        assert_eq!(convert_cell(&Data::Float(261.96)), Value::Float64(261.96));
        assert_eq!(convert_cell(&Data::Int(3)), Value::Int64(3));
        assert_eq!(convert_cell(&Data::Bool(true)), Value::Bool(true));
        assert_eq!(
            convert_cell(&Data::DateTimeIso("2016-11-08T00:00:00".to_string())),
            Value::Date(date(2016, 11, 8))
        );
    }
}
