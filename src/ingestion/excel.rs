#![cfg(feature = "excel")]

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::csv::{dedupe_headers, normalize_header, transpose};

/// Read the first sheet of a workbook (`.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`).
///
/// Behavior:
/// - Uses the first sheet in workbook order
/// - Detects the first non-empty row as the header row
/// - Infers a type per column from the cells (empty strings count as missing)
/// - Drops rows and columns that are entirely missing
pub fn read_excel_from_path(path: impl AsRef<Path>) -> IngestionResult<DataSet> {
    let mut workbook = open_workbook_auto(path)?;
    Ok(read_first_sheet(&mut workbook)?
        .without_empty_rows()
        .without_empty_columns())
}

/// Same as [`read_excel_from_path`], for a workbook held in memory.
pub fn read_excel_from_bytes(bytes: &[u8]) -> IngestionResult<DataSet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    Ok(read_first_sheet(&mut workbook)?
        .without_empty_rows()
        .without_empty_columns())
}

/// First sheet as a typed dataset, without dropping empty rows/columns.
///
/// The columnar path applies its own null-row rule on top of this.
pub(crate) fn read_first_sheet_unfiltered(path: impl AsRef<Path>) -> IngestionResult<DataSet> {
    let mut workbook = open_workbook_auto(path)?;
    read_first_sheet(&mut workbook)
}

fn read_first_sheet<RS: Read + Seek>(workbook: &mut Sheets<RS>) -> IngestionResult<DataSet> {
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestionError::Parse {
            source_kind: "excel",
            message: "workbook has no sheets".to_string(),
        })?;
    let range = workbook.worksheet_range(&first)?;
    Ok(sheet_to_dataset(&range))
}

fn sheet_to_dataset(range: &Range<Data>) -> DataSet {
    let mut rows = range.rows().skip_while(|row| row.iter().all(is_blank));
    let Some(header_row) = rows.next() else {
        return DataSet::default();
    };

    let width = range.width();
    let headers = dedupe_headers(
        (0..width)
            .map(|idx| {
                let raw = header_row.get(idx).map(cell_to_header_string).unwrap_or_default();
                normalize_header(idx, &raw)
            })
            .collect(),
    );

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); width];
    for row in rows {
        for (idx, column) in columns.iter_mut().enumerate() {
            column.push(row.get(idx).map(cell_to_value).unwrap_or(Value::Null));
        }
    }

    let mut fields = Vec::with_capacity(width);
    let mut typed = Vec::with_capacity(width);
    for (name, values) in headers.into_iter().zip(columns) {
        let (data_type, values) = unify_column(values);
        fields.push(Field::new(name, data_type));
        typed.push(values);
    }

    DataSet::new(Schema::new(fields), transpose(typed))
}

fn is_blank(c: &Data) -> bool {
    match c {
        Data::Empty => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
    }
}

fn cell_to_value(c: &Data) -> Value {
    match c {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::Utf8(s.clone()),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => Value::Utf8(dt.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::Float64(dt.as_f64())),
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::Utf8(s.clone())),
        Data::DurationIso(s) => Value::Utf8(s.clone()),
    }
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Pick a single type for a column of cells.
///
/// Spreadsheet numbers arrive as floats; a numeric column whose values are all integral is
/// reported as `Int64`. Mixed columns fall back to text.
fn unify_column(values: Vec<Value>) -> (DataType, Vec<Value>) {
    let non_null = || values.iter().filter(|v| !v.is_null());

    let all_numeric = non_null().all(|v| v.as_f64().is_some());
    if all_numeric {
        let all_integral = non_null().all(|v| match v {
            Value::Int64(_) => true,
            Value::Float64(f) => f.fract() == 0.0 && f.abs() < 9.0e15,
            _ => false,
        });
        if all_integral {
            let values = values
                .into_iter()
                .map(|v| match v {
                    Value::Float64(f) if !f.is_nan() => Value::Int64(f as i64),
                    Value::Float64(_) => Value::Null,
                    other => other,
                })
                .collect();
            return (DataType::Int64, values);
        }
        let values = values
            .into_iter()
            .map(|v| v.as_f64().map(Value::Float64).unwrap_or(Value::Null))
            .collect();
        return (DataType::Float64, values);
    }

    if non_null().all(|v| matches!(v, Value::Bool(_))) {
        return (DataType::Bool, values);
    }
    if non_null().all(|v| matches!(v, Value::DateTime(_))) {
        return (DataType::DateTime, values);
    }

    let values = values
        .into_iter()
        .map(|v| match v {
            Value::Null => Value::Null,
            Value::Utf8(s) => Value::Utf8(s),
            other => Value::Utf8(other.to_display_string()),
        })
        .collect();
    (DataType::Utf8, values)
}
