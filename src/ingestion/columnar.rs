//! Columnar (large-file) path backed by Polars.
//!
//! Files at or above the size threshold are parsed into a Polars [`DataFrame`], rows that are
//! null in every column are removed with a vectorized mask, and the frame is materialized back
//! into a [`DataSet`].
//!
//! CSV input is decoded and checked for overlong rows the same way as on the standard path, then
//! handed to Polars with every column read as text. Column names and types are then set with the
//! standard path's rules, so both paths agree on shape and values.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::{
    BooleanChunked, Column, CsvReadOptions, DataFrame, DataType as PlDataType,
    NamedFrom, SerReader, Series, TimeUnit,
};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::csv::{decode_text, dedupe_headers, infer_text_columns, normalize_header};
use super::dispatch::SourceFormat;
use super::observability::Advisory;

/// Default row count above which a [`Advisory::LargeDataset`] is raised.
pub const DEFAULT_LARGE_DATASET_ROWS: usize = 100_000;

/// Load a file through the columnar path.
pub fn load_columnar(
    path: impl AsRef<Path>,
    format: SourceFormat,
    large_dataset_rows: usize,
    advisories: &mut Vec<Advisory>,
) -> IngestionResult<DataSet> {
    let path = path.as_ref();
    let (df, headers) = match format {
        SourceFormat::Csv => {
            let frame = read_csv_frame(path, advisories)?;
            (frame.frame, Some(frame.headers))
        }
        SourceFormat::Excel => (read_excel_frame(path)?, None),
        other => {
            return Err(IngestionError::UnsupportedFormat {
                message: format!("{other} has no columnar path"),
            });
        }
    };

    let df = drop_all_null_rows(&df)?;
    if df.height() > large_dataset_rows {
        advisories.push(Advisory::LargeDataset { rows: df.height() });
    }

    let mut dataset = frame_to_dataset(&df)?;
    match headers {
        Some(headers) => {
            if headers.len() == dataset.schema.fields.len() {
                for (field, name) in dataset.schema.fields.iter_mut().zip(headers) {
                    field.name = name;
                }
            }
            Ok(infer_text_columns(dataset))
        }
        None => Ok(dataset),
    }
}

/// A CSV file parsed into an all-text frame, plus its normalized header row.
#[derive(Debug, Clone)]
pub struct CsvFrame {
    pub frame: DataFrame,
    pub headers: Vec<String>,
}

/// Parse a CSV file into a frame whose columns are all text.
///
/// Decoding follows the standard path (encoding advisory included), and rows with more fields
/// than the header are removed with a [`Advisory::MalformedRowSkipped`] before Polars sees them.
pub fn read_csv_frame(path: &Path, advisories: &mut Vec<Advisory>) -> IngestionResult<CsvFrame> {
    let bytes = fs::read(path)?;
    let text = decode_text(&bytes, advisories);
    drop(bytes);

    let (headers, filtered) = scan_csv_text(&text, advisories)?;
    let text = filtered.unwrap_or(text);

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
        .finish()?;
    Ok(CsvFrame { frame, headers })
}

/// Read the header row and drop overlong records.
///
/// Returns the normalized headers, and a rewritten text only when some record was dropped.
fn scan_csv_text(
    text: &str,
    advisories: &mut Vec<Advisory>,
) -> IngestionResult<(Vec<String>, Option<String>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = dedupe_headers(
        rdr.headers()?
            .iter()
            .enumerate()
            .map(|(idx, h)| normalize_header(idx, h))
            .collect(),
    );
    if headers.is_empty() {
        return Err(IngestionError::Parse {
            source_kind: "csv",
            message: "no columns to parse (empty input)".to_string(),
        });
    }

    let width = headers.len();
    let mut dropped: Vec<(usize, usize)> = Vec::new();
    let mut open: Option<usize> = None;
    let mut record = csv::ByteRecord::new();
    while rdr.read_byte_record(&mut record)? {
        let (start, line) = record
            .position()
            .map(|p| (p.byte() as usize, p.line()))
            .unwrap_or((0, 0));
        if let Some(from) = open.take() {
            dropped.push((from, start));
        }
        if record.len() > width {
            advisories.push(Advisory::MalformedRowSkipped {
                line,
                reason: format!("expected {width} fields, saw {}", record.len()),
            });
            open = Some(start);
        }
    }
    if let Some(from) = open {
        dropped.push((from, text.len()));
    }
    if dropped.is_empty() {
        return Ok((headers, None));
    }

    let mut kept = String::with_capacity(text.len());
    let mut cursor = 0;
    for (from, to) in dropped {
        kept.push_str(&text[cursor..from]);
        cursor = to;
    }
    kept.push_str(&text[cursor..]);
    Ok((headers, Some(kept)))
}

#[cfg(feature = "excel")]
fn read_excel_frame(path: &Path) -> IngestionResult<DataFrame> {
    let sheet = super::excel::read_first_sheet_unfiltered(path)?;
    dataset_to_frame(&sheet)
}

#[cfg(not(feature = "excel"))]
fn read_excel_frame(path: &Path) -> IngestionResult<DataFrame> {
    let _ = path;
    Err(IngestionError::UnsupportedFormat {
        message: "excel ingestion not enabled (enable cargo feature 'excel')".to_string(),
    })
}

/// Remove rows that are null in every column.
pub fn drop_all_null_rows(df: &DataFrame) -> IngestionResult<DataFrame> {
    let mut keep: Option<BooleanChunked> = None;
    for column in df.columns() {
        let not_null = column.is_not_null();
        keep = Some(match keep {
            Some(mask) => &mask | &not_null,
            None => not_null,
        });
    }

    match keep {
        Some(mask) => Ok(df.filter(&mask)?),
        None => Ok(df.clone()),
    }
}

/// Convert a typed dataset into a frame.
pub fn dataset_to_frame(dataset: &DataSet) -> IngestionResult<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(dataset.column_count());
    for (idx, field) in dataset.schema.fields.iter().enumerate() {
        let name = field.name.as_str();
        let values = dataset.column_values(idx);
        let series = match field.data_type {
            DataType::Int64 => {
                let v: Vec<Option<i64>> = values
                    .map(|v| match v {
                        Value::Int64(x) => Some(*x),
                        _ => None,
                    })
                    .collect();
                Series::new(name.into(), v)
            }
            DataType::Float64 => {
                let v: Vec<Option<f64>> = values.map(Value::as_f64).collect();
                Series::new(name.into(), v)
            }
            DataType::Bool => {
                let v: Vec<Option<bool>> = values
                    .map(|v| match v {
                        Value::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect();
                Series::new(name.into(), v)
            }
            DataType::Utf8 => {
                let v: Vec<Option<String>> = values
                    .map(|v| if v.is_null() { None } else { Some(v.to_display_string()) })
                    .collect();
                Series::new(name.into(), v)
            }
            DataType::DateTime => {
                let v: Vec<Option<i64>> = values
                    .map(|v| match v {
                        Value::DateTime(d) => Some(d.and_utc().timestamp_millis()),
                        _ => None,
                    })
                    .collect();
                Series::new(name.into(), v)
                    .cast(&PlDataType::Datetime(TimeUnit::Milliseconds, None))?
            }
        };
        columns.push(Column::from(series));
    }
    Ok(DataFrame::new_infer_height(columns)?)
}

/// Materialize a frame into a dataset.
pub fn frame_to_dataset(df: &DataFrame) -> IngestionResult<DataSet> {
    let mut fields = Vec::with_capacity(df.width());
    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(df.width());
    for (idx, column) in df.columns().iter().enumerate() {
        let (data_type, values) = materialize_column(column)?;
        fields.push(Field::new(normalize_header(idx, column.name().as_str()), data_type));
        columns.push(values);
    }
    Ok(DataSet::new(Schema::new(fields), super::csv::transpose(columns)))
}

fn materialize_column(column: &Column) -> IngestionResult<(DataType, Vec<Value>)> {
    let series = column.as_materialized_series();
    let dtype = series.dtype().clone();

    let out = match dtype {
        PlDataType::Boolean => (
            DataType::Bool,
            series
                .bool()?
                .into_iter()
                .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
                .collect(),
        ),
        ref dt if dt.is_integer() => {
            let cast = series.cast(&PlDataType::Int64)?;
            let values = cast
                .i64()?
                .into_iter()
                .map(|v| v.map(Value::Int64).unwrap_or(Value::Null))
                .collect();
            (DataType::Int64, values)
        }
        ref dt if dt.is_float() => {
            let cast = series.cast(&PlDataType::Float64)?;
            let values = cast
                .f64()?
                .into_iter()
                .map(|v| v.map(Value::Float64).unwrap_or(Value::Null))
                .collect();
            (DataType::Float64, values)
        }
        PlDataType::String => (
            DataType::Utf8,
            series
                .str()?
                .into_iter()
                .map(|v| v.map(|s| Value::Utf8(s.to_owned())).unwrap_or(Value::Null))
                .collect(),
        ),
        PlDataType::Datetime(unit, _) => {
            let cast = series.cast(&PlDataType::Int64)?;
            let values = cast
                .i64()?
                .into_iter()
                .map(|v| {
                    v.and_then(|raw| timestamp_to_datetime(raw, unit))
                        .map(Value::DateTime)
                        .unwrap_or(Value::Null)
                })
                .collect();
            (DataType::DateTime, values)
        }
        PlDataType::Date => {
            let cast = series.cast(&PlDataType::Int32)?;
            let values = cast
                .i32()?
                .into_iter()
                .map(|v| {
                    v.and_then(days_to_datetime)
                        .map(Value::DateTime)
                        .unwrap_or(Value::Null)
                })
                .collect();
            (DataType::DateTime, values)
        }
        _ => {
            let cast = series.cast(&PlDataType::String)?;
            let values = cast
                .str()?
                .into_iter()
                .map(|v| v.map(|s| Value::Utf8(s.to_owned())).unwrap_or(Value::Null))
                .collect();
            (DataType::Utf8, values)
        }
    };
    Ok(out)
}

fn timestamp_to_datetime(raw: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(raw).map(|d| d.naive_utc()),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(raw).map(|d| d.naive_utc()),
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(raw).naive_utc()),
    }
}

fn days_to_datetime(days: i32) -> Option<NaiveDateTime> {
    // 719_163 = days from 0001-01-01 (CE day 1) to 1970-01-01.
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(719_163)?)?.and_hms_opt(0, 0, 0)
}
