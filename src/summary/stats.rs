use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::types::{DataSet, DataType, Value, ValueKey};

use super::{float_to_json, to_json, SummaryError};

/// Count, mean, sample standard deviation, min, quartiles and max of a numeric column.
///
/// Fields are `None` when undefined (e.g. `std` with fewer than two values).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub count: usize,
    #[serde(serialize_with = "finite_or_null")]
    pub mean: Option<f64>,
    #[serde(serialize_with = "finite_or_null")]
    pub std: Option<f64>,
    #[serde(serialize_with = "finite_or_null")]
    pub min: Option<f64>,
    #[serde(rename = "25%", serialize_with = "finite_or_null")]
    pub p25: Option<f64>,
    #[serde(rename = "50%", serialize_with = "finite_or_null")]
    pub p50: Option<f64>,
    #[serde(rename = "75%", serialize_with = "finite_or_null")]
    pub p75: Option<f64>,
    #[serde(serialize_with = "finite_or_null")]
    pub max: Option<f64>,
}

/// Count and range of a timestamp column (ISO-8601 strings).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalStats {
    pub count: usize,
    pub min: Option<String>,
    pub max: Option<String>,
}

/// Count, distinct count, most frequent value and its frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalStats {
    pub count: usize,
    pub unique: usize,
    pub top: JsonValue,
    pub freq: Option<usize>,
}

/// Statistics for one column; the variant follows the column type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnStatistics {
    Numeric(NumericStats),
    Temporal(TemporalStats),
    Categorical(CategoricalStats),
}

fn finite_or_null<S: serde::Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => float_to_json(*v).serialize(serializer),
        None => serializer.serialize_none(),
    }
}

/// Descriptive statistics for every column of `dataset`.
///
/// Fails if a value does not match its column type; callers report the whole section as
/// unavailable in that case.
pub fn describe(dataset: &DataSet) -> Result<IndexMap<String, ColumnStatistics>, SummaryError> {
    let mut out = IndexMap::with_capacity(dataset.column_count());
    for (idx, field) in dataset.schema.fields.iter().enumerate() {
        let values = dataset.column_values(idx);
        let stats = match field.data_type {
            DataType::Int64 | DataType::Float64 => {
                ColumnStatistics::Numeric(numeric_stats(&field.name, field.data_type, values)?)
            }
            DataType::DateTime => ColumnStatistics::Temporal(temporal_stats(&field.name, values)?),
            DataType::Bool | DataType::Utf8 => ColumnStatistics::Categorical(categorical_stats(values)),
        };
        out.insert(field.name.clone(), stats);
    }
    Ok(out)
}

fn numeric_stats<'a>(
    column: &str,
    data_type: DataType,
    values: impl Iterator<Item = &'a Value>,
) -> Result<NumericStats, SummaryError> {
    let mut xs: Vec<f64> = Vec::new();
    for value in values {
        if value.is_null() {
            continue;
        }
        match value.as_f64() {
            Some(x) => xs.push(x),
            None => {
                return Err(SummaryError::TypeMismatch {
                    column: column.to_string(),
                    expected: data_type.tag(),
                    found: value_kind(value),
                });
            }
        }
    }

    let count = xs.len();
    if count == 0 {
        return Ok(NumericStats {
            count,
            mean: None,
            std: None,
            min: None,
            p25: None,
            p50: None,
            p75: None,
            max: None,
        });
    }

    let n = count as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let std = (count > 1).then(|| {
        let ss: f64 = xs.iter().map(|x| (x - mean).powi(2)).sum();
        (ss / (n - 1.0)).sqrt()
    });

    xs.sort_by(f64::total_cmp);
    Ok(NumericStats {
        count,
        mean: Some(mean),
        std,
        min: xs.first().copied(),
        p25: Some(quantile(&xs, 0.25)),
        p50: Some(quantile(&xs, 0.50)),
        p75: Some(quantile(&xs, 0.75)),
        max: xs.last().copied(),
    })
}

/// Linear-interpolated quantile of non-empty sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn temporal_stats<'a>(
    column: &str,
    values: impl Iterator<Item = &'a Value>,
) -> Result<TemporalStats, SummaryError> {
    let mut count = 0;
    let mut min = None;
    let mut max = None;
    for value in values {
        match value {
            Value::Null => {}
            Value::DateTime(d) => {
                count += 1;
                min = Some(min.map_or(*d, |m: chrono::NaiveDateTime| m.min(*d)));
                max = Some(max.map_or(*d, |m: chrono::NaiveDateTime| m.max(*d)));
            }
            other => {
                return Err(SummaryError::TypeMismatch {
                    column: column.to_string(),
                    expected: DataType::DateTime.tag(),
                    found: value_kind(other),
                });
            }
        }
    }
    Ok(TemporalStats {
        count,
        min: min.map(|d| Value::DateTime(d).to_display_string()),
        max: max.map(|d| Value::DateTime(d).to_display_string()),
    })
}

fn categorical_stats<'a>(values: impl Iterator<Item = &'a Value>) -> CategoricalStats {
    let mut counts: HashMap<ValueKey, (usize, usize, &'a Value)> = HashMap::new();
    let mut count = 0;
    for (pos, value) in values.enumerate() {
        if value.is_null() {
            continue;
        }
        count += 1;
        counts
            .entry(value.key())
            .and_modify(|entry| entry.1 += 1)
            .or_insert((pos, 1, value));
    }

    let top = counts
        .values()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|&(_, freq, value)| (to_json(value), freq));

    CategoricalStats {
        count,
        unique: counts.len(),
        top: top.as_ref().map(|(v, _)| v.clone()).unwrap_or(JsonValue::Null),
        freq: top.map(|(_, f)| f),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Int64(_) => "int64",
        Value::Float64(_) => "float64",
        Value::Bool(_) => "bool",
        Value::Utf8(_) => "text",
        Value::DateTime(_) => "datetime",
    }
}
