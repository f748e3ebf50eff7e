//! Table specs returned by the model: a small select/filter/sort/limit language over the dataset.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{DataSet, DataType, Value};

/// Comparison operator of a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Case-insensitive substring match on the value's text.
    Contains,
}

/// `{"column": "...", "op": "...", "value": ...}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub value: JsonValue,
}

/// Derived-table request. Conditions are combined with AND.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct TableSpec {
    pub columns: Option<Vec<String>>,
    pub filter: Vec<Condition>,
    pub sort_by: Option<String>,
    pub descending: bool,
    pub limit: Option<usize>,
}

fn invalid(message: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidSpec {
        kind: "table",
        message: message.into(),
    }
}

fn column_index(dataset: &DataSet, name: &str) -> AnalysisResult<usize> {
    dataset
        .schema
        .index_of(name)
        .ok_or_else(|| invalid(format!("unknown column '{name}'")))
}

struct CompiledCondition {
    idx: usize,
    op: CompareOp,
    target: Value,
}

impl TableSpec {
    /// Parse a spec from the JSON body of a `table` block.
    pub fn parse(json: &str) -> AnalysisResult<Self> {
        serde_json::from_str(json).map_err(|e| invalid(e.to_string()))
    }

    /// Apply the spec to `dataset`, producing a new dataset.
    pub fn apply(&self, dataset: &DataSet) -> AnalysisResult<DataSet> {
        let conditions = self
            .filter
            .iter()
            .map(|c| {
                let idx = column_index(dataset, &c.column)?;
                let target = literal(&c.value, dataset.schema.fields[idx].data_type, c.op)
                    .map_err(|m| invalid(format!("column '{}': {m}", c.column)))?;
                Ok(CompiledCondition {
                    idx,
                    op: c.op,
                    target,
                })
            })
            .collect::<AnalysisResult<Vec<_>>>()?;
        let sort_idx = self
            .sort_by
            .as_deref()
            .map(|name| column_index(dataset, name))
            .transpose()?;
        let projection = self
            .columns
            .as_ref()
            .map(|names| {
                names
                    .iter()
                    .map(|n| column_index(dataset, n))
                    .collect::<AnalysisResult<Vec<_>>>()
            })
            .transpose()?;

        let mut out = dataset.filter_rows(|row| {
            conditions
                .iter()
                .all(|c| row.get(c.idx).is_some_and(|v| satisfies(v, c.op, &c.target)))
        });

        if let Some(idx) = sort_idx {
            let descending = self.descending;
            let null = Value::Null;
            out.rows.sort_by(|a, b| {
                let (va, vb) = (a.get(idx).unwrap_or(&null), b.get(idx).unwrap_or(&null));
                // Nulls last in both directions.
                match (va.is_null(), vb.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => {
                        let ord = compare(va, vb).unwrap_or(Ordering::Equal);
                        if descending { ord.reverse() } else { ord }
                    }
                }
            });
        }
        if let Some(limit) = self.limit {
            out.rows.truncate(limit);
        }
        Ok(match projection {
            Some(indices) => out.select_columns(&indices),
            None => out,
        })
    }
}

/// Convert a JSON literal to a value comparable with a column of `data_type`.
fn literal(json: &JsonValue, data_type: DataType, op: CompareOp) -> Result<Value, String> {
    if op == CompareOp::Contains {
        return match json {
            JsonValue::String(s) => Ok(Value::Utf8(s.to_lowercase())),
            JsonValue::Null => Err("contains needs a string".to_string()),
            other => Ok(Value::Utf8(other.to_string().to_lowercase())),
        };
    }
    match (json, data_type) {
        (JsonValue::Null, _) => Ok(Value::Null),
        (JsonValue::Number(n), DataType::Int64 | DataType::Float64) => n
            .as_f64()
            .map(Value::Float64)
            .ok_or_else(|| format!("unsupported number {n}")),
        (JsonValue::String(s), DataType::Int64 | DataType::Float64) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|_| format!("'{s}' is not a number")),
        (JsonValue::Bool(b), DataType::Bool) => Ok(Value::Bool(*b)),
        (JsonValue::String(s), DataType::DateTime) => parse_datetime(s)
            .map(Value::DateTime)
            .ok_or_else(|| format!("'{s}' is not a timestamp")),
        (JsonValue::String(s), _) => Ok(Value::Utf8(s.clone())),
        (other, DataType::Utf8) => Ok(Value::Utf8(other.to_string())),
        (other, dt) => Err(format!("{other} cannot be compared with a {} column", dt.tag())),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Utf8(x), Value::Utf8(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Int64(x), Value::Int64(y)) => Some(x.cmp(y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn satisfies(value: &Value, op: CompareOp, target: &Value) -> bool {
    if op == CompareOp::Contains {
        let Value::Utf8(needle) = target else {
            return false;
        };
        return !value.is_null() && value.to_display_string().to_lowercase().contains(needle.as_str());
    }
    if target.is_null() {
        return match op {
            CompareOp::Eq => value.is_null(),
            CompareOp::Ne => !value.is_null(),
            _ => false,
        };
    }
    if value.is_null() {
        return op == CompareOp::Ne;
    }
    let Some(ord) = compare(value, target) else {
        return op == CompareOp::Ne;
    };
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Contains => false,
    }
}
