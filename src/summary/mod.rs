//! Dataset summaries for prompting and export.
//!
//! [`summarize`] turns a [`DataSet`] into a JSON-serializable [`DatasetSummary`]: shape, types,
//! a head sample, the (capped) full rows, per-column unique values and frequency tables,
//! descriptive statistics, and a fixed-seed random sample for large datasets.
//!
//! Summarization never fails. Problems in one section degrade that section (see
//! [`Statistics::Unavailable`]); a dataset that cannot be summarized at all yields a minimal
//! summary with [`DatasetSummary::error`] set.

mod catalog;
mod render;
mod stats;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::types::{DataSet, Value};

pub use catalog::{frequency_table, unique_catalog, UniqueValues};
pub use render::markdown_table;
pub use stats::{describe, CategoricalStats, ColumnStatistics, NumericStats, TemporalStats};

/// One serialized row: column name → JSON-safe scalar.
pub type Row = IndexMap<String, JsonValue>;

/// Tuning knobs for [`summarize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOptions {
    /// Rows in `sample`.
    pub head_rows: usize,
    /// Datasets with more rows than this get a `note` and a `random_sample`.
    pub sampling_threshold: usize,
    /// Upper bound on `random_sample` rows.
    pub random_sample_rows: usize,
    /// Seed for `random_sample`.
    pub seed: u64,
    /// Cap on rows serialized into `data`; `None` serializes every row.
    pub max_data_rows: Option<usize>,
    /// Columns with more distinct non-null values than this get a placeholder catalog.
    pub unique_cap: usize,
    /// Non-text columns get a frequency table only below this many distinct values.
    pub frequency_distinct_limit: usize,
    /// Entries kept per frequency table.
    pub frequency_top_k: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            head_rows: 5,
            sampling_threshold: 10_000,
            random_sample_rows: 1_000,
            seed: 42,
            max_data_rows: Some(10_000),
            unique_cap: 1_000,
            frequency_distinct_limit: 50,
            frequency_top_k: 50,
        }
    }
}

/// Statistics section: per-column stats, or why they are missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Statistics {
    Columns(IndexMap<String, ColumnStatistics>),
    Unavailable(String),
}

/// JSON-serializable description of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub columns: Vec<String>,
    /// `[rows, columns]`.
    pub shape: [usize; 2],
    /// Column name → type tag.
    pub dtypes: IndexMap<String, String>,
    /// First rows of the dataset.
    pub sample: Vec<Row>,
    /// Rows in order, capped by [`SummaryOptions::max_data_rows`].
    pub data: Vec<Row>,
    /// `true` when `data` holds fewer rows than the dataset.
    pub data_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_sample: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub unique_values: IndexMap<String, UniqueValues>,
    pub value_counts: IndexMap<String, IndexMap<String, usize>>,
    pub statistics: Statistics,
    /// Set only on the minimal fallback summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why a section (or the whole summary) could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error("row {row} has {len} values but the schema has {expected} columns")]
    RaggedRow {
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("column '{column}' is typed {expected} but holds a {found} value")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Build the summary of `dataset`. Never fails; see the module docs.
pub fn summarize(dataset: &DataSet, options: &SummaryOptions) -> DatasetSummary {
    match try_summarize(dataset, options) {
        Ok(summary) => summary,
        Err(err) => {
            tracing::warn!(error = %err, "full summary unavailable; using minimal summary");
            DatasetSummary::minimal(dataset, &err)
        }
    }
}

fn try_summarize(dataset: &DataSet, options: &SummaryOptions) -> Result<DatasetSummary, SummaryError> {
    dataset
        .validate_shape()
        .map_err(|(row, len)| SummaryError::RaggedRow {
            row,
            len,
            expected: dataset.column_count(),
        })?;

    let columns = column_names(dataset);
    let rows = dataset.row_count();

    let data_rows = options.max_data_rows.map_or(rows, |cap| cap.min(rows));
    let data = dataset.rows[..data_rows]
        .iter()
        .map(|r| serialize_row(&columns, r))
        .collect();
    let sample = dataset
        .rows
        .iter()
        .take(options.head_rows)
        .map(|r| serialize_row(&columns, r))
        .collect();

    let mut unique_values = IndexMap::new();
    let mut value_counts = IndexMap::new();
    for (idx, field) in dataset.schema.fields.iter().enumerate() {
        unique_values.insert(
            field.name.clone(),
            unique_catalog(dataset.column_values(idx), options.unique_cap),
        );
        if let Some(table) = frequency_table(
            dataset.column_values(idx),
            field.data_type,
            options.frequency_distinct_limit,
            options.frequency_top_k,
        ) {
            value_counts.insert(field.name.clone(), table);
        }
    }

    let statistics = match describe(dataset) {
        Ok(stats) => Statistics::Columns(stats),
        Err(err) => Statistics::Unavailable(format!("statistics unavailable: {err}")),
    };

    let (note, random_sample) = if rows > options.sampling_threshold {
        let amount = options.random_sample_rows.min(rows);
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut picked = index::sample(&mut rng, rows, amount).into_vec();
        picked.sort_unstable();
        let sampled = picked
            .into_iter()
            .map(|i| serialize_row(&columns, &dataset.rows[i]))
            .collect();
        (
            Some(format!(
                "Large dataset ({rows} rows); random_sample holds {amount} randomly chosen rows"
            )),
            Some(sampled),
        )
    } else {
        (None, None)
    };

    Ok(DatasetSummary {
        dtypes: dtypes(dataset),
        shape: [rows, dataset.column_count()],
        columns,
        sample,
        data,
        data_truncated: data_rows < rows,
        random_sample,
        note,
        unique_values,
        value_counts,
        statistics,
        error: None,
    })
}

impl DatasetSummary {
    /// Columns, shape, dtypes and stringified rows, plus the error that prevented a full summary.
    ///
    /// Extra values in ragged rows are dropped; missing ones are `null`.
    pub fn minimal(dataset: &DataSet, error: &SummaryError) -> Self {
        let columns = column_names(dataset);
        let data: Vec<Row> = dataset
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(idx, name)| {
                        let cell = match row.get(idx) {
                            Some(v) if !v.is_null() => JsonValue::String(v.to_display_string()),
                            _ => JsonValue::Null,
                        };
                        (name.clone(), cell)
                    })
                    .collect()
            })
            .collect();

        Self {
            dtypes: dtypes(dataset),
            shape: [dataset.row_count(), dataset.column_count()],
            columns,
            sample: Vec::new(),
            data,
            data_truncated: false,
            random_sample: None,
            note: None,
            unique_values: IndexMap::new(),
            value_counts: IndexMap::new(),
            statistics: Statistics::Unavailable(format!("statistics skipped: {error}")),
            error: Some(error.to_string()),
        }
    }

    /// `true` when this is the minimal fallback summary.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|err| format!("{{\"error\": \"summary serialization failed: {err}\"}}"))
    }

    /// Markdown report: dimensions, column list and the head sample as a table.
    pub fn to_markdown(&self) -> String {
        render::summary_markdown(self)
    }
}

fn column_names(dataset: &DataSet) -> Vec<String> {
    dataset.schema.field_names().map(str::to_owned).collect()
}

fn dtypes(dataset: &DataSet) -> IndexMap<String, String> {
    dataset
        .schema
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.data_type.tag().to_string()))
        .collect()
}

fn serialize_row(columns: &[String], row: &[Value]) -> Row {
    columns
        .iter()
        .zip(row)
        .map(|(name, value)| (name.clone(), to_json(value)))
        .collect()
}

/// JSON-safe form of a value: null/NaN/±inf → `null`, timestamps → ISO-8601 strings.
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Int64(v) => JsonValue::from(*v),
        Value::Float64(v) => float_to_json(*v),
        Value::Bool(v) => JsonValue::Bool(*v),
        Value::Utf8(s) => JsonValue::String(s.clone()),
        Value::DateTime(_) => JsonValue::String(value.to_display_string()),
    }
}

pub(crate) fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Field, Schema};
    use serde_json::json;

    fn ages() -> DataSet {
        DataSet::new(
            Schema::new(vec![
                Field::new("name", DataType::Utf8),
                Field::new("age", DataType::Int64),
            ]),
            vec![
                vec![Value::Utf8("Ana".to_string()), Value::Int64(30)],
                vec![Value::Utf8("Beto".to_string()), Value::Null],
                vec![Value::Utf8("Caio".to_string()), Value::Int64(25)],
            ],
        )
    }

    #[test]
    fn small_dataset_summary() {
        let summary = summarize(&ages(), &SummaryOptions::default());
        assert_eq!(summary.shape, [3, 2]);
        assert_eq!(summary.dtypes["age"], "int64");
        assert_eq!(summary.data.len(), 3);
        assert!(!summary.data_truncated);
        assert!(summary.note.is_none());
        assert_eq!(summary.data[1]["age"], JsonValue::Null);
        assert_eq!(
            serde_json::to_value(&summary.unique_values["age"]).unwrap(),
            json!([30, null, 25])
        );
        let counts = &summary.value_counts["age"];
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["30"], 1);
        assert_eq!(counts["25"], 1);
    }

    #[test]
    fn data_cap_marks_truncation() {
        let options = SummaryOptions {
            max_data_rows: Some(2),
            ..SummaryOptions::default()
        };
        let summary = summarize(&ages(), &options);
        assert_eq!(summary.data.len(), 2);
        assert!(summary.data_truncated);
    }

    #[test]
    fn large_dataset_gets_seeded_random_sample() {
        let rows = (0..30).map(|i| vec![Value::Int64(i)]).collect();
        let ds = DataSet::new(Schema::new(vec![Field::new("n", DataType::Int64)]), rows);
        let options = SummaryOptions {
            sampling_threshold: 20,
            random_sample_rows: 10,
            ..SummaryOptions::default()
        };

        let first = summarize(&ds, &options);
        let second = summarize(&ds, &options);
        assert!(first.note.is_some());
        assert_eq!(first.random_sample.as_ref().map(Vec::len), Some(10));
        assert_eq!(first.random_sample, second.random_sample);
    }

    #[test]
    fn ragged_dataset_degrades_to_minimal_summary() {
        let mut ds = ages();
        ds.rows[2].push(Value::Int64(99));
        let summary = summarize(&ds, &SummaryOptions::default());
        assert!(summary.is_degraded());
        assert_eq!(summary.columns, vec!["name", "age"]);
        assert_eq!(summary.data.len(), 3);
        assert_eq!(summary.data[0]["age"], json!("30"));
        assert!(matches!(summary.statistics, Statistics::Unavailable(_)));
    }

    #[test]
    fn non_finite_floats_serialize_as_null() {
        assert_eq!(to_json(&Value::Float64(f64::NAN)), JsonValue::Null);
        assert_eq!(to_json(&Value::Float64(f64::INFINITY)), JsonValue::Null);
        assert_eq!(to_json(&Value::Float64(1.5)), json!(1.5));
    }
}
