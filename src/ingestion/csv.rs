//! Standard (row-oriented) CSV path.
//!
//! Unlike a schema-first reader, this path infers column types from the data:
//!
//! - the text encoding is picked from a 1 KiB sample (see [`detect_encoding`]); input that turns
//!   out not to be UTF-8 past the sample is decoded as latin1
//! - headers are trimmed; blank headers become `Unnamed: <index>`, repeated ones `<name>.<n>`
//! - malformed rows are skipped with an [`Advisory`], short rows are padded with nulls
//! - every column goes through [`infer_column`]: comma decimals are accepted, and a column is
//!   numeric only if *every* non-empty cell parses

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use encoding_rs::{DecoderResult, Encoding, UTF_8, WINDOWS_1252};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::observability::Advisory;

/// Size of the prefix used to pick an encoding.
pub const ENCODING_SAMPLE_BYTES: usize = 1024;

/// Candidate encodings, in preference order. The last one is the fallback.
pub const ENCODING_CANDIDATES: [&str; 3] = ["utf-8", "latin1", "iso-8859-1"];

/// Read a CSV file through the standard path.
pub fn read_csv_from_path(
    path: impl AsRef<Path>,
    advisories: &mut Vec<Advisory>,
) -> IngestionResult<DataSet> {
    let bytes = fs::read(path)?;
    read_csv_from_bytes(&bytes, advisories)
}

/// Read CSV content held in memory (e.g. an upload) through the standard path.
pub fn read_csv_from_bytes(bytes: &[u8], advisories: &mut Vec<Advisory>) -> IngestionResult<DataSet> {
    let text = decode_text(bytes, advisories);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    read_csv_records(&mut rdr, advisories)
}

/// Parse records from an existing CSV reader and infer column types.
///
/// The reader should be `flexible`, otherwise every ragged row surfaces as a skipped-row
/// advisory instead of being padded.
pub fn read_csv_records<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    advisories: &mut Vec<Advisory>,
) -> IngestionResult<DataSet> {
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
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let line = err.position().map(|p| p.line()).unwrap_or(0);
                advisories.push(Advisory::MalformedRowSkipped {
                    line,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() > width {
            advisories.push(Advisory::MalformedRowSkipped {
                line,
                reason: format!("expected {width} fields, saw {}", record.len()),
            });
            continue;
        }

        for (idx, column) in columns.iter_mut().enumerate() {
            let raw = record.get(idx).unwrap_or("");
            column.push(if raw.is_empty() { None } else { Some(raw.to_owned()) });
        }
    }

    let mut fields = Vec::with_capacity(width);
    let mut typed_columns = Vec::with_capacity(width);
    for (name, raw) in headers.into_iter().zip(columns) {
        let (data_type, values) = infer_column(raw);
        fields.push(Field::new(name, data_type));
        typed_columns.push(values);
    }

    Ok(DataSet::new(Schema::new(fields), transpose(typed_columns)))
}

/// Pick the first candidate encoding that decodes the leading [`ENCODING_SAMPLE_BYTES`].
///
/// A multi-byte sequence cut off by the sample boundary does not count as a decode failure.
/// If no candidate decodes, the last candidate is returned.
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, &'static Encoding) {
    let sample_len = bytes.len().min(ENCODING_SAMPLE_BYTES);
    let sample = &bytes[..sample_len];
    let is_partial = sample_len < bytes.len();

    let mut chosen = None;
    for label in ENCODING_CANDIDATES {
        let encoding = Encoding::for_label(label.as_bytes()).unwrap_or(WINDOWS_1252);
        if sample_decodes(encoding, sample, is_partial) {
            chosen = Some((label, encoding));
            break;
        }
    }

    chosen.unwrap_or_else(|| {
        let label = ENCODING_CANDIDATES[ENCODING_CANDIDATES.len() - 1];
        (label, Encoding::for_label(label.as_bytes()).unwrap_or(WINDOWS_1252))
    })
}

fn sample_decodes(encoding: &'static Encoding, sample: &[u8], is_partial: bool) -> bool {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf8_buffer_length_without_replacement(sample.len())
        .unwrap_or(sample.len() * 3 + 16);
    let mut out = String::with_capacity(capacity);
    let (result, _read) = decoder.decode_to_string_without_replacement(sample, &mut out, !is_partial);
    matches!(result, DecoderResult::InputEmpty)
}

/// Decode CSV bytes with the detected encoding.
///
/// When the sample passed as UTF-8 but a later byte does not, the whole input is decoded as
/// latin1 instead. Any non-UTF-8 result is reported as an [`Advisory::EncodingFallback`].
pub(crate) fn decode_text(bytes: &[u8], advisories: &mut Vec<Advisory>) -> String {
    let (label, encoding) = detect_encoding(bytes);
    let body = if encoding == UTF_8 {
        bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
    } else {
        bytes
    };

    if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(body) {
        if encoding != UTF_8 {
            advisories.push(Advisory::EncodingFallback { encoding: label });
        }
        return text.into_owned();
    }

    advisories.push(Advisory::EncodingFallback {
        encoding: ENCODING_CANDIDATES[1],
    });
    WINDOWS_1252.decode_without_bom_handling(body).0.into_owned()
}

/// Trim a header; blank headers get a positional name.
pub(crate) fn normalize_header(idx: usize, raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("Unnamed: {idx}")
    } else {
        trimmed.to_owned()
    }
}

/// Rename repeated headers to `<name>.1`, `<name>.2`, ... in column order.
///
/// A generated name that collides with a later header keeps counting up.
pub(crate) fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = headers.iter().cloned().collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(headers.len());

    for name in headers {
        if seen.insert(name.clone()) {
            out.push(name);
            continue;
        }
        let count = counts.entry(name.clone()).or_insert(0);
        let candidate = loop {
            *count += 1;
            let candidate = format!("{name}.{count}");
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(candidate.clone());
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Infer the type of a column of raw text cells (`None` = empty cell).
///
/// - numeric if every non-empty cell parses after replacing `,` with `.`
///   (`Int64` when all are integers, `Float64` otherwise)
/// - `Bool` if every non-empty cell is `true`/`false` (case-insensitive)
/// - `Utf8` otherwise, with the original text untouched
pub fn infer_column(raw: Vec<Option<String>>) -> (DataType, Vec<Value>) {
    if let Some(numbers) = coerce_numeric(&raw) {
        return numbers;
    }

    let all_bool = raw
        .iter()
        .flatten()
        .all(|s| parse_bool(s).is_some());
    if all_bool && raw.iter().any(Option::is_some) {
        let values = raw
            .iter()
            .map(|c| c.as_deref().and_then(parse_bool).map(Value::Bool).unwrap_or(Value::Null))
            .collect();
        return (DataType::Bool, values);
    }

    let values = raw
        .into_iter()
        .map(|c| c.map(Value::Utf8).unwrap_or(Value::Null))
        .collect();
    (DataType::Utf8, values)
}

/// Locale-aware numeric coercion of a whole column; `None` if any non-empty cell fails.
fn coerce_numeric(raw: &[Option<String>]) -> Option<(DataType, Vec<Value>)> {
    if raw.iter().all(Option::is_none) {
        return None;
    }

    let mut ints: Vec<Option<i64>> = Vec::with_capacity(raw.len());
    let mut all_int = true;
    for cell in raw {
        match cell {
            None => ints.push(None),
            Some(s) => {
                let normalized = normalize_number(s)?;
                match normalized.parse::<i64>() {
                    Ok(v) if all_int => ints.push(Some(v)),
                    Ok(_) => {}
                    Err(_) => {
                        normalized.parse::<f64>().ok()?;
                        all_int = false;
                    }
                }
            }
        }
    }

    if all_int {
        let values = ints
            .into_iter()
            .map(|v| v.map(Value::Int64).unwrap_or(Value::Null))
            .collect();
        return Some((DataType::Int64, values));
    }

    let values = raw
        .iter()
        .map(|cell| {
            cell.as_deref()
                .and_then(normalize_number)
                .and_then(|s| s.parse::<f64>().ok())
                .map(Value::Float64)
                .unwrap_or(Value::Null)
        })
        .collect();
    Some((DataType::Float64, values))
}

fn normalize_number(s: &str) -> Option<String> {
    let trimmed = s.trim();
    // Reject "inf"/"nan"-style words that `f64::from_str` would otherwise accept.
    if !trimmed.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(trimmed.replace(',', "."))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Run [`infer_column`] over the text columns of an already-typed dataset.
///
/// The columnar path reads every CSV column as text and types it here, so both paths share
/// one inference rule.
pub(crate) fn infer_text_columns(dataset: DataSet) -> DataSet {
    let DataSet { schema, rows } = dataset;
    let width = schema.fields.len();
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); width];
    for row in rows {
        for (idx, value) in row.into_iter().enumerate().take(width) {
            columns[idx].push(value);
        }
    }

    let mut fields = Vec::with_capacity(width);
    for (field, column) in schema.fields.into_iter().zip(columns.iter_mut()) {
        if field.data_type != DataType::Utf8 {
            fields.push(field);
            continue;
        }
        let raw: Vec<Option<String>> = column
            .drain(..)
            .map(|v| match v {
                Value::Utf8(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .collect();
        let (data_type, values) = infer_column(raw);
        *column = values;
        fields.push(Field::new(field.name, data_type));
    }

    DataSet::new(Schema::new(fields), transpose(columns))
}

pub(crate) fn transpose(columns: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    let height = columns.first().map(Vec::len).unwrap_or(0);
    let mut rows: Vec<Vec<Value>> = (0..height)
        .map(|_| Vec::with_capacity(columns.len()))
        .collect();
    for column in columns {
        for (row, value) in rows.iter_mut().zip(column) {
            row.push(value);
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(input: &str) -> (DataSet, Vec<Advisory>) {
        let mut advisories = Vec::new();
        let ds = read_csv_from_bytes(input.as_bytes(), &mut advisories).unwrap();
        (ds, advisories)
    }

    #[test]
    fn spec_example_coerces_age_with_null() {
        let (ds, advisories) = read("name,age\nAna,30\nBeto,\nCaio,25");
        assert!(advisories.is_empty());
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.schema.fields[1], Field::new("age", DataType::Int64));
        assert_eq!(
            ds.column_values(1).cloned().collect::<Vec<_>>(),
            vec![Value::Int64(30), Value::Null, Value::Int64(25)]
        );
    }

    #[test]
    fn comma_decimals_become_floats() {
        let (ds, _) = read("price\n\"1,5\"\n2\n\"3,25\"\n");
        assert_eq!(ds.schema.fields[0].data_type, DataType::Float64);
        assert_eq!(ds.rows[0][0], Value::Float64(1.5));
        assert_eq!(ds.rows[1][0], Value::Float64(2.0));
        assert_eq!(ds.rows[2][0], Value::Float64(3.25));
    }

    #[test]
    fn partially_numeric_column_is_left_as_text() {
        let (ds, _) = read("code\n10\nA7\n12\n");
        assert_eq!(ds.schema.fields[0].data_type, DataType::Utf8);
        assert_eq!(ds.rows[0][0], Value::Utf8("10".to_string()));
        assert_eq!(ds.rows[1][0], Value::Utf8("A7".to_string()));
    }

    #[test]
    fn nan_and_inf_words_are_not_numbers() {
        let (ds, _) = read("x\nnan\ninf\n");
        assert_eq!(ds.schema.fields[0].data_type, DataType::Utf8);
    }

    #[test]
    fn headers_are_trimmed_and_blank_headers_named() {
        let (ds, _) = read(" id ,,name\n1,x,Ada\n");
        assert_eq!(
            ds.schema.field_names().collect::<Vec<_>>(),
            vec!["id", "Unnamed: 1", "name"]
        );
    }

    #[test]
    fn long_rows_are_skipped_and_short_rows_padded() {
        let (ds, advisories) = read("a,b\n1,2\n3,4,5\n6\n");
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.rows[1], vec![Value::Int64(6), Value::Null]);
        assert_eq!(advisories.len(), 1);
        assert!(matches!(
            &advisories[0],
            Advisory::MalformedRowSkipped { line: 3, .. }
        ));
    }

    #[test]
    fn bool_columns_are_inferred() {
        let (ds, _) = read("active\ntrue\nFALSE\n\n");
        assert_eq!(ds.schema.fields[0].data_type, DataType::Bool);
        assert_eq!(ds.rows[1][0], Value::Bool(false));
    }

    #[test]
    fn utf8_is_preferred_when_sample_decodes() {
        let (label, encoding) = detect_encoding("nome,cidade\nJoão,São Paulo\n".as_bytes());
        assert_eq!(label, "utf-8");
        assert_eq!(encoding, UTF_8);
    }

    #[test]
    fn latin1_is_used_when_utf8_fails() {
        // "São" in latin1: 0xE3 is not valid UTF-8 on its own.
        let bytes = b"cidade\nS\xE3o Paulo\n".to_vec();
        let mut advisories = Vec::new();
        let ds = read_csv_from_bytes(&bytes, &mut advisories).unwrap();
        assert_eq!(ds.rows[0][0], Value::Utf8("São Paulo".to_string()));
        assert_eq!(advisories, vec![Advisory::EncodingFallback { encoding: "latin1" }]);
    }

    #[test]
    fn multibyte_char_cut_by_sample_boundary_still_counts_as_utf8() {
        let mut bytes = vec![b'a'; ENCODING_SAMPLE_BYTES - 1];
        bytes.extend_from_slice("é".as_bytes());
        let (label, _) = detect_encoding(&bytes);
        assert_eq!(label, "utf-8");
    }

    #[test]
    fn empty_input_is_a_parse_error() {
        let mut advisories = Vec::new();
        let err = read_csv_from_bytes(b"", &mut advisories).unwrap_err();
        assert!(err.is_parse_error());
        assert!(err.to_string().contains("no columns to parse"));
    }

    #[test]
    fn infer_text_columns_matches_standard_inference() {
        let ds = DataSet::new(
            Schema::new(vec![
                Field::new("v", DataType::Utf8),
                Field::new("flag", DataType::Utf8),
                Field::new("label", DataType::Utf8),
            ]),
            vec![
                vec![
                    Value::Utf8("1,5".to_string()),
                    Value::Utf8("true".to_string()),
                    Value::Utf8(String::new()),
                ],
                vec![Value::Null, Value::Utf8("False".to_string()), Value::Utf8("x".to_string())],
            ],
        );
        let out = infer_text_columns(ds);
        assert_eq!(out.schema.fields[0].data_type, DataType::Float64);
        assert_eq!(out.schema.fields[1].data_type, DataType::Bool);
        assert_eq!(out.schema.fields[2].data_type, DataType::Utf8);
        assert_eq!(
            out.rows,
            vec![
                vec![Value::Float64(1.5), Value::Bool(true), Value::Null],
                vec![Value::Null, Value::Bool(false), Value::Utf8("x".to_string())],
            ]
        );
    }

    #[test]
    fn repeated_headers_get_numeric_suffixes() {
        let (ds, _) = read("a,a\n1,x\n2,y\n");
        assert_eq!(ds.schema.field_names().collect::<Vec<_>>(), vec!["a", "a.1"]);
        assert_eq!(ds.schema.fields[0].data_type, DataType::Int64);
        assert_eq!(ds.rows[1], vec![Value::Int64(2), Value::Utf8("y".to_string())]);

        let names = dedupe_headers(
            ["a", "a", "a.1", "a"].iter().map(|s| s.to_string()).collect(),
        );
        assert_eq!(names, vec!["a", "a.2", "a.1", "a.3"]);
    }

    #[test]
    fn latin1_after_the_sample_falls_back_to_latin1() {
        let mut bytes = b"cidade\n".to_vec();
        bytes.extend(std::iter::repeat_n(b"Recife\n".as_slice(), 200).flatten());
        bytes.extend_from_slice(b"S\xE3o Paulo\n");
        assert!(bytes.len() > ENCODING_SAMPLE_BYTES);

        let mut advisories = Vec::new();
        let ds = read_csv_from_bytes(&bytes, &mut advisories).unwrap();
        assert_eq!(ds.row_count(), 201);
        assert_eq!(ds.rows[200][0], Value::Utf8("São Paulo".to_string()));
        assert_eq!(advisories, vec![Advisory::EncodingFallback { encoding: "latin1" }]);
    }
}
