use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::types::{DataType, Value, ValueKey};

use super::to_json;

/// Distinct values of a column, or a placeholder when there are too many to list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UniqueValues {
    /// Distinct values in first-occurrence order; null appears once if present.
    Values(Vec<JsonValue>),
    /// `"<n> unique values (too many to list)"`.
    Elided(String),
}

/// Distinct values of a column in first-occurrence order.
///
/// When the column has more than `cap` distinct non-null values, the list is replaced by a
/// placeholder that only reports the count.
pub fn unique_catalog<'a>(values: impl Iterator<Item = &'a Value>, cap: usize) -> UniqueValues {
    let mut seen: HashSet<ValueKey> = HashSet::new();
    let mut listed: Vec<JsonValue> = Vec::new();
    let mut non_null = 0usize;

    for value in values {
        let key = value.key();
        if seen.contains(&key) {
            continue;
        }
        if key != ValueKey::Null {
            non_null += 1;
        }
        if non_null <= cap {
            listed.push(to_json(value));
        }
        seen.insert(key);
    }

    if non_null > cap {
        UniqueValues::Elided(format!("{non_null} unique values (too many to list)"))
    } else {
        UniqueValues::Values(listed)
    }
}

/// Top value counts of a column, keyed by the value's text.
///
/// Only computed for text columns and for columns with fewer than `distinct_limit` distinct
/// non-null values. Nulls are excluded. Entries are ordered by descending count; ties keep
/// first-occurrence order. Returns `None` when the column is not eligible or has no values.
pub fn frequency_table<'a>(
    values: impl Iterator<Item = &'a Value>,
    data_type: DataType,
    distinct_limit: usize,
    top_k: usize,
) -> Option<IndexMap<String, usize>> {
    // key -> (first occurrence, count, representative value)
    let mut counts: HashMap<ValueKey, (usize, usize, &'a Value)> = HashMap::new();
    for (pos, value) in values.enumerate() {
        if value.is_null() {
            continue;
        }
        counts
            .entry(value.key())
            .and_modify(|entry| entry.1 += 1)
            .or_insert((pos, 1, value));
    }

    if counts.is_empty() {
        return None;
    }
    if data_type != DataType::Utf8 && counts.len() >= distinct_limit {
        return None;
    }

    let mut entries: Vec<(usize, usize, &Value)> = counts.into_values().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut table = IndexMap::with_capacity(entries.len().min(top_k));
    for (_, count, value) in entries.into_iter().take(top_k) {
        // Distinct keys can share a display string (e.g. 1.0 and 1 in a mixed column).
        *table.entry(value.to_display_string()).or_insert(0) += count;
    }
    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ints(values: impl IntoIterator<Item = i64>) -> Vec<Value> {
        values.into_iter().map(Value::Int64).collect()
    }

    #[test]
    fn catalog_lists_up_to_cap() {
        let values = ints(0..999);
        match unique_catalog(values.iter(), 1_000) {
            UniqueValues::Values(list) => assert_eq!(list.len(), 999),
            other => panic!("expected full list, got {other:?}"),
        }
    }

    #[test]
    fn catalog_elides_above_cap() {
        let values = ints(0..1_001);
        assert_eq!(
            unique_catalog(values.iter(), 1_000),
            UniqueValues::Elided("1001 unique values (too many to list)".to_string())
        );
    }

    #[test]
    fn catalog_keeps_first_occurrence_and_single_null() {
        let values = vec![
            Value::Utf8("b".to_string()),
            Value::Null,
            Value::Utf8("a".to_string()),
            Value::Float64(f64::NAN),
            Value::Utf8("b".to_string()),
        ];
        assert_eq!(
            serde_json::to_value(unique_catalog(values.iter(), 10)).unwrap(),
            json!(["b", null, "a"])
        );
    }

    #[test]
    fn frequency_orders_by_count_then_first_seen() {
        let values: Vec<Value> = ["x", "y", "z", "y", "z", "w"]
            .into_iter()
            .map(|s| Value::Utf8(s.to_string()))
            .collect();
        let table = frequency_table(values.iter(), DataType::Utf8, 50, 50).unwrap();
        assert_eq!(
            table.into_iter().collect::<Vec<_>>(),
            vec![
                ("y".to_string(), 2),
                ("z".to_string(), 2),
                ("x".to_string(), 1),
                ("w".to_string(), 1),
            ]
        );
    }

    #[test]
    fn frequency_rules_by_type_and_cardinality() {
        let text: Vec<Value> = (0..200).map(|i| Value::Utf8(format!("v{i}"))).collect();
        let table = frequency_table(text.iter(), DataType::Utf8, 50, 50).unwrap();
        assert_eq!(table.len(), 50);

        let many = ints(0..60);
        assert!(frequency_table(many.iter(), DataType::Int64, 50, 50).is_none());

        let few = ints((0..100).map(|i| i % 10));
        let table = frequency_table(few.iter(), DataType::Int64, 50, 50).unwrap();
        assert_eq!(table.len(), 10);
        assert_eq!(table["0"], 10);
    }

    #[test]
    fn all_null_column_has_no_frequency_table() {
        let values = vec![Value::Null, Value::Null];
        assert!(frequency_table(values.iter(), DataType::Utf8, 50, 50).is_none());
    }
}
