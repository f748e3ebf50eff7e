//! Core data model types.
//!
//! Every source (CSV, Excel, XML, SQL result) is normalized into an in-memory [`DataSet`]: an
//! ordered list of typed [`Field`]s (the [`Schema`]) plus row-major [`Value`] storage.

use chrono::NaiveDateTime;

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
    /// Timestamp without timezone.
    DateTime,
}

impl DataType {
    /// Short type tag used in summaries and prompts.
    pub fn tag(self) -> &'static str {
        match self {
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Bool => "bool",
            DataType::Utf8 => "text",
            DataType::DateTime => "datetime",
        }
    }

    /// Returns `true` for `Int64` and `Float64`.
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of fields describing the shape of a [`DataSet`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Timestamp without timezone.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Returns `true` for [`Value::Null`] and for `NaN` floats.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value (`Int64` and `Float64` only).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Hashable identity of the value, used for distinct counts and frequency tables.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Int64(v) => ValueKey::Int64(*v),
            Value::Float64(v) if v.is_nan() => ValueKey::Null,
            // Normalize -0.0 so it groups with 0.0.
            Value::Float64(v) => ValueKey::Float64((v + 0.0).to_bits()),
            Value::Bool(v) => ValueKey::Bool(*v),
            Value::Utf8(s) => ValueKey::Utf8(s.clone()),
            Value::DateTime(d) => ValueKey::DateTime(*d),
        }
    }

    /// Human-readable rendering (nulls render as an empty string).
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int64(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Utf8(s) => s.clone(),
            Value::DateTime(d) => d.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        }
    }
}

/// Hashable, totally comparable identity of a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Int64(i64),
    Float64(u64),
    Bool(bool),
    Utf8(String),
    DateTime(NaiveDateTime),
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields. Every row is
/// expected to carry exactly one value per field; [`DataSet::validate_shape`] checks this.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the dataset.
    pub fn column_count(&self) -> usize {
        self.schema.fields.len()
    }

    /// Returns the first row whose length differs from the schema, as `(row_index, len)`.
    pub fn validate_shape(&self) -> Result<(), (usize, usize)> {
        let expected = self.column_count();
        match self.rows.iter().position(|r| r.len() != expected) {
            Some(idx) => Err((idx, self.rows[idx].len())),
            None => Ok(()),
        }
    }

    /// Iterate the values of column `idx` in row order.
    ///
    /// Rows that are too short yield [`Value::Null`].
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        static NULL: Value = Value::Null;
        self.rows.iter().map(move |r| r.get(idx).unwrap_or(&NULL))
    }

    /// Create a new dataset containing only rows that match `predicate`.
    ///
    /// The returned dataset preserves the original schema.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Create a new dataset keeping only the columns at `indices` (in that order).
    pub fn select_columns(&self, indices: &[usize]) -> Self {
        let fields = indices
            .iter()
            .filter_map(|&i| self.schema.fields.get(i).cloned())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self::new(Schema::new(fields), rows)
    }

    /// Drop rows where every value is null.
    pub fn without_empty_rows(&self) -> Self {
        self.filter_rows(|row| row.iter().any(|v| !v.is_null()))
    }

    /// Drop columns where every value is null.
    pub fn without_empty_columns(&self) -> Self {
        let keep: Vec<usize> = (0..self.column_count())
            .filter(|&i| self.column_values(i).any(|v| !v.is_null()))
            .collect();
        if keep.len() == self.column_count() {
            return self.clone();
        }
        self.select_columns(&keep)
    }

    /// Returns the first `n` rows as a new dataset.
    pub fn head(&self, n: usize) -> Self {
        Self::new(
            self.schema.clone(),
            self.rows.iter().take(n).cloned().collect(),
        )
    }
}
