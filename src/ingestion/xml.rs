//! XML record extraction.
//!
//! Every element below the document root is treated as a candidate record, at any depth. A
//! record's fields are:
//!
//! - its own trimmed text, keyed by its tag name, when non-empty
//! - the trimmed text of each direct child element, keyed by the child's tag name
//! - each attribute, keyed as `<tag>_<attribute>`
//!
//! Nested structures therefore show up twice: once as the parent record (with the child's
//! text as a field) and once as the child's own record. Candidates with no fields are dropped.
//! When nothing is left, a single-row placeholder dataset is returned instead.

use std::fs;
use std::path::Path;

use encoding_rs::WINDOWS_1252;
use indexmap::IndexMap;
use roxmltree::{Document, Node, ParsingOptions};

use crate::error::IngestionResult;
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::observability::Advisory;

/// Column name of the placeholder dataset.
pub const PLACEHOLDER_COLUMN: &str = "message";

/// Text of the placeholder dataset.
pub const PLACEHOLDER_TEXT: &str = "no structured data found in XML";

/// Read an XML file into a dataset.
pub fn read_xml_from_path(
    path: impl AsRef<Path>,
    advisories: &mut Vec<Advisory>,
) -> IngestionResult<DataSet> {
    let bytes = fs::read(path)?;
    read_xml_from_bytes(&bytes, advisories)
}

/// Read XML content held in memory into a dataset.
///
/// Input that is not UTF-8 is decoded as latin1 (with an advisory).
pub fn read_xml_from_bytes(bytes: &[u8], advisories: &mut Vec<Advisory>) -> IngestionResult<DataSet> {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = match std::str::from_utf8(body) {
        Ok(s) => s.to_owned(),
        Err(_) => {
            advisories.push(Advisory::EncodingFallback { encoding: "latin1" });
            WINDOWS_1252.decode_without_bom_handling(body).0.into_owned()
        }
    };
    read_xml_str(&text)
}

/// Parse an XML document held as a string.
pub fn read_xml_str(text: &str) -> IngestionResult<DataSet> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(text, options)?;
    let root = doc.root_element();

    let mut records: Vec<IndexMap<String, String>> = root
        .descendants()
        .filter(|n| n.is_element() && *n != root)
        .map(element_record)
        .collect();
    if records.is_empty() {
        records = root.children().filter(Node::is_element).map(element_record).collect();
    }

    Ok(records_to_dataset(records))
}

fn element_record(node: Node<'_, '_>) -> IndexMap<String, String> {
    let mut record = IndexMap::new();

    if let Some(text) = node.text().map(str::trim).filter(|t| !t.is_empty()) {
        record.insert(node.tag_name().name().to_owned(), text.to_owned());
    }
    for child in node.children().filter(Node::is_element) {
        let text = child.text().map(str::trim).unwrap_or("");
        record.insert(child.tag_name().name().to_owned(), text.to_owned());
    }
    let tag = node.tag_name().name();
    for attr in node.attributes() {
        record.insert(format!("{tag}_{}", attr.name()), attr.value().to_owned());
    }

    record
}

fn records_to_dataset(records: Vec<IndexMap<String, String>>) -> DataSet {
    let mut columns: IndexMap<String, ()> = IndexMap::new();
    for record in records.iter().filter(|r| !r.is_empty()) {
        for key in record.keys() {
            columns.entry(key.clone()).or_default();
        }
    }

    let rows: Vec<Vec<Value>> = records
        .iter()
        .filter(|r| !r.is_empty())
        .map(|record| {
            columns
                .keys()
                .map(|col| match record.get(col) {
                    Some(v) if !v.is_empty() => Value::Utf8(v.clone()),
                    _ => Value::Null,
                })
                .collect()
        })
        .collect();

    let fields = columns
        .into_keys()
        .map(|name| Field::new(name, DataType::Utf8))
        .collect();
    let dataset = DataSet::new(Schema::new(fields), rows).without_empty_rows();

    if dataset.row_count() == 0 {
        return placeholder();
    }
    dataset
}

/// The single-row dataset returned when an XML document yields no records.
pub fn placeholder() -> DataSet {
    DataSet::new(
        Schema::new(vec![Field::new(PLACEHOLDER_COLUMN, DataType::Utf8)]),
        vec![vec![Value::Utf8(PLACEHOLDER_TEXT.to_string())]],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(v: &str) -> Value {
        Value::Utf8(v.to_string())
    }

    #[test]
    fn flat_records_with_attributes() {
        let xml = r#"<people>
            <person id="1"><name>Ana</name><age>30</age></person>
            <person id="2"><name>Beto</name><age></age></person>
        </people>"#;
        let ds = read_xml_str(xml).unwrap();

        assert_eq!(
            ds.schema.field_names().collect::<Vec<_>>(),
            vec!["name", "age", "person_id"]
        );
        // person records plus leaf records for name/age.
        assert_eq!(ds.rows[0], vec![text("Ana"), text("30"), text("1")]);
        assert_eq!(ds.rows[1], vec![text("Ana"), Value::Null, Value::Null]);
        assert!(ds.rows.contains(&vec![text("Beto"), Value::Null, text("2")]));
    }

    #[test]
    fn attribute_keys_do_not_collide_with_children() {
        let ds = read_xml_str(r#"<items><item id="1"><id>9</id></item></items>"#).unwrap();
        assert_eq!(ds.schema.field_names().collect::<Vec<_>>(), vec!["id", "item_id"]);
        assert_eq!(ds.rows[0], vec![text("9"), text("1")]);
    }

    #[test]
    fn nested_children_are_counted_twice() {
        let xml = "<root><a><b>x</b></a></root>";
        let ds = read_xml_str(xml).unwrap();
        assert_eq!(ds.schema.field_names().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(ds.rows, vec![vec![text("x")], vec![text("x")]]);
    }

    #[test]
    fn empty_document_yields_placeholder() {
        let ds = read_xml_str("<root/>").unwrap();
        assert_eq!(ds, placeholder());

        let ds = read_xml_str("<root><empty/><empty></empty></root>").unwrap();
        assert_eq!(ds.row_count(), 1);
        assert_eq!(ds.rows[0][0], text(PLACEHOLDER_TEXT));
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let err = read_xml_str("<root><a></root>").unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn latin1_bytes_are_decoded() {
        let mut advisories = Vec::new();
        let ds = read_xml_from_bytes(b"<r><c>S\xE3o</c></r>", &mut advisories).unwrap();
        assert_eq!(ds.rows[0][0], text("São"));
        assert_eq!(advisories, vec![Advisory::EncodingFallback { encoding: "latin1" }]);
    }
}
