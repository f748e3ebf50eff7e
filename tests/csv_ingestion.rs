use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tabular_insight::ingestion::csv::{read_csv_from_bytes, read_csv_from_path};
use tabular_insight::ingestion::{
    load_with_report, Advisory, IngestionOptions, IngestionPolicy, LoadReport, ParsePath, Source,
    SourceFormat,
};
use tabular_insight::types::{DataType, Value};

fn tmp_file(name: &str, contents: &[u8]) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = std::env::temp_dir().join(format!("tabular-insight-{name}-{nanos}.csv"));
    std::fs::write(&path, contents).unwrap();
    path
}

fn types(ds: &tabular_insight::types::DataSet) -> Vec<DataType> {
    ds.schema.fields.iter().map(|f| f.data_type).collect()
}

#[test]
fn read_csv_infers_types_and_nulls() {
    let mut advisories = Vec::new();
    let ds = read_csv_from_path("tests/fixtures/people.csv", &mut advisories).unwrap();

    assert!(advisories.is_empty());
    assert_eq!(ds.row_count(), 3);
    assert_eq!(types(&ds), vec![DataType::Utf8, DataType::Int64]);
    assert_eq!(ds.rows[1], vec![Value::Utf8("Beto".to_string()), Value::Null]);
}

#[test]
fn read_csv_accepts_comma_decimals() {
    let mut advisories = Vec::new();
    let ds = read_csv_from_path("tests/fixtures/scores.csv", &mut advisories).unwrap();

    assert_eq!(
        types(&ds),
        vec![
            DataType::Int64,
            DataType::Utf8,
            DataType::Int64,
            DataType::Float64,
            DataType::Bool,
            DataType::Utf8,
        ]
    );
    assert_eq!(ds.rows[0][3], Value::Float64(7.5));
    assert_eq!(ds.rows[1][4], Value::Bool(false));
}

#[test]
fn latin1_input_decodes_with_advisory() {
    // "São Paulo" in latin1.
    let bytes = b"city,total\nS\xe3o Paulo,10\n";
    let mut advisories = Vec::new();
    let ds = read_csv_from_bytes(bytes, &mut advisories).unwrap();

    assert_eq!(ds.rows[0][0], Value::Utf8("São Paulo".to_string()));
    assert_eq!(advisories, vec![Advisory::EncodingFallback { encoding: "latin1" }]);
}

#[test]
fn overlong_rows_are_skipped_with_advisory() {
    let mut advisories = Vec::new();
    let ds = read_csv_from_bytes(b"a,b\n1,2\n3,4,5\n6\n", &mut advisories).unwrap();

    assert_eq!(ds.row_count(), 2);
    assert_eq!(ds.rows[1], vec![Value::Int64(6), Value::Null]);
    assert_eq!(advisories.len(), 1);
    assert!(matches!(advisories[0], Advisory::MalformedRowSkipped { line: 3, .. }));
}

#[test]
fn empty_input_is_a_parse_error() {
    let mut advisories = Vec::new();
    let err = read_csv_from_bytes(b"", &mut advisories).unwrap_err();
    assert!(err.is_parse_error());
    assert!(err.to_string().contains("no columns to parse"));
}

#[test]
fn file_exactly_at_threshold_takes_columnar_path() {
    let contents = std::fs::read("tests/fixtures/scores.csv").unwrap();
    let path = tmp_file("threshold", &contents);
    let size = contents.len() as u64;

    let at = IngestionOptions {
        policy: IngestionPolicy {
            large_file_threshold: size,
        },
        ..Default::default()
    };
    let report = load_with_report(&Source::Path(path.clone()), &at).unwrap();
    assert_eq!(report.format, SourceFormat::Csv);
    assert_eq!(report.parse_path, ParsePath::Columnar);

    let above = IngestionOptions {
        policy: IngestionPolicy {
            large_file_threshold: size + 1,
        },
        ..Default::default()
    };
    let report = load_with_report(&Source::Path(path.clone()), &above).unwrap();
    assert_eq!(report.parse_path, ParsePath::Standard);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn standard_and_columnar_paths_agree() {
    let source = Source::path("tests/fixtures/scores.csv");
    let standard = load_with_report(&source, &IngestionOptions::default()).unwrap();
    let columnar = load_with_report(
        &source,
        &IngestionOptions {
            size_hint: Some(u64::MAX),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(standard.parse_path, ParsePath::Standard);
    assert_eq!(columnar.parse_path, ParsePath::Columnar);
    assert_eq!(standard.dataset.schema, columnar.dataset.schema);
    assert_eq!(standard.dataset.row_count(), columnar.dataset.row_count());
    assert_eq!(standard.dataset.rows, columnar.dataset.rows);
}

fn load_both_ways(path: &std::path::Path) -> (LoadReport, LoadReport) {
    let source = Source::Path(path.to_path_buf());
    let standard = load_with_report(&source, &IngestionOptions::default()).unwrap();
    let columnar = load_with_report(
        &source,
        &IngestionOptions {
            size_hint: Some(u64::MAX),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(standard.parse_path, ParsePath::Standard);
    assert_eq!(columnar.parse_path, ParsePath::Columnar);
    (standard, columnar)
}

#[test]
fn paths_agree_on_late_type_change_and_ragged_rows() {
    // 250 integer rows push the text cell past any leading-rows inference window.
    let mut contents = String::from("id,code,note\n");
    for i in 0..250 {
        contents.push_str(&format!("{i},{},n{i}\n", i * 10));
    }
    contents.push_str("250,abc,late\n");
    contents.push_str("251,7,extra,field\n");
    contents.push_str("252,8\n");
    let path = tmp_file("late-type", contents.as_bytes());

    let (standard, columnar) = load_both_ways(&path);
    assert_eq!(
        types(&standard.dataset),
        vec![DataType::Int64, DataType::Utf8, DataType::Utf8]
    );
    assert_eq!(standard.dataset.row_count(), 252);
    assert_eq!(standard.dataset.rows[251][2], Value::Null);
    assert_eq!(standard.dataset.schema, columnar.dataset.schema);
    assert_eq!(standard.dataset.rows, columnar.dataset.rows);
    assert_eq!(standard.advisories, columnar.advisories);
    assert!(matches!(
        standard.advisories[..],
        [Advisory::MalformedRowSkipped { line: 253, .. }]
    ));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn paths_agree_on_latin1_and_repeated_headers() {
    let mut contents = b"cidade,cidade,total\n".to_vec();
    for i in 0..150 {
        contents.extend_from_slice(format!("Recife,PE,{i}\n").as_bytes());
    }
    contents.extend_from_slice(b"S\xe3o Paulo,SP,\"1,5\"\n");
    let path = tmp_file("latin1-dupes", &contents);

    let (standard, columnar) = load_both_ways(&path);
    assert_eq!(
        standard.dataset.schema.field_names().collect::<Vec<_>>(),
        vec!["cidade", "cidade.1", "total"]
    );
    assert_eq!(standard.dataset.schema.fields[2].data_type, DataType::Float64);
    assert_eq!(
        standard.dataset.rows[150][0],
        Value::Utf8("São Paulo".to_string())
    );
    assert_eq!(standard.dataset.schema, columnar.dataset.schema);
    assert_eq!(standard.dataset.rows, columnar.dataset.rows);
    assert_eq!(
        columnar.advisories,
        vec![Advisory::EncodingFallback { encoding: "latin1" }]
    );

    let _ = std::fs::remove_file(&path);
}

#[test]
fn uploads_are_routed_by_name() {
    let bytes = std::fs::read("tests/fixtures/people.csv").unwrap();
    let report = load_with_report(
        &Source::Upload {
            name: "people.CSV".to_string(),
            bytes,
        },
        &IngestionOptions::default(),
    )
    .unwrap();
    assert_eq!(report.format, SourceFormat::Csv);
    assert_eq!(report.parse_path, ParsePath::Standard);
    assert_eq!(report.dataset.row_count(), 3);
}

#[test]
fn unknown_extension_is_rejected() {
    let err = load_with_report(&Source::path("notes.txt"), &IngestionOptions::default()).unwrap_err();
    assert!(err.to_string().contains("unsupported format"));
}
