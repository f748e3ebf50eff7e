use serde_json::json;
use tabular_insight::ingestion::{load, IngestionOptions, Source};
use tabular_insight::summary::{summarize, SummaryOptions};
use tabular_insight::types::{DataSet, DataType, Field, Schema, Value};

#[test]
fn people_csv_summary_matches_expected_catalogs() {
    let ds = load(&Source::path("tests/fixtures/people.csv"), &IngestionOptions::default()).unwrap();
    assert_eq!(ds.row_count(), 3);
    assert_eq!(ds.schema.fields[1].data_type, DataType::Int64);

    let summary = summarize(&ds, &SummaryOptions::default());
    assert!(!summary.is_degraded());
    assert_eq!(summary.shape, [3, 2]);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["unique_values"]["age"], json!([30, null, 25]));
    assert_eq!(json["value_counts"]["age"], json!({"30": 1, "25": 1}));
    assert_eq!(json["dtypes"]["age"], json!("int64"));
    assert_eq!(json["data"][1], json!({"name": "Beto", "age": null}));
    assert_eq!(json["statistics"]["age"]["count"], json!(2));
}

#[test]
fn summary_json_never_contains_nan() {
    let ds = DataSet::new(
        Schema::new(vec![
            Field::new("x", DataType::Float64),
            Field::new("when", DataType::DateTime),
        ]),
        vec![
            vec![
                Value::Float64(f64::NAN),
                Value::DateTime(
                    chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                        .unwrap()
                        .and_hms_opt(12, 30, 0)
                        .unwrap(),
                ),
            ],
            vec![Value::Float64(f64::INFINITY), Value::Null],
            vec![Value::Float64(1.5), Value::Null],
        ],
    );

    let text = summarize(&ds, &SummaryOptions::default()).to_json_pretty();
    assert!(!text.contains("NaN"));
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["data"][0]["x"], serde_json::Value::Null);
    assert_eq!(json["data"][0]["when"], json!("2024-03-01T12:30:00"));
}

#[test]
fn large_dataset_gets_note_sample_and_capped_data() {
    let rows: Vec<Vec<Value>> = (0..12_000i64)
        .map(|i| vec![Value::Int64(i), Value::Utf8(format!("item-{}", i % 7))])
        .collect();
    let ds = DataSet::new(
        Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("group", DataType::Utf8),
        ]),
        rows,
    );
    let options = SummaryOptions {
        max_data_rows: Some(500),
        ..SummaryOptions::default()
    };

    let summary = summarize(&ds, &options);
    assert_eq!(summary.shape, [12_000, 2]);
    assert_eq!(summary.data.len(), 500);
    assert!(summary.data_truncated);
    assert!(summary.note.as_deref().unwrap_or("").contains("12000"));
    assert_eq!(summary.random_sample.as_ref().map(Vec::len), Some(1_000));
    assert_eq!(summary.sample.len(), 5);
    // 12k distinct ids exceed the catalog cap.
    assert!(serde_json::to_value(&summary.unique_values["id"]).unwrap().is_string());
    // Numeric column with many distinct values: no frequency table; text column: top-k table.
    assert!(!summary.value_counts.contains_key("id"));
    assert_eq!(summary.value_counts["group"].len(), 7);

    // Seeded sampling is reproducible.
    assert_eq!(summarize(&ds, &options).random_sample, summary.random_sample);
}

#[test]
fn markdown_report_lists_dimensions_and_sample() {
    let ds = load(&Source::path("tests/fixtures/people.csv"), &IngestionOptions::default()).unwrap();
    let md = summarize(&ds, &SummaryOptions::default()).to_markdown();
    assert!(md.contains("3 rows x 2 columns"));
    assert!(md.contains("| Caio |"));
}
