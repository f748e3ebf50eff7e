#![cfg(feature = "excel_test_writer")]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tabular_insight::ingestion::excel::{read_excel_from_bytes, read_excel_from_path};
use tabular_insight::ingestion::{load_with_report, IngestionOptions, ParsePath, Source};
use tabular_insight::types::{DataType, Value};

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("tabular-insight-{name}-{nanos}.xlsx"))
}

/// Title row, blank row, header, two data rows, a blank row and an empty trailing column.
fn write_sales_xlsx(path: &PathBuf) {
    use rust_xlsxwriter::Workbook;

    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("Vendas").unwrap();

    ws.write_string(1, 0, "region").unwrap();
    ws.write_string(1, 1, "units").unwrap();
    ws.write_string(1, 2, "revenue").unwrap();
    ws.write_string(1, 3, "paid").unwrap();
    ws.write_string(1, 4, "notes").unwrap();

    ws.write_string(2, 0, "Norte").unwrap();
    ws.write_number(2, 1, 12).unwrap();
    ws.write_number(2, 2, 1500.5).unwrap();
    ws.write_boolean(2, 3, true).unwrap();

    ws.write_string(4, 0, "Sul").unwrap();
    ws.write_number(4, 1, 7).unwrap();
    ws.write_number(4, 2, 820.0).unwrap();
    ws.write_boolean(4, 3, false).unwrap();

    let second = wb.add_worksheet();
    second.set_name("Ignored").unwrap();
    second.write_string(0, 0, "other").unwrap();

    wb.save(path).unwrap();
}

#[test]
fn reads_first_sheet_and_drops_empty_rows_and_columns() {
    let path = tmp_file("sales");
    write_sales_xlsx(&path);

    let ds = read_excel_from_path(&path).unwrap();
    assert_eq!(ds.schema.field_names().collect::<Vec<_>>(), vec!["region", "units", "revenue", "paid"]);
    assert_eq!(
        ds.schema.fields.iter().map(|f| f.data_type).collect::<Vec<_>>(),
        vec![DataType::Utf8, DataType::Int64, DataType::Float64, DataType::Bool]
    );
    assert_eq!(ds.row_count(), 2);
    assert_eq!(ds.rows[1][0], Value::Utf8("Sul".to_string()));
    assert_eq!(ds.rows[1][1], Value::Int64(7));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn in_memory_workbook_matches_file() {
    let path = tmp_file("bytes");
    write_sales_xlsx(&path);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(read_excel_from_bytes(&bytes).unwrap(), read_excel_from_path(&path).unwrap());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn large_workbook_goes_columnar_and_keeps_non_empty_rows() {
    let path = tmp_file("columnar");
    write_sales_xlsx(&path);

    let report = load_with_report(
        &Source::Path(path.clone()),
        &IngestionOptions {
            size_hint: Some(u64::MAX),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(report.parse_path, ParsePath::Columnar);
    assert_eq!(report.dataset.row_count(), 2);
    assert_eq!(report.dataset.rows[0][2], Value::Float64(1500.5));

    let _ = std::fs::remove_file(&path);
}
