use std::fmt::Write as _;

use serde_json::Value as JsonValue;

use super::DatasetSummary;

/// Render a Markdown table. Pipes in cells are escaped; newlines become spaces.
pub fn markdown_table<I>(headers: &[String], rows: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut out = String::new();
    let header_cells: Vec<String> = headers.iter().map(|h| escape_cell(h)).collect();
    let _ = writeln!(out, "| {} |", header_cells.join(" | "));
    let _ = writeln!(out, "|{}", " --- |".repeat(headers.len().max(1)));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }
    out
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn json_cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(super) fn summary_markdown(summary: &DatasetSummary) -> String {
    let mut out = String::from("# Dataset Analysis\n\n## Basic Information\n\n");
    let _ = writeln!(
        out,
        "- Dimensions: {} rows x {} columns",
        summary.shape[0], summary.shape[1]
    );
    let _ = writeln!(out, "- Columns: {}", summary.columns.join(", "));
    if let Some(note) = &summary.note {
        let _ = writeln!(out, "- Note: {note}");
    }
    if let Some(error) = &summary.error {
        let _ = writeln!(out, "- Summary degraded: {error}");
    }

    out.push_str("\n## Data Sample\n\n");
    let rows = if summary.sample.is_empty() {
        &summary.data
    } else {
        &summary.sample
    };
    let body = rows.iter().take(5).map(|row| {
        summary
            .columns
            .iter()
            .map(|c| row.get(c).map(json_cell).unwrap_or_default())
            .collect::<Vec<_>>()
    });
    out.push_str(&markdown_table(&summary.columns, body));
    out
}
