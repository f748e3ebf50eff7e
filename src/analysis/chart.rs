//! Chart specs returned by the model, validated against the dataset and rendered with plotters.

use std::path::Path;

use plotters::prelude::*;
use serde::Deserialize;

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{DataSet, DataType, Value};

/// Chart style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
}

/// `{"kind": "line" | "bar" | "scatter", "x": "<column>", "y": "<column>", "title": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Points ready to draw. Categorical x values are mapped to their row position and kept as labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub points: Vec<(f64, f64)>,
    pub x_labels: Option<Vec<String>>,
}

fn invalid(message: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidSpec {
        kind: "chart",
        message: message.into(),
    }
}

impl ChartSpec {
    /// Parse a spec from the JSON body of a `chart` block.
    pub fn parse(json: &str) -> AnalysisResult<Self> {
        serde_json::from_str(json).map_err(|e| invalid(e.to_string()))
    }

    /// Check the spec against `dataset` and collect the points to plot.
    ///
    /// `y` must be numeric. Rows where either coordinate is missing are skipped.
    pub fn validate(&self, dataset: &DataSet) -> AnalysisResult<ChartData> {
        let x_idx = dataset
            .schema
            .index_of(&self.x)
            .ok_or_else(|| invalid(format!("unknown x column '{}'", self.x)))?;
        let y_idx = dataset
            .schema
            .index_of(&self.y)
            .ok_or_else(|| invalid(format!("unknown y column '{}'", self.y)))?;
        if !dataset.schema.fields[y_idx].data_type.is_numeric() {
            return Err(invalid(format!("y column '{}' is not numeric", self.y)));
        }

        let x_type = dataset.schema.fields[x_idx].data_type;
        let categorical = !(x_type.is_numeric() || x_type == DataType::DateTime);

        let mut points = Vec::new();
        let mut labels = Vec::new();
        for row in &dataset.rows {
            let (Some(x), Some(y)) = (row.get(x_idx), row.get(y_idx).and_then(Value::as_f64)) else {
                continue;
            };
            if x.is_null() || !y.is_finite() {
                continue;
            }
            let x_pos = if categorical {
                labels.push(x.to_display_string());
                (labels.len() - 1) as f64
            } else {
                match x {
                    Value::DateTime(d) => d.and_utc().timestamp() as f64,
                    other => match other.as_f64() {
                        Some(v) if v.is_finite() => v,
                        _ => continue,
                    },
                }
            };
            points.push((x_pos, y));
        }

        if points.is_empty() {
            return Err(invalid("no plottable rows"));
        }
        Ok(ChartData {
            points,
            x_labels: categorical.then_some(labels),
        })
    }
}

fn padded_range(values: impl Iterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if lo == hi {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

/// Draw `data` as a PNG at `output_path`, overwriting any existing file.
pub fn render_chart(spec: &ChartSpec, data: &ChartData, output_path: &Path) -> AnalysisResult<()> {
    let render_err = |e: &dyn std::fmt::Display| AnalysisError::Render(e.to_string());

    let bar = spec.kind == ChartKind::Bar;
    let (x_lo, x_hi) = if bar {
        let (lo, hi) = padded_range(data.points.iter().map(|p| p.0), false);
        (lo - 0.5, hi + 0.5)
    } else {
        padded_range(data.points.iter().map(|p| p.0), false)
    };
    let (y_lo, y_hi) = padded_range(data.points.iter().map(|p| p.1), bar);

    let root = BitMapBackend::new(output_path, (900, 500)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| render_err(&e))?;

    let title = spec
        .title
        .clone()
        .unwrap_or_else(|| format!("{} by {}", spec.y, spec.x));
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(title, ("sans-serif", 24))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(|e| render_err(&e))?;

    let labels = data.x_labels.clone().unwrap_or_default();
    chart
        .configure_mesh()
        .x_desc(spec.x.as_str())
        .y_desc(spec.y.as_str())
        .x_label_formatter(&|x| {
            if labels.is_empty() {
                format!("{x:.2}")
            } else {
                let idx = x.round();
                if idx >= 0.0 && (idx - x).abs() < 1e-9 {
                    labels.get(idx as usize).cloned().unwrap_or_default()
                } else {
                    String::new()
                }
            }
        })
        .draw()
        .map_err(|e| render_err(&e))?;

    match spec.kind {
        ChartKind::Line => {
            chart
                .draw_series(LineSeries::new(data.points.iter().copied(), &BLUE))
                .map_err(|e| render_err(&e))?;
        }
        ChartKind::Scatter => {
            chart
                .draw_series(data.points.iter().map(|&p| Circle::new(p, 3, BLUE.filled())))
                .map_err(|e| render_err(&e))?;
        }
        ChartKind::Bar => {
            chart
                .draw_series(data.points.iter().map(|&(x, y)| {
                    Rectangle::new([(x - 0.4, 0.0), (x + 0.4, y)], BLUE.mix(0.6).filled())
                }))
                .map_err(|e| render_err(&e))?;
        }
    }

    root.present().map_err(|e| render_err(&e))?;
    Ok(())
}
