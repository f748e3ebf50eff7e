//! Ingestion dispatcher.
//!
//! Most callers should use [`load`] (or [`load_with_report`] to also get advisories and the
//! chosen parse path). The dispatcher:
//!
//! - resolves the [`SourceFormat`] from the declared format, the file extension, or the source kind
//! - picks a [`ParsePath`] from the file size via [`plan_parse_path`]
//! - runs the matching loader and forwards outcomes to an optional
//!   [`super::observability::IngestionObserver`]

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::types::DataSet;

use super::columnar::{self, DEFAULT_LARGE_DATASET_ROWS};
use super::observability::{
    Advisory, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
};
use super::sql::{self, QueryRunner, SqlSource};
use super::{csv, xml};

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// Comma-separated values.
    Csv,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Excel,
    /// XML documents.
    Xml,
    /// Result set of a SQL query.
    SqlResult,
}

impl SourceFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    /// Infer the format of a path from its extension.
    pub fn from_path(path: &Path) -> IngestionResult<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| IngestionError::UnsupportedFormat {
                message: format!(
                    "cannot infer format: path has no extension ({})",
                    path.display()
                ),
            })?;

        Self::from_extension(ext).ok_or_else(|| IngestionError::UnsupportedFormat {
            message: format!(
                "cannot infer format from extension '{ext}' for path ({})",
                path.display()
            ),
        })
    }

    /// Whether files of this format may take the columnar path.
    pub fn supports_columnar(self) -> bool {
        matches!(self, Self::Csv | Self::Excel)
    }
}

impl FromStr for SourceFormat {
    type Err = IngestionError;

    /// Parse a declared format name: `csv`, `excel`, `xml` or `sql-result`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "excel" | "xlsx" | "xls" => Ok(Self::Excel),
            "xml" => Ok(Self::Xml),
            "sql" | "sql-result" | "sql_result" => Ok(Self::SqlResult),
            other => Err(IngestionError::UnsupportedFormat {
                message: format!("unknown source format '{other}' (expected csv, excel, xml or sql-result)"),
            }),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "csv",
            Self::Excel => "excel",
            Self::Xml => "xml",
            Self::SqlResult => "sql-result",
        })
    }
}

/// Parsing strategy selected per load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePath {
    /// Row-oriented parsing with type inference.
    Standard,
    /// Polars-backed parsing for large files.
    Columnar,
}

impl fmt::Display for ParsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Columnar => "columnar",
        })
    }
}

/// Default size (bytes) at or above which a file takes the columnar path.
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 100_000_000;

/// Parse path selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionPolicy {
    /// Files of at least this many bytes take the columnar path.
    pub large_file_threshold: u64,
}

impl Default for IngestionPolicy {
    fn default() -> Self {
        Self {
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }
}

/// Choose the parse path for a source of `format` whose size is `size_bytes`.
///
/// The threshold is inclusive. Sources with an unknown size (uploads, query results) and
/// formats without a columnar reader always take [`ParsePath::Standard`].
pub fn plan_parse_path(
    format: SourceFormat,
    size_bytes: Option<u64>,
    policy: &IngestionPolicy,
) -> ParsePath {
    match size_bytes {
        Some(size) if format.supports_columnar() && size >= policy.large_file_threshold => {
            ParsePath::Columnar
        }
        _ => ParsePath::Standard,
    }
}

/// Where the data comes from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A file on disk.
    Path(PathBuf),
    /// An in-memory upload; `name` is used for format inference.
    Upload { name: String, bytes: Vec<u8> },
    /// A SQL query against a database.
    Sql(SqlSource),
}

impl Source {
    /// Convenience constructor for [`Source::Path`].
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    fn display_name(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Upload { name, .. } => name.clone(),
            Self::Sql(s) => s.display_name(),
        }
    }
}

/// Options controlling dispatcher behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// If `None`, the format is inferred from the extension (or the source kind for SQL).
    pub format: Option<SourceFormat>,
    /// Parse path policy.
    pub policy: IngestionPolicy,
    /// Overrides the on-disk file size when planning the parse path.
    pub size_hint: Option<u64>,
    /// Columnar loads above this many rows raise [`Advisory::LargeDataset`].
    pub large_dataset_rows: usize,
    /// Runs SQL queries. When `None`, the ConnectorX runner is used if compiled in.
    pub query_runner: Option<Arc<dyn QueryRunner>>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("format", &self.format)
            .field("policy", &self.policy)
            .field("size_hint", &self.size_hint)
            .field("large_dataset_rows", &self.large_dataset_rows)
            .field("query_runner_set", &self.query_runner.is_some())
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            format: None,
            policy: IngestionPolicy::default(),
            size_hint: None,
            large_dataset_rows: DEFAULT_LARGE_DATASET_ROWS,
            query_runner: None,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub dataset: DataSet,
    pub format: SourceFormat,
    pub parse_path: ParsePath,
    /// Non-fatal notices raised while parsing, in the order they occurred.
    pub advisories: Vec<Advisory>,
}

/// Load a source into a [`DataSet`].
///
/// When an observer is configured, this function reports:
///
/// - `on_advisory` for each advisory raised while parsing
/// - `on_success` on success, with row/column stats
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
///
/// # Examples
///
/// ```no_run
/// use tabular_insight::ingestion::{load, IngestionOptions, Source};
///
/// # fn main() -> Result<(), tabular_insight::IngestionError> {
/// // Uses `.csv` to select the CSV loader.
/// let ds = load(&Source::path("people.csv"), &IngestionOptions::default())?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
///
/// ## Observability (tracing + alert threshold)
///
/// ```no_run
/// use std::sync::Arc;
///
/// use tabular_insight::ingestion::{
///     load, IngestionOptions, IngestionSeverity, Source, TracingObserver,
/// };
///
/// let opts = IngestionOptions {
///     observer: Some(Arc::new(TracingObserver)),
///     alert_at_or_above: IngestionSeverity::Critical,
///     ..Default::default()
/// };
///
/// // Missing files are treated as Critical and will trigger `on_alert` at this threshold.
/// let _err = load(&Source::path("does_not_exist.csv"), &opts).unwrap_err();
/// ```
pub fn load(source: &Source, options: &IngestionOptions) -> IngestionResult<DataSet> {
    load_with_report(source, options).map(|report| report.dataset)
}

/// Same as [`load`], returning the chosen format, parse path and advisories as well.
pub fn load_with_report(source: &Source, options: &IngestionOptions) -> IngestionResult<LoadReport> {
    let format = resolve_format(source, options.format)?;
    let parse_path = match source {
        Source::Path(path) => {
            let size = options
                .size_hint
                .or_else(|| fs::metadata(path).ok().map(|m| m.len()));
            plan_parse_path(format, size, &options.policy)
        }
        Source::Upload { .. } | Source::Sql(_) => ParsePath::Standard,
    };

    let ctx = IngestionContext {
        source: source.display_name(),
        format,
        parse_path,
    };
    tracing::debug!(source = %ctx.source, %format, ?parse_path, "loading dataset");

    let mut advisories = Vec::new();
    let result = run_loader(source, format, parse_path, options, &mut advisories);

    for advisory in &advisories {
        match options.observer.as_ref() {
            Some(obs) => obs.on_advisory(&ctx, advisory),
            None => tracing::warn!(source = %ctx.source, "{advisory}"),
        }
    }

    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(ds) => obs.on_success(
                &ctx,
                IngestionStats {
                    rows: ds.row_count(),
                    columns: ds.column_count(),
                },
            ),
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result.map(|dataset| LoadReport {
        dataset,
        format,
        parse_path,
        advisories,
    })
}

fn resolve_format(source: &Source, declared: Option<SourceFormat>) -> IngestionResult<SourceFormat> {
    match (source, declared) {
        (Source::Sql(_), None | Some(SourceFormat::SqlResult)) => Ok(SourceFormat::SqlResult),
        (Source::Sql(_), Some(other)) => Err(IngestionError::UnsupportedFormat {
            message: format!("a SQL source cannot be read as {other}"),
        }),
        (_, Some(SourceFormat::SqlResult)) => Err(IngestionError::UnsupportedFormat {
            message: "sql-result requires a SQL source".to_string(),
        }),
        (_, Some(fmt)) => Ok(fmt),
        (Source::Path(path), None) => SourceFormat::from_path(path),
        (Source::Upload { name, .. }, None) => SourceFormat::from_path(Path::new(name)),
    }
}

fn run_loader(
    source: &Source,
    format: SourceFormat,
    parse_path: ParsePath,
    options: &IngestionOptions,
    advisories: &mut Vec<Advisory>,
) -> IngestionResult<DataSet> {
    match (source, parse_path) {
        (Source::Sql(sql_source), _) => run_sql(sql_source, options),
        (Source::Path(path), ParsePath::Columnar) => {
            columnar::load_columnar(path, format, options.large_dataset_rows, advisories)
        }
        (Source::Path(path), ParsePath::Standard) => match format {
            SourceFormat::Csv => csv::read_csv_from_path(path, advisories),
            SourceFormat::Excel => read_excel_path(path),
            SourceFormat::Xml => xml::read_xml_from_path(path, advisories),
            SourceFormat::SqlResult => Err(sql_needs_query()),
        },
        (Source::Upload { bytes, .. }, _) => match format {
            SourceFormat::Csv => csv::read_csv_from_bytes(bytes, advisories),
            SourceFormat::Excel => read_excel_bytes(bytes),
            SourceFormat::Xml => xml::read_xml_from_bytes(bytes, advisories),
            SourceFormat::SqlResult => Err(sql_needs_query()),
        },
    }
}

fn sql_needs_query() -> IngestionError {
    IngestionError::UnsupportedFormat {
        message: "sql-result requires a SQL source".to_string(),
    }
}

fn run_sql(source: &SqlSource, options: &IngestionOptions) -> IngestionResult<DataSet> {
    if let Some(runner) = options.query_runner.as_ref() {
        return sql::read_sql(source, runner.as_ref());
    }

    #[cfg(feature = "db_connectorx")]
    {
        sql::read_sql(source, &sql::ConnectorXRunner)
    }

    #[cfg(not(feature = "db_connectorx"))]
    {
        // Credentials are still validated so callers see the more specific error first.
        source.validate_credentials()?;
        Err(IngestionError::Connection {
            message: "sql ingestion not enabled (enable cargo feature 'db_connectorx')".to_string(),
        })
    }
}

fn read_excel_path(path: &Path) -> IngestionResult<DataSet> {
    #[cfg(feature = "excel")]
    {
        super::excel::read_excel_from_path(path)
    }

    #[cfg(not(feature = "excel"))]
    {
        let _ = path;
        Err(excel_disabled())
    }
}

fn read_excel_bytes(bytes: &[u8]) -> IngestionResult<DataSet> {
    #[cfg(feature = "excel")]
    {
        super::excel::read_excel_from_bytes(bytes)
    }

    #[cfg(not(feature = "excel"))]
    {
        let _ = bytes;
        Err(excel_disabled())
    }
}

#[cfg(not(feature = "excel"))]
fn excel_disabled() -> IngestionError {
    IngestionError::UnsupportedFormat {
        message: "excel ingestion not enabled (enable cargo feature 'excel')".to_string(),
    }
}

fn severity_for_error(e: &IngestionError) -> IngestionSeverity {
    match e {
        IngestionError::Io(_) | IngestionError::Connection { .. } => IngestionSeverity::Critical,
        IngestionError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestionSeverity::Critical,
            _ => IngestionSeverity::Error,
        },
        IngestionError::Polars(polars::error::PolarsError::IO { .. }) => IngestionSeverity::Critical,
        #[cfg(feature = "excel")]
        IngestionError::Excel(calamine::Error::Io(_)) => IngestionSeverity::Critical,
        _ => IngestionSeverity::Error,
    }
}
