use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::IngestionError;

use super::dispatch::{ParsePath, SourceFormat};

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (I/O, unreachable database, missing credentials).
    Critical,
}

impl IngestionSeverity {
    /// Lowercase label used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// Context about a load attempt.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// Display name of the source (file path, upload name, or `sql:<database>`).
    pub source: String,
    /// Format used for parsing.
    pub format: SourceFormat,
    /// Parse path chosen by the dispatcher.
    pub parse_path: ParsePath,
}

/// Minimal stats reported on a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Number of rows in the loaded dataset.
    pub rows: usize,
    /// Number of columns in the loaded dataset.
    pub columns: usize,
}

/// A non-fatal notice raised while parsing. Never aborts a load.
#[derive(Debug, Clone, PartialEq)]
pub enum Advisory {
    /// The sample did not decode as UTF-8; another encoding was used.
    EncodingFallback { encoding: &'static str },
    /// A malformed row was skipped.
    MalformedRowSkipped { line: u64, reason: String },
    /// The dataset is large; callers should consider sampling.
    LargeDataset { rows: usize },
}

impl Advisory {
    /// Short machine-readable tag for the advisory variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Advisory::EncodingFallback { .. } => "encoding_fallback",
            Advisory::MalformedRowSkipped { .. } => "malformed_row_skipped",
            Advisory::LargeDataset { .. } => "large_dataset",
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::EncodingFallback { encoding } => {
                write!(f, "input is not valid UTF-8; decoded as {encoding}")
            }
            Advisory::MalformedRowSkipped { line, reason } => {
                write!(f, "skipped malformed row at line {line}: {reason}")
            }
            Advisory::LargeDataset { rows } => write!(
                f,
                "very large dataset ({rows} rows); consider sampling before analysis"
            ),
        }
    }
}

/// Observer interface for load outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when a load succeeds.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when a load fails.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// Called when a load failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }

    /// Called once per advisory raised during parsing.
    fn on_advisory(&self, _ctx: &IngestionContext, _advisory: &Advisory) {}
}

/// Fans every callback out to a list of observers, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }

    fn each(&self, call: impl Fn(&dyn IngestionObserver)) {
        self.observers.iter().for_each(|o| call(o.as_ref()));
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.each(|o| o.on_success(ctx, stats));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.each(|o| o.on_failure(ctx, severity, error));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.each(|o| o.on_alert(ctx, severity, error));
    }

    fn on_advisory(&self, ctx: &IngestionContext, advisory: &Advisory) {
        self.each(|o| o.on_advisory(ctx, advisory));
    }
}

/// Forwards load events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        tracing::info!(
            source = %ctx.source,
            format = ?ctx.format,
            parse_path = ?ctx.parse_path,
            rows = stats.rows,
            columns = stats.columns,
            "dataset loaded"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            source = %ctx.source,
            format = ?ctx.format,
            severity = ?severity,
            error = %error,
            "dataset load failed"
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            alert = true,
            source = %ctx.source,
            format = ?ctx.format,
            severity = ?severity,
            error = %error,
            "dataset load failed"
        );
    }

    fn on_advisory(&self, ctx: &IngestionContext, advisory: &Advisory) {
        tracing::warn!(source = %ctx.source, format = ?ctx.format, "{advisory}");
    }
}

/// Appends one `key=value` line per load event to a log file.
///
/// Every line starts with an RFC 3339 timestamp and an `event=` tag (`loaded`, `failed`,
/// `alert` or `advisory`), followed by the source, format and parse path. Free text (errors,
/// advisory details) is written last, quoted.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Writes are best-effort; a log file that cannot be opened is skipped silently.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn record(&self, event: &str, ctx: &IngestionContext, extra: &str) {
        let line = format!(
            "{} event={event} source={:?} format={} parse_path={}{extra}",
            chrono::Utc::now().to_rfc3339(),
            ctx.source,
            ctx.format,
            ctx.parse_path,
        );
        let _guard = self.lock.lock().ok();
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(file, "{line}");
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        let extra = format!(" rows={} columns={}", stats.rows, stats.columns);
        self.record("loaded", ctx, &extra);
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        let extra = format!(" severity={} error={:?}", severity.as_str(), error.to_string());
        self.record("failed", ctx, &extra);
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        let extra = format!(" severity={} error={:?}", severity.as_str(), error.to_string());
        self.record("alert", ctx, &extra);
    }

    fn on_advisory(&self, ctx: &IngestionContext, advisory: &Advisory) {
        let extra = format!(" kind={} detail={:?}", advisory.kind(), advisory.to_string());
        self.record("advisory", ctx, &extra);
    }
}
