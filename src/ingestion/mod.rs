//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`load`] (from [`dispatch`]) which:
//!
//! - auto-detects the format by file extension (or you can override via [`IngestionOptions`])
//! - chooses the standard or columnar parse path from the file size
//! - normalizes the source into an in-memory [`crate::types::DataSet`]
//! - optionally reports success/failure/alerts/advisories to an [`IngestionObserver`]
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - [`excel`] (feature `excel`)
//! - [`xml`]
//! - [`sql`]
//! - [`columnar`]

pub mod columnar;
pub mod csv;
pub mod dispatch;
#[cfg(feature = "excel")]
pub mod excel;
pub mod observability;
pub mod sql;
pub mod xml;

pub use dispatch::{
    load, load_with_report, plan_parse_path, IngestionOptions, IngestionPolicy, LoadReport,
    ParsePath, Source, SourceFormat, DEFAULT_LARGE_FILE_THRESHOLD,
};
pub use observability::{
    Advisory, CompositeObserver, FileObserver, IngestionContext, IngestionObserver,
    IngestionSeverity, IngestionStats, TracingObserver,
};
#[cfg(feature = "db_connectorx")]
pub use sql::ConnectorXRunner;
pub use sql::{QueryRunner, SqlSource};
