//! `tabular-insight` loads tabular data (CSV, Excel, XML or a SQL query result) into an in-memory
//! [`types::DataSet`], condenses it into a JSON-safe [`summary::DatasetSummary`], and answers
//! natural-language questions about it through a chat model.
//!
//! The pieces:
//!
//! - [`ingestion::load`] picks the reader from the file extension (or an explicit
//!   [`ingestion::SourceFormat`]) and the parse path from the file size. Files at or above
//!   [`ingestion::DEFAULT_LARGE_FILE_THRESHOLD`] bytes go through Polars.
//! - [`summary::summarize`] never fails: when statistics cannot be computed, the summary carries
//!   the reason instead.
//! - [`analysis::DataAnalyzer`] builds prompts from the summary. In text mode, `chart` and `table`
//!   blocks in the model's reply are validated and rendered as charts (plotters) or derived
//!   tables. Model output is never executed.
//! - [`config::AppConfig`] reads provider, database and tuning settings from the environment.
//!
//! Column types are inferred; every cell is a [`types::Value`] of type
//! [`types::DataType::Int64`], [`types::DataType::Float64`], [`types::DataType::Bool`],
//! [`types::DataType::Utf8`] or [`types::DataType::DateTime`]. Empty cells map to
//! [`types::Value::Null`].
//!
//! ## Quick example: load and summarize
//!
//! ```no_run
//! use tabular_insight::ingestion::{load, IngestionOptions, Source};
//! use tabular_insight::summary::{summarize, SummaryOptions};
//!
//! # fn main() -> Result<(), tabular_insight::IngestionError> {
//! let ds = load(&Source::path("people.csv"), &IngestionOptions::default())?;
//! let summary = summarize(&ds, &SummaryOptions::default());
//! println!("{}", summary.to_markdown());
//! # Ok(())
//! # }
//! ```
//!
//! ## Asking a question
//!
//! ```no_run
//! use tabular_insight::analysis::{AnalysisOutput, AnalyzerOptions, DataAnalyzer, HttpChatModel};
//! use tabular_insight::config::AppConfig;
//! use tabular_insight::ingestion::{load, IngestionOptions, Source};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_env()?;
//! let model = HttpChatModel::from_config(&config.provider)?;
//! let mut analyzer = DataAnalyzer::new(model, AnalyzerOptions::default());
//! analyzer.load_dataset(load(&Source::path("sales.xlsx"), &IngestionOptions::default())?);
//! if let AnalysisOutput::Text(answer) = analyzer.ask("Which region sold the most?")? {
//!     println!("{answer}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Cargo features
//!
//! - `excel` (default): Excel ingestion via `calamine`.
//! - `excel_test_writer`: generates `.xlsx` fixtures in tests (adds `rust_xlsxwriter`).
//! - `db_connectorx`: runs SQL queries against MySQL through ConnectorX (adds `arrow` and
//!   `connectorx`). Without it, SQL loads need a caller-supplied [`ingestion::QueryRunner`].

pub mod analysis;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod summary;
pub mod types;

pub use error::{AnalysisError, AnalysisResult, ConfigError, IngestionError, IngestionResult};
