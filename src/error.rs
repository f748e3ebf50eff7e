use thiserror::Error;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Convenience result type for question answering.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Error type returned by the ingestion dispatcher and the format-specific loaders.
///
/// Library errors (`Csv`, `Excel`, `Xml`, `Polars`) wrap the underlying parser failure and keep
/// its message; they are all "parse errors" from the caller's point of view
/// (see [`IngestionError::is_parse_error`]).
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The declared or inferred source format is not one of csv, excel, xml or sql-result.
    #[error("unsupported format: {message}")]
    UnsupportedFormat { message: String },

    #[cfg(feature = "excel")]
    /// Excel parsing error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV parsing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// XML parsing error.
    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Columnar (large-file) engine error.
    #[error("columnar engine error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Missing database credentials or an unreachable database.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Any other malformed-source failure.
    #[error("failed to parse {source_kind}: {message}")]
    Parse {
        source_kind: &'static str,
        message: String,
    },
}

impl IngestionError {
    /// Returns `true` for errors caused by malformed source data.
    pub fn is_parse_error(&self) -> bool {
        match self {
            IngestionError::Csv(err) => !matches!(err.kind(), csv::ErrorKind::Io(_)),
            #[cfg(feature = "excel")]
            IngestionError::Excel(_) => true,
            IngestionError::Xml(_) | IngestionError::Polars(_) | IngestionError::Parse { .. } => true,
            IngestionError::Io(_)
            | IngestionError::UnsupportedFormat { .. }
            | IngestionError::Connection { .. } => false,
        }
    }
}

/// Error type returned by the analysis layer (prompting, model calls, reply rendering).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Loading the dataset failed.
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// A question was asked before any dataset was loaded.
    #[error("no dataset loaded; load data before asking questions")]
    NoDataset,

    /// The question was empty after trimming.
    #[error("question is empty")]
    EmptyQuestion,

    /// Provider credentials are missing.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// HTTP transport failure talking to the model backend.
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered, but not with something we can use.
    #[error("unexpected model response: {0}")]
    BadResponse(String),

    /// A chart or table spec returned by the model failed validation.
    #[error("invalid {kind} spec: {message}")]
    InvalidSpec { kind: &'static str, message: String },

    /// Chart rendering failed.
    #[error("chart rendering failed: {0}")]
    Render(String),
}

/// Configuration errors (unknown provider names, unparsable values).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unknown provider / API vendor name.
    #[error("unsupported provider type: {0}")]
    UnsupportedProvider(String),

    /// A variable was set but could not be parsed.
    #[error("invalid value for {key}: '{value}' ({message})")]
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },
}
