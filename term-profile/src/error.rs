//! Error types for the Term profiling library.
//!
//! Every fallible operation returns [`ProfileError`]. The variants follow the
//! failure taxonomy of the profiling pipeline: most of them are recoverable at
//! the granularity where they occur (a single statistic, a single column pair,
//! the optional target analysis) and only a few abort a run.

use thiserror::Error;

/// The main error type for the profiling library.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// A single statistic or aggregate query failed.
    ///
    /// The pipeline leaves the statistic absent and continues.
    #[error("Query for '{statistic}' on column '{column}' failed: {message}")]
    EngineQuery {
        /// Column the statistic was computed for
        column: String,
        /// Name of the statistic (e.g. "histogram", "moments")
        statistic: String,
        /// Detailed error message
        message: String,
    },

    /// The nominated target column cannot be reduced to a binary encoding.
    #[error("Target column '{column}' cannot be encoded as binary: {reason}")]
    UnsupportedTargetEncoding { column: String, reason: String },

    /// The correlation matrix has a non-positive leading minor.
    #[error("Correlation matrix is not positive definite (leading minor {minor} = {value:.6})")]
    NonPositiveDefinite { minor: usize, value: f64 },

    /// The source contained rows that could not be parsed.
    #[error("Malformed source data: {0}")]
    MalformedSource(String),

    /// The source could not be read at all, or its summary was unavailable.
    #[error("Source '{source_name}' is unreadable: {message}")]
    SourceUnreadable {
        source_name: String,
        message: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// Data type mismatch or invalid data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Security-related error (e.g. a rejected identifier).
    #[error("Security error: {0}")]
    Security(String),

    /// The run was cancelled through its cancellation token.
    #[error("Profiling cancelled")]
    Cancelled,
}

/// A type alias for `Result<T, ProfileError>`.
pub type Result<T> = std::result::Result<T, ProfileError>;

impl ProfileError {
    /// Creates an engine query error for one statistic of one column.
    pub fn engine_query(
        column: impl Into<String>,
        statistic: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::EngineQuery {
            column: column.into(),
            statistic: statistic.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported target encoding error.
    pub fn unsupported_target(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedTargetEncoding {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Creates a source unreadable error.
    pub fn source_unreadable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnreadable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Returns true when re-running in an error-tolerant read mode may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MalformedSource(_) => true,
            Self::DataFusion(e) => is_malformed_data(e),
            Self::Arrow(e) => is_malformed_arrow(e),
            _ => false,
        }
    }

    /// Returns true when the error must abort the whole profiling run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SourceUnreadable { .. } | Self::Cancelled)
    }

    /// Re-labels a low-level engine failure as a failure of one statistic.
    pub fn for_statistic(self, column: &str, statistic: &str) -> Self {
        match self {
            Self::EngineQuery { .. } | Self::Cancelled | Self::Security(_) => self,
            other => Self::engine_query(column, statistic, other.to_string()),
        }
    }
}

/// Classifies DataFusion errors that stem from unparseable source rows.
fn is_malformed_data(err: &datafusion::error::DataFusionError) -> bool {
    use datafusion::error::DataFusionError;

    match err {
        DataFusionError::ArrowError(inner, _) => is_malformed_arrow(inner),
        DataFusionError::Context(_, inner) => is_malformed_data(inner),
        DataFusionError::Shared(inner) => is_malformed_data(inner),
        DataFusionError::External(inner) => {
            if let Some(arrow_err) = inner.downcast_ref::<arrow::error::ArrowError>() {
                is_malformed_arrow(arrow_err)
            } else {
                inner
                    .downcast_ref::<DataFusionError>()
                    .is_some_and(is_malformed_data)
            }
        }
        _ => false,
    }
}

fn is_malformed_arrow(err: &arrow::error::ArrowError) -> bool {
    use arrow::error::ArrowError;

    match err {
        ArrowError::CsvError(_) | ArrowError::JsonError(_) | ArrowError::ParseError(_) => true,
        ArrowError::ExternalError(inner) => inner
            .downcast_ref::<datafusion::error::DataFusionError>()
            .is_some_and(is_malformed_data),
        _ => false,
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
