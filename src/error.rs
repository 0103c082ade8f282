use thiserror::Error;

/// Convenience result type for table construction, processing and ingestion.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned by every fallible operation in this crate.
///
/// A single enum is shared by table construction, processors and fetchers so a pipeline can
/// propagate the first failure unchanged with `?`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding/encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV decoding error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The table shape or index invariant does not hold (ragged rows, duplicate index keys,
    /// unknown index column, ...).
    #[error("schema error: {message}")]
    Schema { message: String },

    /// A value could not be converted into the requested [`crate::types::DataType`].
    #[error("failed to cast value at row {row} column '{column}': {message} (raw='{raw}')")]
    TypeCast {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// A referenced column is missing or has the wrong kind.
    #[error("column '{column}': {message}")]
    Column { column: String, message: String },

    /// A mapping entry or baseline row could not be found.
    #[error("lookup error: {message}")]
    Lookup { message: String },

    /// Two tables that must share an index do not.
    #[error("alignment error: {message}")]
    Alignment { message: String },

    /// A value lies outside the domain of a function (e.g. non-positive geometric mean input).
    #[error("domain error in column '{column}': {message}")]
    Domain { column: String, message: String },

    /// Fetched input is unusable (no successful runs, no frequency field, ...).
    #[error("invalid input: {message}")]
    Value { message: String },
}

impl PipelineError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub(crate) fn column(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Column {
            column: column.into(),
            message: message.into(),
        }
    }

    pub(crate) fn missing_column(column: &str) -> Self {
        Self::column(column, "does not exist")
    }

    pub(crate) fn lookup(message: impl Into<String>) -> Self {
        Self::Lookup {
            message: message.into(),
        }
    }

    pub(crate) fn alignment(message: impl Into<String>) -> Self {
        Self::Alignment {
            message: message.into(),
        }
    }
}
