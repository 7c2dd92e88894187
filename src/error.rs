use std::path::PathBuf;

/// Errors raised by any stage of the fraud pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input file is missing or unreadable.
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A row of the input file could not be parsed.
    #[error("malformed row{}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Parse {
        line: Option<u64>,
        #[source]
        source: csv::Error,
    },

    /// An expected column is absent from the table or matrix.
    #[error("column `{column}` not found")]
    MissingColumn { column: String },

    /// A column exists but holds the wrong kind of values.
    #[error("column `{column}` is not {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },

    /// A column has a different row count from the table it joins.
    #[error("column `{column}` has {got} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    /// Two inputs that must line up do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A column selected for imputation has no observed value.
    #[error("column `{column}` has no non-missing values to impute from")]
    EmptyColumn { column: String },

    /// The label column holds something other than 0, 1 or missing.
    #[error("label at row {row} is {value}, expected 0 or 1")]
    InvalidLabel { row: usize, value: f64 },

    /// Not enough rows of a class for sampling or neighbour search.
    #[error("class {class} has {count} rows, need at least {required}")]
    InsufficientSamples {
        class: usize,
        count: usize,
        required: usize,
    },

    /// Model fitting or the hyperparameter search could not proceed.
    #[error("fit failed: {0}")]
    Fit(String),

    /// A metric is undefined for the given labels.
    #[error("{metric} is undefined: {reason}")]
    UndefinedMetric {
        metric: &'static str,
        reason: String,
    },

    /// A run parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
