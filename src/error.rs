use thiserror::Error;

/// Failure taxonomy for the query pipeline.
///
/// Input errors (`ColumnNotFound`, `UnknownGroupColumn`, `MetricColumnMissing`)
/// reject the request before any aggregation runs. Data-quality errors
/// (`DateParseFailure`, `EmptyTable`) carry diagnostic counts instead of
/// degrading to an empty success. Collaborator errors (`NotFound`, I/O,
/// decode) propagate with their distinguishing detail.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("file '{name}' not found in store")]
    NotFound { name: String },

    #[error("reading table input: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing delimited input: {0}")]
    Csv(#[from] csv::Error),

    #[error("parsing spreadsheet input: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("decoding input text as {encoding}")]
    Decode { encoding: &'static str },

    #[error("table contains no data rows")]
    EmptyTable,

    #[error("column '{requested}' not found; available columns: {}", .available.join(", "))]
    ColumnNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("unknown group column '{column}'; available columns: {}", .available.join(", "))]
    UnknownGroupColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("metric column '{column}' is missing; available columns: {}", .available.join(", "))]
    MetricColumnMissing {
        column: String,
        available: Vec<String>,
    },

    #[error(
        "date parsing failed: {valid} valid / {invalid} invalid row(s); sample values: {}",
        .samples.join(", ")
    )]
    DateParseFailure {
        valid: usize,
        invalid: usize,
        samples: Vec<String>,
    },
}
