//! Error types for the mobilita engine

use thiserror::Error;

/// Errors that can occur while building or exporting the fused dataset
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unrecognized timeline format: {0}")]
    UnrecognizedFormat(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Missing source table: {0}")]
    MissingSource(String),
}
