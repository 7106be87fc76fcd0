//! Error types for station data

use thiserror::Error;

/// Result type for station operations
pub type StationResult<T> = Result<T, StationError>;

/// Errors that can occur when reading station data
#[derive(Debug, Error)]
pub enum StationError {
    /// The file could not be opened
    #[error("Failed to open station file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A configured column is not in the header
    #[error("Column '{column}' not found (available: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// A coordinate cell is not a number
    #[error("Line {line}: column '{column}' has non-numeric value '{value}'")]
    InvalidNumber {
        /// 1-based line in the file
        line: u64,
        column: String,
        value: String,
    },
}
