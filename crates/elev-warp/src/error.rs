//! Error types for reprojection

use thiserror::Error;

/// Result type for reprojection operations
pub type WarpResult<T> = Result<T, WarpError>;

/// Errors that can occur when running the warp program
#[derive(Debug, Error)]
pub enum WarpError {
    /// The previous output file could not be removed
    #[error("Failed to remove existing output {path}: {source}")]
    RemoveOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The warp program could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The warp program ran but reported failure
    #[error("{program} failed ({}): {stderr}", exit_status(.status))]
    Failed {
        program: String,
        /// Exit code, `None` when terminated by a signal
        status: Option<i32>,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The program reported success but left no output file
    #[error("{program} reported success but did not create {path}")]
    MissingOutput { program: String, path: String },
}

fn exit_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}
