//! Error types for the pipeline runner.

use elev_dem::DemError;
use elev_stations::StationError;
use elev_warp::WarpError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors that can occur while loading or running a pipeline.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("DEM error: {0}")]
    Dem(#[from] DemError),

    #[error("Reprojection error: {0}")]
    Warp(#[from] WarpError),

    #[error("Station data error: {0}")]
    Stations(#[from] StationError),

    #[error("No files ending in '{suffix}' in {dir}")]
    NoInputFiles { dir: PathBuf, suffix: String },

    #[error("Unsupported report format for {0} (expected .json or .csv)")]
    UnsupportedReportFormat(PathBuf),

    #[error("Step '{label}' failed: {source}")]
    StepFailed {
        label: String,
        #[source]
        source: Box<RunnerError>,
    },
}
