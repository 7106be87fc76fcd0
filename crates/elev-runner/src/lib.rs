//! # elev-runner
//!
//! Runs DEM processing pipelines described in YAML: trimming tile overlaps,
//! merging tiles, reprojecting with `gdalwarp`, summarising rasters and
//! sampling station elevations. Results are collected in a [`Report`].
//!
//! ```no_run
//! use elev_runner::Pipeline;
//!
//! let report = Pipeline::load("pipelines/london.yaml")?.run()?;
//! println!("{} steps, {} failed", report.steps.len(), report.failed_steps());
//! # Ok::<(), elev_runner::RunnerError>(())
//! ```

pub mod config;
mod error;
pub mod files;
pub mod pipeline;
pub mod report;

pub use config::{PipelineConfig, Step};
pub use error::{Result, RunnerError};
pub use pipeline::Pipeline;
pub use report::{Report, ReportFormat, SampleTable, StepStatus};
