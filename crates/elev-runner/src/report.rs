//! Pipeline reports.
//!
//! A report records what every step did, the raster summaries it produced and
//! the sampled station elevations. It is written as JSON (the full report) or
//! CSV (the station x DEM elevation comparison).

use crate::{Result, RunnerError};
use chrono::{DateTime, Utc};
use elev_dem::{Crs, RasterInfo, SampleResult, SkippedCoordinate};
use elev_stations::Station;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub label: String,
    pub kind: &'static str,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Files written by the step.
    pub outputs: Vec<PathBuf>,
    pub duration_ms: u64,
}

/// Summary of a raster read or written by a step.
#[derive(Debug, Clone, Serialize)]
pub struct RasterSummary {
    pub step: String,
    pub path: PathBuf,
    pub info: RasterInfo,
}

/// Elevation of one station in one DEM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub station: String,
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub row: usize,
    pub column: usize,
    /// `None` for a no-data cell.
    pub elevation: Option<f64>,
}

impl SampleRow {
    pub fn new(station: &Station, result: &SampleResult) -> Self {
        Self {
            station: station.name.clone(),
            index: result.index,
            latitude: result.latitude,
            longitude: result.longitude,
            row: result.row,
            column: result.column,
            elevation: result.value(),
        }
    }
}

/// Station elevations sampled from one DEM.
#[derive(Debug, Clone, Serialize)]
pub struct SampleTable {
    pub label: String,
    pub dem: PathBuf,
    pub crs: Crs,
    pub band: usize,
    pub rows: Vec<SampleRow>,
    pub skipped: Vec<SkippedCoordinate>,
}

impl SampleTable {
    /// Elevation of the station at input position `index`, if sampled.
    pub fn elevation(&self, index: usize) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.index == index)
            .and_then(|row| row.elevation)
    }

    /// Write the rows as CSV; no-data elevations are empty cells.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        create_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Elevation of every station in every sampled DEM.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Comparison {
    /// Sample table labels, one per elevation column.
    pub dems: Vec<String>,
    pub stations: Vec<ComparisonRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Same order as [`Comparison::dems`].
    pub elevations: Vec<Option<f64>>,
}

impl Comparison {
    pub fn build(stations: &[Station], tables: &[SampleTable]) -> Self {
        let rows = stations
            .iter()
            .enumerate()
            .map(|(index, station)| ComparisonRow {
                station: station.name.clone(),
                latitude: station.latitude,
                longitude: station.longitude,
                elevations: tables.iter().map(|t| t.elevation(index)).collect(),
            })
            .collect();

        Self {
            dems: tables.iter().map(|t| t.label.clone()).collect(),
            stations: rows,
        }
    }
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
    pub steps: Vec<StepOutcome>,
    pub rasters: Vec<RasterSummary>,
    pub samples: Vec<SampleTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

/// Report file format, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
}

impl ReportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(ReportFormat::Json),
            Some("csv") => Ok(ReportFormat::Csv),
            _ => Err(RunnerError::UnsupportedReportFormat(path.to_path_buf())),
        }
    }
}

impl Report {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            config: None,
            steps: Vec::new(),
            rasters: Vec::new(),
            samples: Vec::new(),
            comparison: None,
        }
    }

    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed_steps() > 0
    }

    /// Write the report in the format implied by the file extension.
    pub fn write(&self, path: &Path) -> Result<()> {
        let format = ReportFormat::from_path(path)?;
        create_parent(path)?;
        match format {
            ReportFormat::Json => {
                let writer = BufWriter::new(File::create(path)?);
                serde_json::to_writer_pretty(writer, self)?;
            }
            ReportFormat::Csv => self.write_comparison_csv(path)?,
        }
        info!(path = %path.display(), "Wrote report");
        Ok(())
    }

    fn write_comparison_csv(&self, path: &Path) -> Result<()> {
        let comparison = self.comparison.clone().unwrap_or_default();
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec![
            "station".to_string(),
            "latitude".to_string(),
            "longitude".to_string(),
        ];
        header.extend(comparison.dems.iter().cloned());
        writer.write_record(&header)?;

        for row in &comparison.stations {
            let mut record = vec![
                row.station.clone(),
                row.latitude.to_string(),
                row.longitude.to_string(),
            ];
            record.extend(
                row.elevations
                    .iter()
                    .map(|e| e.map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Log each station's elevation per DEM, rounded to whole meters.
    pub fn log_comparison(&self) {
        let Some(comparison) = &self.comparison else {
            return;
        };
        for row in &comparison.stations {
            let elevations: Vec<String> = row
                .elevations
                .iter()
                .map(|e| e.map_or_else(|| "-".to_string(), |v| format!("{:.0}", v)))
                .collect();
            info!(
                station = %row.station,
                dems = %comparison.dems.join(" | "),
                elevations = %elevations.join(" | "),
                "Station elevation"
            );
        }
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
