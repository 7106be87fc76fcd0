//! YAML pipeline configuration.
//!
//! A pipeline is a list of steps run in order. DEM sets, file names and EPSG
//! codes are all configuration:
//!
//! ```yaml
//! stations:
//!   path: stations.csv
//! steps:
//!   - kind: merge
//!     source_dir: tiles
//!     selector: { latitude: 51 }
//!     output: merged.tif
//!   - kind: sample
//!     label: ASTGDEMv20 WGS-84
//!     dem: merged.tif
//! ```

use crate::{Result, RunnerError};
use elev_dem::{ExtentPolicy, PixelType, RasterFormat, TileOrder, TileSelector};
use elev_stations::StationColumns;
use elev_warp::WarpConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

fn default_extension() -> String {
    ".tif".to_string()
}

fn default_true() -> bool {
    true
}

/// Top-level pipeline file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub warp: WarpConfig,
    /// Required by `sample` steps.
    #[serde(default)]
    pub stations: Option<StationsConfig>,
    /// Keep running after a failed step.
    #[serde(default)]
    pub continue_on_error: bool,
    /// Report destination; `.json` or `.csv`.
    #[serde(default)]
    pub report: Option<PathBuf>,
    pub steps: Vec<Step>,
}

/// Station CSV location and column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub columns: StationColumns,
}

/// One pipeline step, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    TrimTiles(TrimTilesStep),
    Merge(MergeStep),
    Reproject(ReprojectStep),
    Info(InfoStep),
    Sample(SampleStep),
}

/// Remove the overlap row and column of every tile in a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimTilesStep {
    #[serde(default)]
    pub label: Option<String>,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub pixel_type: PixelType,
    #[serde(default)]
    pub format: RasterFormat,
}

/// Merge the tiles of a directory into one raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeStep {
    #[serde(default)]
    pub label: Option<String>,
    pub source_dir: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_selector")]
    pub selector: TileSelector,
    #[serde(default)]
    pub order: TileOrder,
    /// Drop the overlap row and column before merging.
    #[serde(default = "default_true")]
    pub trim: bool,
    /// Merge one strip per tile latitude and stack the strips north to south.
    #[serde(default)]
    pub stack_latitudes: bool,
    pub output: PathBuf,
    #[serde(default)]
    pub pixel_type: PixelType,
    #[serde(default)]
    pub format: RasterFormat,
}

fn default_selector() -> TileSelector {
    TileSelector::All
}

/// Reproject a raster with the warp program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprojectStep {
    #[serde(default)]
    pub label: Option<String>,
    pub input: PathBuf,
    pub output: PathBuf,
    pub from_epsg: u32,
    pub to_epsg: u32,
}

/// Summarise a raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoStep {
    #[serde(default)]
    pub label: Option<String>,
    pub dem: PathBuf,
}

/// Sample a DEM at every station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleStep {
    #[serde(default)]
    pub label: Option<String>,
    pub dem: PathBuf,
    /// 0-based band.
    #[serde(default)]
    pub band: usize,
    #[serde(default)]
    pub on_out_of_extent: ExtentPolicy,
    /// Optional CSV file for this step's sample table.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::TrimTiles(_) => "trim_tiles",
            Step::Merge(_) => "merge",
            Step::Reproject(_) => "reproject",
            Step::Info(_) => "info",
            Step::Sample(_) => "sample",
        }
    }

    /// Explicit label, or the kind followed by the step's main path.
    pub fn label(&self) -> String {
        let (label, path) = match self {
            Step::TrimTiles(s) => (&s.label, &s.source_dir),
            Step::Merge(s) => (&s.label, &s.output),
            Step::Reproject(s) => (&s.label, &s.output),
            Step::Info(s) => (&s.label, &s.dem),
            Step::Sample(s) => (&s.label, &s.dem),
        };
        match label {
            Some(label) => label.clone(),
            None => format!("{} {}", self.kind(), path.display()),
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        match self {
            Step::TrimTiles(s) => {
                resolve(base, &mut s.source_dir);
                resolve(base, &mut s.output_dir);
            }
            Step::Merge(s) => {
                resolve(base, &mut s.source_dir);
                resolve(base, &mut s.output);
            }
            Step::Reproject(s) => {
                resolve(base, &mut s.input);
                resolve(base, &mut s.output);
            }
            Step::Info(s) => resolve(base, &mut s.dem),
            Step::Sample(s) => {
                resolve(base, &mut s.dem);
                if let Some(output) = &mut s.output {
                    resolve(base, output);
                }
            }
        }
    }
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl PipelineConfig {
    /// Load a pipeline file; relative paths resolve against its directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut config: PipelineConfig =
            serde_yaml::from_str(&text).map_err(|source| RunnerError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Parse a pipeline from YAML text without resolving paths.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_yaml::from_str(text).map_err(|source| RunnerError::ConfigParse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Make every relative path absolute with respect to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(stations) = &mut self.stations {
            resolve(base, &mut stations.path);
        }
        if let Some(report) = &mut self.report {
            resolve(base, report);
        }
        for step in &mut self.steps {
            step.resolve_paths(base);
        }
    }

    /// Check the structural rules of a pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(RunnerError::InvalidConfig(
                "pipeline has no steps".to_string(),
            ));
        }

        if self.stations.is_none() {
            if let Some(step) = self.steps.iter().find(|s| matches!(s, Step::Sample(_))) {
                return Err(RunnerError::InvalidConfig(format!(
                    "step '{}' samples stations but no stations section is configured",
                    step.label()
                )));
            }
        }

        let mut labels = HashSet::new();
        for step in &self.steps {
            let label = step.label();
            if !labels.insert(label.clone()) {
                return Err(RunnerError::InvalidConfig(format!(
                    "duplicate step label '{}'",
                    label
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE: &str = r#"
warp:
  extra_args: [-r, near]
stations:
  path: data/stations.csv
  columns: { name: Site }
report: out/report.json
steps:
  - kind: trim_tiles
    source_dir: tiles
    output_dir: trimmed
  - kind: merge
    source_dir: trimmed
    selector: { contains: ASTGTM2 }
    trim: false
    output: merged.tif
  - kind: reproject
    input: merged.tif
    output: /abs/merged_4277.tif
    from_epsg: 4326
    to_epsg: 4277
  - kind: info
    dem: merged.tif
  - kind: sample
    label: ASTGDEMv20 WGS-84
    dem: merged.tif
    on_out_of_extent: skip
"#;

    #[test]
    fn test_parse_pipeline() {
        let config = PipelineConfig::from_yaml(PIPELINE).unwrap();
        assert_eq!(config.steps.len(), 5);
        assert!(!config.continue_on_error);
        assert_eq!(config.warp.extra_args, ["-r", "near"]);
        let stations = config.stations.as_ref().unwrap();
        assert_eq!(stations.columns.name, "Site");
        assert_eq!(stations.columns.latitude, "Latitude");

        match &config.steps[0] {
            Step::TrimTiles(step) => {
                assert_eq!(step.extension, ".tif");
                assert_eq!(step.pixel_type, PixelType::UInt16);
            }
            other => panic!("unexpected step {other:?}"),
        }
        match &config.steps[1] {
            Step::Merge(step) => {
                assert_eq!(step.selector, TileSelector::Contains("ASTGTM2".into()));
                assert!(!step.trim);
                assert_eq!(step.order, TileOrder::NameDescending);
            }
            other => panic!("unexpected step {other:?}"),
        }
        match &config.steps[4] {
            Step::Sample(step) => assert_eq!(step.on_out_of_extent, ExtentPolicy::Skip),
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_labels() {
        let config = PipelineConfig::from_yaml(PIPELINE).unwrap();
        let labels: Vec<String> = config.steps.iter().map(Step::label).collect();
        assert_eq!(labels[0], "trim_tiles tiles");
        assert_eq!(labels[3], "info merged.tif");
        assert_eq!(labels[4], "ASTGDEMv20 WGS-84");
    }

    #[test]
    fn test_resolve_paths() {
        let mut config = PipelineConfig::from_yaml(PIPELINE).unwrap();
        config.resolve_paths(Path::new("/work"));
        assert_eq!(config.stations.unwrap().path, Path::new("/work/data/stations.csv"));
        assert_eq!(config.report.unwrap(), Path::new("/work/out/report.json"));
        match &config.steps[2] {
            Step::Reproject(step) => {
                assert_eq!(step.input, Path::new("/work/merged.tif"));
                assert_eq!(step.output, Path::new("/abs/merged_4277.tif"));
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_validation() {
        let err = PipelineConfig::from_yaml("steps: []").unwrap_err();
        assert!(matches!(err, RunnerError::InvalidConfig(_)));

        let err = PipelineConfig::from_yaml("steps:\n  - kind: sample\n    dem: a.tif\n").unwrap_err();
        assert!(err.to_string().contains("no stations section"));

        let duplicate = "steps:\n  - kind: info\n    dem: a.tif\n  - kind: info\n    dem: a.tif\n";
        let err = PipelineConfig::from_yaml(duplicate).unwrap_err();
        assert!(err.to_string().contains("duplicate step label 'info a.tif'"));
    }

    #[test]
    fn test_unknown_kind_is_parse_error() {
        let err = PipelineConfig::from_yaml("steps:\n  - kind: display\n    dem: a.tif\n").unwrap_err();
        assert!(matches!(err, RunnerError::ConfigParse { .. }));
    }
}
