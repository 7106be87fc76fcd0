//! Pipeline execution.
//!
//! Steps run in order, synchronously. Each step reads its inputs from disk and
//! writes its outputs to new files, so a failing step never touches files
//! written by other steps.

use crate::config::{
    InfoStep, MergeStep, PipelineConfig, ReprojectStep, SampleStep, Step, TrimTilesStep,
};
use crate::files::{file_name, list_files};
use crate::report::{Comparison, RasterSummary, Report, SampleRow, SampleTable, StepOutcome, StepStatus};
use crate::{Result, RunnerError};
use elev_dem::{
    merge_row_strip_with, read_geotiff, sample_band_with_policy, stack_row_strips, trim_overlap,
    write_raster, DemError, ExtentPolicy, MergeOptions, NamedTile, PixelType, Raster, RasterFormat,
    RasterInfo, TileName, TilePredicate, TileSelector,
};
use elev_stations::{coordinates, read_stations, Station};
use elev_warp::Reprojector;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

/// What a successful step produced.
#[derive(Debug, Default)]
struct StepOutput {
    files: Vec<PathBuf>,
    rasters: Vec<RasterSummary>,
    samples: Option<SampleTable>,
}

/// A loaded pipeline ready to run.
pub struct Pipeline {
    config: PipelineConfig,
    config_path: Option<PathBuf>,
    reprojector: Reprojector,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let reprojector = Reprojector::from_config(config.warp.clone());
        Self {
            config,
            config_path: None,
            reprojector,
        }
    }

    /// Load and validate a pipeline file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut pipeline = Self::new(PipelineConfig::load(path)?);
        pipeline.config_path = Some(path.to_path_buf());
        Ok(pipeline)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every step and write the report, if one is configured.
    ///
    /// Stops at the first failing step unless `continue_on_error` is set. The
    /// report is written in both cases, and also when the station file cannot
    /// be read, in which case no step runs.
    pub fn run(&self) -> Result<Report> {
        let mut report = Report::new();
        report.config = self.config_path.clone();

        let needs_stations = self.config.steps.iter().any(|s| matches!(s, Step::Sample(_)));
        let stations = match &self.config.stations {
            Some(cfg) if needs_stations => match read_stations(&cfg.path, &cfg.columns) {
                Ok(stations) => stations,
                Err(e) => {
                    error!(path = %cfg.path.display(), "Failed to load stations: {}", e);
                    self.finish(&mut report, &[])?;
                    return Err(e.into());
                }
            },
            _ => Vec::new(),
        };

        let total = self.config.steps.len();
        for (i, step) in self.config.steps.iter().enumerate() {
            let label = step.label();
            info!("[{}/{}] Running {}", i + 1, total, label);
            let start = Instant::now();
            let result = self.run_step(step, &label, &stations);
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    info!(step = %label, duration_ms, "Step complete");
                    report.steps.push(StepOutcome {
                        label,
                        kind: step.kind(),
                        status: StepStatus::Succeeded,
                        error: None,
                        outputs: output.files,
                        duration_ms,
                    });
                    report.rasters.extend(output.rasters);
                    report.samples.extend(output.samples);
                }
                Err(e) => {
                    error!(step = %label, "Step failed: {}", e);
                    report.steps.push(StepOutcome {
                        label: label.clone(),
                        kind: step.kind(),
                        status: StepStatus::Failed,
                        error: Some(e.to_string()),
                        outputs: Vec::new(),
                        duration_ms,
                    });
                    if !self.config.continue_on_error {
                        self.finish(&mut report, &stations)?;
                        return Err(RunnerError::StepFailed {
                            label,
                            source: Box::new(e),
                        });
                    }
                }
            }
        }

        self.finish(&mut report, &stations)?;
        Ok(report)
    }

    fn finish(&self, report: &mut Report, stations: &[Station]) -> Result<()> {
        if !report.samples.is_empty() {
            report.comparison = Some(Comparison::build(stations, &report.samples));
            report.log_comparison();
        }
        if let Some(path) = &self.config.report {
            report.write(path)?;
        }
        Ok(())
    }

    fn run_step(&self, step: &Step, label: &str, stations: &[Station]) -> Result<StepOutput> {
        match step {
            Step::TrimTiles(s) => run_trim(s),
            Step::Merge(s) => run_merge(s, label),
            Step::Reproject(s) => self.run_reproject(s),
            Step::Info(s) => run_info(s, label),
            Step::Sample(s) => run_sample(s, label, stations),
        }
    }

    fn run_reproject(&self, step: &ReprojectStep) -> Result<StepOutput> {
        let kind = self
            .reprojector
            .reproject(&step.input, &step.output, step.from_epsg, step.to_epsg)?;
        info!(%kind, output = %step.output.display(), "Reprojected");
        Ok(StepOutput {
            files: vec![step.output.clone()],
            ..Default::default()
        })
    }
}

fn run_trim(step: &TrimTilesStep) -> Result<StepOutput> {
    let files = trim_tiles(
        &step.source_dir,
        &step.output_dir,
        &step.extension,
        step.pixel_type,
        step.format,
    )?;
    Ok(StepOutput {
        files,
        ..Default::default()
    })
}

fn run_merge(step: &MergeStep, label: &str) -> Result<StepOutput> {
    let options = MergeOptions {
        order: step.order,
        trim: step.trim,
    };
    let tiles = load_tiles(&step.source_dir, &step.extension)?;
    let merged = if step.stack_latitudes {
        merge_by_latitude(&tiles, &step.selector, options)?
    } else {
        merge_row_strip_with(&tiles, &step.selector, options)?
    };
    write_raster(&step.output, &merged, step.pixel_type, step.format)?;
    info!(path = %step.output.display(), "Wrote merged DEM");

    Ok(StepOutput {
        files: vec![step.output.clone()],
        rasters: vec![RasterSummary {
            step: label.to_string(),
            path: step.output.clone(),
            info: merged.info(),
        }],
        samples: None,
    })
}

fn run_info(step: &InfoStep, label: &str) -> Result<StepOutput> {
    let info = raster_info(&step.dem)?;
    Ok(StepOutput {
        rasters: vec![RasterSummary {
            step: label.to_string(),
            path: step.dem.clone(),
            info,
        }],
        ..Default::default()
    })
}

fn run_sample(step: &SampleStep, label: &str, stations: &[Station]) -> Result<StepOutput> {
    let table = sample_stations(label, &step.dem, step.band, stations, step.on_out_of_extent)?;
    let mut files = Vec::new();
    if let Some(output) = &step.output {
        table.write_csv(output)?;
        files.push(output.clone());
    }
    Ok(StepOutput {
        files,
        samples: Some(table),
        ..Default::default()
    })
}

/// Read every tile ending in `extension` from `dir`, named by file name.
pub fn load_tiles(dir: &Path, extension: &str) -> Result<Vec<NamedTile>> {
    let files = list_files(dir, extension)?;
    if files.is_empty() {
        return Err(RunnerError::NoInputFiles {
            dir: dir.to_path_buf(),
            suffix: extension.to_string(),
        });
    }
    files
        .iter()
        .map(|path| {
            let raster = read_geotiff(path)?;
            debug!(tile = %file_name(path), rows = raster.rows(), cols = raster.cols(), "Loaded tile");
            Ok(NamedTile::new(file_name(path), raster))
        })
        .collect()
}

/// Trim the overlap of every tile in `source_dir`, writing tiles of the same
/// name to `output_dir`.
pub fn trim_tiles(
    source_dir: &Path,
    output_dir: &Path,
    extension: &str,
    pixel_type: PixelType,
    format: RasterFormat,
) -> Result<Vec<PathBuf>> {
    let files = list_files(source_dir, extension)?;
    if files.is_empty() {
        return Err(RunnerError::NoInputFiles {
            dir: source_dir.to_path_buf(),
            suffix: extension.to_string(),
        });
    }
    fs::create_dir_all(output_dir)?;

    let mut written = Vec::with_capacity(files.len());
    for (i, path) in files.iter().enumerate() {
        let name = file_name(path);
        let raster = read_geotiff(path)?;
        let trimmed = trim_overlap(&name, &raster)?;
        let output = output_dir.join(&name);
        write_raster(&output, &trimmed, pixel_type, format)?;
        info!(
            "[{}/{}] Trimmed {}: {}x{} -> {}x{}",
            i + 1,
            files.len(),
            name,
            raster.rows(),
            raster.cols(),
            trimmed.rows(),
            trimmed.cols()
        );
        written.push(output);
    }
    Ok(written)
}

/// Merge one row strip per tile latitude and stack the strips north to south.
pub fn merge_by_latitude(
    tiles: &[NamedTile],
    selector: &TileSelector,
    options: MergeOptions,
) -> Result<Raster> {
    let mut latitudes: BTreeMap<i32, Vec<NamedTile>> = BTreeMap::new();
    for tile in tiles.iter().filter(|t| selector.matches(&t.name)) {
        let lat = TileName::parse(&tile.name)
            .ok_or_else(|| DemError::InvalidFilename(tile.name.clone()))?
            .lat;
        latitudes.entry(lat).or_default().push(tile.clone());
    }
    if latitudes.is_empty() {
        return Err(DemError::NoTilesSelected {
            selector: selector.describe(),
        }
        .into());
    }

    let strips = latitudes
        .into_iter()
        .map(|(lat, group)| {
            let strip = merge_row_strip_with(&group, &TileSelector::Latitude(lat), options)?;
            Ok(NamedTile::new(format!("latitude {}", lat), strip))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(stack_row_strips(&strips)?)
}

/// Read a raster and log its parameters.
pub fn raster_info(path: &Path) -> Result<RasterInfo> {
    let info = read_geotiff(path)?.info();
    info!(path = %path.display(), "{}", info);
    Ok(info)
}

/// Sample one band of a DEM at every station.
pub fn sample_stations(
    label: &str,
    dem: &Path,
    band: usize,
    stations: &[Station],
    policy: ExtentPolicy,
) -> Result<SampleTable> {
    let raster = read_geotiff(dem)?;
    info!(dem = %dem.display(), "{}", raster.info());

    let batch = sample_band_with_policy(&raster, band, &coordinates(stations), policy)?;
    let rows: Vec<SampleRow> = batch
        .results
        .iter()
        .map(|result| SampleRow::new(&stations[result.index], result))
        .collect();

    info!(
        dem = %dem.display(),
        sampled = rows.len(),
        skipped = batch.skipped.len(),
        no_data = rows.iter().filter(|r| r.elevation.is_none()).count(),
        "Sampled stations"
    );

    Ok(SampleTable {
        label: label.to_string(),
        dem: dem.to_path_buf(),
        crs: raster.crs(),
        band,
        rows,
        skipped: batch.skipped,
    })
}
