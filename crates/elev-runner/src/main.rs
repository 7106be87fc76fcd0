//! `elev` command line.

use clap::{Parser, Subcommand};
use elev_dem::{
    merge_row_strip_with, write_raster, ExtentPolicy, MergeOptions, PixelType, RasterFormat,
    TileOrder, TileSelector,
};
use elev_runner::pipeline::{load_tiles, merge_by_latitude, raster_info, sample_stations, trim_tiles};
use elev_runner::report::Comparison;
use elev_runner::{Pipeline, Report, Result};
use elev_stations::{read_stations, StationColumns};
use elev_warp::Reprojector;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "elev")]
#[command(about = "Merge DEM tiles, reproject them and sample station elevations")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a YAML pipeline.
    Run {
        /// Pipeline file
        config: PathBuf,
    },

    /// Print the parameters of a DEM.
    Info {
        /// GeoTIFF file
        dem: PathBuf,
    },

    /// Sample a DEM at every station of a CSV file.
    Sample {
        #[arg(long)]
        dem: PathBuf,

        /// Station CSV file
        #[arg(long)]
        stations: PathBuf,

        /// 0-based band to sample
        #[arg(long, default_value_t = 0)]
        band: usize,

        /// What to do with stations outside the DEM (abort or skip)
        #[arg(long, default_value = "abort")]
        on_out_of_extent: ExtentPolicy,

        /// Station name column
        #[arg(long, default_value = "SiteName")]
        name_column: String,

        /// Latitude column
        #[arg(long, default_value = "Latitude")]
        latitude_column: String,

        /// Longitude column
        #[arg(long, default_value = "Longitude")]
        longitude_column: String,

        /// Write the result as a .json or .csv report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove the overlap row and column of every tile in a directory.
    Trim {
        #[arg(long)]
        source_dir: PathBuf,

        #[arg(long)]
        output_dir: PathBuf,

        #[arg(long, default_value = ".tif")]
        extension: String,

        /// uint16, int16, float32 or float64
        #[arg(long, default_value = "uint16")]
        pixel_type: PixelType,
    },

    /// Merge the tiles of a directory into one DEM.
    Merge {
        #[arg(long)]
        source_dir: PathBuf,

        /// Only tiles whose name contains this text
        #[arg(long, conflicts_with = "latitude")]
        contains: Option<String>,

        /// Only tiles whose name encodes this latitude
        #[arg(long, allow_hyphen_values = true)]
        latitude: Option<i32>,

        /// Merge one strip per latitude and stack them north to south
        #[arg(long, conflicts_with = "latitude")]
        stack: bool,

        #[arg(short, long)]
        output: PathBuf,

        /// Keep the overlap row and column of each tile
        #[arg(long)]
        no_trim: bool,

        /// Order tiles by origin instead of descending name
        #[arg(long)]
        order_by_origin: bool,

        #[arg(long, default_value = ".tif")]
        extension: String,

        #[arg(long, default_value = "uint16")]
        pixel_type: PixelType,
    },

    /// Reproject a DEM with gdalwarp.
    Reproject {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Source EPSG code
        #[arg(long)]
        from: u32,

        /// Target EPSG code
        #[arg(long)]
        to: u32,

        /// Warp program
        #[arg(long, default_value = elev_warp::DEFAULT_PROGRAM)]
        program: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn,elev=info",
            1 => "warn,elev=debug",
            _ => "warn,elev=trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Execute a command; `Ok(false)` when it completed with failed steps.
fn run(command: Command) -> Result<bool> {
    match command {
        Command::Run { config } => {
            let report = Pipeline::load(&config)?.run()?;
            let failed = report.failed_steps();
            info!(
                "Pipeline finished: {} steps, {} failed",
                report.steps.len(),
                failed
            );
            Ok(failed == 0)
        }

        Command::Info { dem } => {
            let info = raster_info(&dem)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(true)
        }

        Command::Sample {
            dem,
            stations,
            band,
            on_out_of_extent,
            name_column,
            latitude_column,
            longitude_column,
            output,
        } => {
            let columns = StationColumns {
                name: name_column,
                latitude: latitude_column,
                longitude: longitude_column,
            };
            let stations = read_stations(&stations, &columns)?;
            let label = dem.display().to_string();
            let table = sample_stations(&label, &dem, band, &stations, on_out_of_extent)?;

            let mut report = Report::new();
            report.comparison = Some(Comparison::build(&stations, std::slice::from_ref(&table)));
            report.samples.push(table);
            report.log_comparison();

            if let Some(path) = output {
                report.write(&path)?;
            }
            Ok(true)
        }

        Command::Trim {
            source_dir,
            output_dir,
            extension,
            pixel_type,
        } => {
            let written = trim_tiles(
                &source_dir,
                &output_dir,
                &extension,
                pixel_type,
                RasterFormat::GTiff,
            )?;
            info!("Trimmed {} tiles into {}", written.len(), output_dir.display());
            Ok(true)
        }

        Command::Merge {
            source_dir,
            contains,
            latitude,
            stack,
            output,
            no_trim,
            order_by_origin,
            extension,
            pixel_type,
        } => {
            let selector = match (contains, latitude) {
                (Some(text), _) => TileSelector::Contains(text),
                (None, Some(lat)) => TileSelector::Latitude(lat),
                (None, None) => TileSelector::All,
            };
            let options = MergeOptions {
                order: if order_by_origin {
                    TileOrder::OriginX
                } else {
                    TileOrder::NameDescending
                },
                trim: !no_trim,
            };

            let tiles = load_tiles(&source_dir, &extension)?;
            let merged = if stack {
                merge_by_latitude(&tiles, &selector, options)?
            } else {
                merge_row_strip_with(&tiles, &selector, options)?
            };
            write_raster(&output, &merged, pixel_type, RasterFormat::GTiff)?;
            info!("Wrote {}: {}", output.display(), merged.info());
            Ok(true)
        }

        Command::Reproject {
            input,
            output,
            from,
            to,
            program,
        } => {
            let kind = Reprojector::new()
                .with_program(program)
                .reproject(&input, &output, from, to)?;
            info!("{} EPSG:{} -> EPSG:{} written to {}", kind, from, to, output.display());
            Ok(true)
        }
    }
}
