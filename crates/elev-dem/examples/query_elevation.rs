//! Example: Query elevation from a DEM GeoTIFF.
//!
//! Usage: cargo run --example query_elevation -- <dem.tif> <lat> <lon>

use elev_dem::{read_geotiff, sample, Coordinate};
use std::env;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 4 {
        eprintln!("Usage: {} <dem.tif> <lat> <lon>", args[0]);
        eprintln!("Example: {} ./dem/N51.tif 51.4778 -0.0015", args[0]);
        std::process::exit(1);
    }

    let lat: f64 = args[2].parse().expect("Invalid latitude");
    let lon: f64 = args[3].parse().expect("Invalid longitude");

    println!("Loading {}...", args[1]);
    let start = Instant::now();
    let raster = read_geotiff(&args[1]).expect("Failed to read DEM");
    println!("Loaded in {:.3}s: {}", start.elapsed().as_secs_f64(), raster.info());

    let bounds = raster.bounds();
    println!(
        "Coverage: lat {:.2}° to {:.2}°, lon {:.2}° to {:.2}°",
        bounds.min_lat, bounds.max_lat, bounds.min_lon, bounds.max_lon
    );

    println!("\nQuerying elevation at ({}, {})...", lat, lon);
    match sample(&raster, &[Coordinate::new(lat, lon)]) {
        Ok(results) => {
            let result = &results[0];
            match result.value() {
                Some(elevation) => println!(
                    "Elevation: {:.2} meters (row {}, column {})",
                    elevation, result.row, result.column
                ),
                None => println!("No data at row {}, column {}", result.row, result.column),
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
