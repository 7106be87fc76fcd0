//! End-to-end pipeline runs over GeoTIFF tiles written to a temporary directory.

use elev_dem::{read_geotiff, write_geotiff, Crs, GeoTransform, PixelType, Raster};
use elev_runner::{Pipeline, PipelineConfig, RunnerError, StepStatus};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// An 11x11 one-degree tile (0.1 degree cells plus the overlap pixel),
/// valued `base + row * 11 + col`.
fn write_tile(dir: &Path, name: &str, lat: i32, lon: i32, base: f64) {
    let data = (0..121).map(|i| base + i as f64).collect();
    let gt = GeoTransform::north_up(lon as f64, lat as f64 + 1.0, 0.1, -0.1);
    let raster = Raster::new(data, 1, 11, 11, gt, Crs::WGS84, Some(-9999.0)).unwrap();
    fs::create_dir_all(dir).unwrap();
    write_geotiff(dir.join(name), &raster, PixelType::UInt16).unwrap();
}

fn write_london_tiles(root: &Path) {
    let tiles = root.join("tiles");
    write_tile(&tiles, "ASTGTM2_N51W001_dem.tif", 51, -1, 1000.0);
    write_tile(&tiles, "ASTGTM2_N51E000_dem.tif", 51, 0, 2000.0);
}

fn write_stations(root: &Path, rows: &str) {
    fs::write(
        root.join("stations.csv"),
        format!("SiteName,Latitude,Longitude\n{}", rows),
    )
    .unwrap();
}

fn write_config(root: &Path, yaml: &str) -> std::path::PathBuf {
    let path = root.join("pipeline.yaml");
    fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn test_trim_merge_info_sample() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_london_tiles(root);
    write_stations(root, "Ealing,51.5,-0.5\nGreenwich,51.2,0.3\n");
    let config = write_config(
        root,
        r#"
stations:
  path: stations.csv
report: out/report.json
steps:
  - kind: trim_tiles
    source_dir: tiles
    output_dir: trimmed
  - kind: merge
    source_dir: trimmed
    selector: { latitude: 51 }
    trim: false
    output: merged.tif
  - kind: info
    dem: merged.tif
  - kind: sample
    label: ASTGDEMv20 WGS-84
    dem: merged.tif
    output: out/wgs84.csv
"#,
    );

    let report = Pipeline::load(&config).unwrap().run().unwrap();
    assert_eq!(report.steps.len(), 4);
    assert!(report.steps.iter().all(|s| s.status == StepStatus::Succeeded));
    assert_eq!(report.steps[0].outputs.len(), 2);

    let trimmed = read_geotiff(root.join("trimmed/ASTGTM2_N51W001_dem.tif")).unwrap();
    assert_eq!(trimmed.dimensions(), (10, 10));

    let merged = read_geotiff(root.join("merged.tif")).unwrap();
    assert_eq!(merged.dimensions(), (10, 20));
    assert_eq!(report.rasters.len(), 2);
    assert_eq!(report.rasters[1].info.cols, 20);

    // W001 precedes E000 in descending name order.
    let rows = &report.samples[0].rows;
    assert_eq!(rows[0].station, "Ealing");
    assert_eq!((rows[0].row, rows[0].column), (5, 5));
    assert_eq!(rows[0].elevation, Some(1000.0 + 5.0 * 11.0 + 5.0));
    assert_eq!((rows[1].row, rows[1].column), (8, 13));
    assert_eq!(rows[1].elevation, Some(2000.0 + 8.0 * 11.0 + 3.0));

    let comparison = report.comparison.as_ref().unwrap();
    assert_eq!(comparison.dems, ["ASTGDEMv20 WGS-84"]);
    assert_eq!(comparison.stations[1].elevations, [Some(2091.0)]);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.join("out/report.json")).unwrap()).unwrap();
    assert_eq!(json["steps"].as_array().unwrap().len(), 4);
    assert_eq!(json["steps"][1]["kind"], "merge");
    assert_eq!(json["rasters"][0]["info"]["crs"], "EPSG:4326");

    let csv = fs::read_to_string(root.join("out/wgs84.csv")).unwrap();
    assert_eq!(csv.lines().count(), 3);
}

#[cfg(unix)]
#[test]
fn test_reproject_and_compare() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_london_tiles(root);
    write_stations(root, "Ealing,51.5,-0.5\n");
    let script = root.join("fake_gdalwarp.sh");
    fs::write(&script, "cp \"$5\" \"$6\"\n").unwrap();

    let config = write_config(
        root,
        &format!(
            r#"
warp:
  program: sh
  extra_args: ["{}"]
stations:
  path: stations.csv
report: report.csv
steps:
  - kind: merge
    source_dir: tiles
    output: merged.tif
  - kind: reproject
    input: merged.tif
    output: merged_4277.tif
    from_epsg: 4326
    to_epsg: 4277
  - kind: sample
    label: WGS-84
    dem: merged.tif
  - kind: sample
    label: OSGB-36
    dem: merged_4277.tif
"#,
            script.display()
        ),
    );

    let report = Pipeline::load(&config).unwrap().run().unwrap();
    assert!(!report.has_failures());
    assert!(root.join("merged_4277.tif").exists());

    let comparison = report.comparison.as_ref().unwrap();
    assert_eq!(comparison.dems, ["WGS-84", "OSGB-36"]);
    assert_eq!(comparison.stations[0].elevations, [Some(1060.0), Some(1060.0)]);

    let csv = fs::read_to_string(root.join("report.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "station,latitude,longitude,WGS-84,OSGB-36");
    assert_eq!(lines[1], "Ealing,51.5,-0.5,1060,1060");
}

#[test]
fn test_skip_out_of_extent_stations() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_london_tiles(root);
    write_stations(root, "Edinburgh,55.95,-3.19\nEaling,51.5,-0.5\n");
    let config = write_config(
        root,
        r#"
stations:
  path: stations.csv
steps:
  - kind: merge
    source_dir: tiles
    output: merged.tif
  - kind: sample
    dem: merged.tif
    on_out_of_extent: skip
"#,
    );

    let report = Pipeline::load(&config).unwrap().run().unwrap();
    let table = &report.samples[0];
    assert_eq!(table.skipped.len(), 1);
    assert_eq!(table.skipped[0].index, 0);
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].index, 1);

    let comparison = report.comparison.as_ref().unwrap();
    assert_eq!(comparison.stations[0].elevations, [None]);
    assert_eq!(comparison.stations[1].elevations, [Some(1060.0)]);
}

#[test]
fn test_out_of_extent_aborts_by_default() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_london_tiles(root);
    write_stations(root, "Edinburgh,55.95,-3.19\n");
    let config = write_config(
        root,
        r#"
stations:
  path: stations.csv
report: report.json
steps:
  - kind: merge
    source_dir: tiles
    output: merged.tif
  - kind: sample
    label: merged
    dem: merged.tif
  - kind: info
    dem: merged.tif
"#,
    );

    let err = Pipeline::load(&config).unwrap().run().unwrap_err();
    match err {
        RunnerError::StepFailed { label, source } => {
            assert_eq!(label, "merged");
            assert!(matches!(
                *source,
                RunnerError::Dem(elev_dem::DemError::OutOfExtent { index: 0, .. })
            ));
        }
        other => panic!("expected StepFailed, got {other:?}"),
    }

    // The report is still written, and the step after the failure never ran.
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.join("report.json")).unwrap()).unwrap();
    let steps = json["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1]["status"], "failed");
    assert!(root.join("merged.tif").exists());
}

#[test]
fn test_continue_on_error() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_london_tiles(root);
    let config = write_config(
        root,
        r#"
continue_on_error: true
steps:
  - kind: info
    dem: missing.tif
  - kind: merge
    source_dir: tiles
    selector: { contains: N40 }
    output: none.tif
  - kind: info
    dem: tiles/ASTGTM2_N51E000_dem.tif
"#,
    );

    let report = Pipeline::load(&config).unwrap().run().unwrap();
    assert_eq!(report.failed_steps(), 2);
    assert_eq!(report.steps[2].status, StepStatus::Succeeded);
    assert!(report.steps[1].error.as_ref().unwrap().contains("No tiles selected"));
    assert!(!root.join("none.tif").exists());
}

#[test]
fn test_stack_latitudes() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let tiles = root.join("tiles");
    write_tile(&tiles, "ASTGTM2_N51W001_dem.tif", 51, -1, 1000.0);
    write_tile(&tiles, "ASTGTM2_N50W001_dem.tif", 50, -1, 3000.0);
    let config = write_config(
        root,
        r#"
steps:
  - kind: merge
    source_dir: tiles
    stack_latitudes: true
    output: mosaic.tif
"#,
    );

    Pipeline::load(&config).unwrap().run().unwrap();
    let mosaic = read_geotiff(root.join("mosaic.tif")).unwrap();
    assert_eq!(mosaic.dimensions(), (20, 10));
    assert_eq!(mosaic.get(0, 0, 0), Some(1000.0));
    assert_eq!(mosaic.get(0, 10, 0), Some(3000.0));
}

#[test]
fn test_missing_station_file_still_writes_report() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_london_tiles(root);
    let config = write_config(
        root,
        r#"
stations:
  path: no_such_stations.csv
report: report.json
steps:
  - kind: merge
    source_dir: tiles
    output: merged.tif
  - kind: sample
    dem: merged.tif
"#,
    );

    let err = Pipeline::load(&config).unwrap().run().unwrap_err();
    assert!(matches!(err, RunnerError::Stations(_)));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.join("report.json")).unwrap()).unwrap();
    assert!(json["steps"].as_array().unwrap().is_empty());
    assert!(!root.join("merged.tif").exists());
}

#[test]
fn test_invalid_config_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "steps:\n  - kind: sample\n    dem: a.tif\n");
    assert!(matches!(
        PipelineConfig::load(&config),
        Err(RunnerError::InvalidConfig(_))
    ));
}
