//! Integration tests for elev-dem using GeoTIFF files written to a temporary directory.

use approx::assert_relative_eq;
use elev_dem::{
    merge_row_strip, read_geotiff, sample, write_geotiff, write_raster, Coordinate, Crs, DemError,
    GeoTransform, NamedTile, PixelType, Raster, RasterFormat, TileName, TileSelector,
};
use std::path::Path;
use tempfile::TempDir;

/// A tile covering one degree with `size` pixels per side (one overlap pixel).
fn degree_tile(lat: i32, lon: i32, size: usize, base: f64) -> Raster {
    let step = 1.0 / (size - 1) as f64;
    let data = (0..size * size).map(|i| base + i as f64).collect();
    let gt = GeoTransform::north_up(lon as f64, lat as f64 + 1.0, step, -step);
    Raster::new(data, 1, size, size, gt, Crs::WGS84, Some(-9999.0)).unwrap()
}

fn tile_file_name(lat: i32, lon: i32) -> String {
    format!(
        "ASTGTM2_{}{:02}{}{:03}_dem.tif",
        if lat >= 0 { 'N' } else { 'S' },
        lat.abs(),
        if lon >= 0 { 'E' } else { 'W' },
        lon.abs()
    )
}

fn write_tiles(dir: &Path, tiles: &[(i32, i32, f64)]) {
    for &(lat, lon, base) in tiles {
        let path = dir.join(tile_file_name(lat, lon));
        write_geotiff(&path, &degree_tile(lat, lon, 11, base), PixelType::UInt16).unwrap();
    }
}

fn load_tiles(dir: &Path) -> Vec<NamedTile> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tif"))
        .collect();
    names.sort();
    names
        .into_iter()
        .map(|name| {
            let raster = read_geotiff(dir.join(&name)).unwrap();
            NamedTile::new(name, raster)
        })
        .collect()
}

#[test]
fn test_geotiff_round_trip_uint16() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tile.tif");
    let raster = degree_tile(51, -1, 11, 100.0);
    write_geotiff(&path, &raster, PixelType::UInt16).unwrap();

    let loaded = read_geotiff(&path).unwrap();
    assert_eq!(loaded.dimensions(), (11, 11));
    assert_eq!(loaded.band_count(), 1);
    assert_eq!(loaded.crs(), Crs::WGS84);
    // -9999 cannot be stored as UInt16, so the file records 0.
    assert_eq!(loaded.no_data(), Some(0.0));
    assert_eq!(loaded.data(), raster.data());

    let gt = loaded.geo_transform().to_array();
    let expected = raster.geo_transform().to_array();
    for (a, b) in gt.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn test_geotiff_round_trip_float_multiband_projected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bng.tif");
    let gt = GeoTransform::north_up(400_000.0, 200_000.0, 50.0, -50.0);
    let data = vec![1.5, -2.25, 3.0, f64::NAN, 10.0, 20.0, 30.0, 40.0];
    let raster = Raster::new(data, 2, 2, 2, gt, Crs::BRITISH_NATIONAL_GRID, None).unwrap();
    write_geotiff(&path, &raster, PixelType::Float64).unwrap();

    let loaded = read_geotiff(&path).unwrap();
    assert_eq!(loaded.band_count(), 2);
    assert_eq!(loaded.crs(), Crs::BRITISH_NATIONAL_GRID);
    assert_eq!(loaded.get(0, 0, 1), Some(-2.25));
    assert!(loaded.get(0, 1, 1).unwrap().is_nan());
    assert_eq!(loaded.get(1, 1, 1), Some(40.0));
    assert_eq!(loaded.no_data(), None);
}

#[test]
fn test_integer_write_fills_no_data_and_checks_range() {
    let dir = TempDir::new().unwrap();
    let gt = GeoTransform::north_up(0.0, 1.0, 0.5, -0.5);

    let raster = Raster::new(vec![1.4, f64::NAN, -3.6, 7.0], 1, 2, 2, gt, Crs::WGS84, Some(-32768.0))
        .unwrap();
    let path = dir.path().join("int16.tif");
    write_raster(&path, &raster, PixelType::Int16, RasterFormat::GTiff).unwrap();
    let loaded = read_geotiff(&path).unwrap();
    assert_eq!(loaded.data(), &[1.0, -32768.0, -4.0, 7.0]);

    let negative = Raster::new(vec![-1.0], 1, 1, 1, gt, Crs::WGS84, None).unwrap();
    let err = write_geotiff(dir.path().join("neg.tif"), &negative, PixelType::UInt16).unwrap_err();
    assert!(matches!(
        err,
        DemError::ValueOutOfRange { pixel_type: "UInt16", cell: 0, .. }
    ));
}

#[test]
fn test_uint16_write_stores_negative_no_data_as_zero() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("void.tif");
    let gt = GeoTransform::north_up(-1.0, 52.0, 0.5, -0.5);
    let raster = Raster::new(vec![10.0, -9999.0, 30.0, 40.0], 1, 2, 2, gt, Crs::WGS84, Some(-9999.0))
        .unwrap();
    write_geotiff(&path, &raster, PixelType::UInt16).unwrap();

    let loaded = read_geotiff(&path).unwrap();
    assert_eq!(loaded.no_data(), Some(0.0));
    assert_eq!(loaded.data(), &[10.0, 0.0, 30.0, 40.0]);
    assert!(loaded.is_no_data(loaded.get(0, 0, 1).unwrap()));
    assert!(!loaded.is_no_data(loaded.get(0, 1, 0).unwrap()));

    // Int16 can hold the sentinel, so it is kept.
    let path = dir.path().join("void_int16.tif");
    write_geotiff(&path, &raster, PixelType::Int16).unwrap();
    let loaded = read_geotiff(&path).unwrap();
    assert_eq!(loaded.no_data(), Some(-9999.0));
    assert_eq!(loaded.data(), raster.data());
}

#[test]
fn test_read_missing_file() {
    assert!(matches!(
        read_geotiff("/nonexistent/dem.tif"),
        Err(DemError::Io(_))
    ));
}

#[test]
fn test_sample_written_raster() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tile.tif");
    write_geotiff(&path, &degree_tile(51, -1, 11, 0.0), PixelType::Float32).unwrap();
    let raster = read_geotiff(&path).unwrap();

    let stations = [
        Coordinate::new(52.0, -1.0),
        Coordinate::new(51.5, -0.5),
        Coordinate::new(51.0, 0.0),
    ];
    let results = sample(&raster, &stations).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].elevation, 0.0);
    assert_eq!((results[1].row, results[1].column), (5, 5));
    assert_eq!(results[1].elevation, 60.0);
    assert_eq!(results[2].elevation, 120.0);

    assert!(matches!(
        sample(&raster, &[Coordinate::new(53.0, -0.5)]),
        Err(DemError::OutOfExtent { index: 0, .. })
    ));
}

#[test]
fn test_merge_tiles_from_disk() {
    let dir = TempDir::new().unwrap();
    write_tiles(
        dir.path(),
        &[(51, -2, 1000.0), (51, -1, 2000.0), (50, -1, 3000.0)],
    );

    let tiles = load_tiles(dir.path());
    assert_eq!(tiles.len(), 3);
    assert_eq!(TileName::parse(&tiles[0].name).unwrap().lat, 50);

    let strip = merge_row_strip(&tiles, &TileSelector::Contains("N51".into())).unwrap();
    assert_eq!(strip.dimensions(), (10, 20));
    assert_relative_eq!(strip.geo_transform().origin_x, -2.0, epsilon = 1e-12);
    assert_relative_eq!(strip.geo_transform().origin_y, 52.0, epsilon = 1e-12);
    assert_eq!(strip.get(0, 0, 0), Some(1000.0));
    assert_eq!(strip.get(0, 0, 10), Some(2000.0));
    assert_eq!(strip.get(0, 9, 19), Some(2000.0 + 9.0 * 11.0 + 9.0));

    let out = dir.path().join("N51.tif");
    write_geotiff(&out, &strip, PixelType::UInt16).unwrap();
    let reloaded = read_geotiff(&out).unwrap();
    assert_eq!(reloaded.dimensions(), (10, 20));

    // Sample across the seam between the two tiles
    let results = sample(&reloaded, &[Coordinate::new(52.0, -1.0)]).unwrap();
    assert_eq!(results[0].column, 10);
    assert_eq!(results[0].elevation, 2000.0);
}

#[test]
fn test_merge_no_matching_tiles() {
    let dir = TempDir::new().unwrap();
    write_tiles(dir.path(), &[(51, -1, 0.0)]);
    let tiles = load_tiles(dir.path());
    assert!(matches!(
        merge_row_strip(&tiles, &TileSelector::Latitude(40)),
        Err(DemError::NoTilesSelected { .. })
    ));
}
