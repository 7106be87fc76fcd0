//! In-memory raster representation.

use crate::geo::{Crs, CrsKind, GeoTransform};
use crate::{DemError, Result};
use serde::Serialize;
use std::fmt;

/// A georeferenced grid of elevation samples.
///
/// Samples are stored band-major, and row-major within a band (north to south,
/// west to east for north-up rasters). A raster is a read-only snapshot: every
/// transformation returns a new raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    data: Vec<f64>,
    bands: usize,
    rows: usize,
    cols: usize,
    geo_transform: GeoTransform,
    crs: Crs,
    /// Cells equal to this value are treated as missing.
    no_data: Option<f64>,
}

/// Geographic bounds of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    /// Minimum latitude (south edge).
    pub min_lat: f64,
    /// Maximum latitude (north edge).
    pub max_lat: f64,
    /// Minimum longitude (west edge).
    pub min_lon: f64,
    /// Maximum longitude (east edge).
    pub max_lon: f64,
}

impl Bounds {
    /// Check if a coordinate is within the bounds.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

impl Raster {
    /// Create a raster from band-major samples.
    pub fn new(
        data: Vec<f64>,
        bands: usize,
        rows: usize,
        cols: usize,
        geo_transform: GeoTransform,
        crs: Crs,
        no_data: Option<f64>,
    ) -> Result<Self> {
        let expected = bands * rows * cols;
        if bands == 0 || data.len() != expected {
            return Err(DemError::DataLength {
                expected,
                actual: data.len(),
                bands,
                rows,
                cols,
            });
        }
        geo_transform.validate()?;

        Ok(Self {
            data,
            bands,
            rows,
            cols,
            geo_transform,
            crs,
            no_data,
        })
    }

    /// Create a single-band raster from a grid of rows.
    pub fn from_rows(
        grid: Vec<Vec<f64>>,
        geo_transform: GeoTransform,
        crs: Crs,
        no_data: Option<f64>,
    ) -> Result<Self> {
        let rows = grid.len();
        let cols = grid.first().map_or(0, Vec::len);
        let actual: usize = grid.iter().map(Vec::len).sum();
        if grid.iter().any(|row| row.len() != cols) {
            return Err(DemError::DataLength {
                expected: rows * cols,
                actual,
                bands: 1,
                rows,
                cols,
            });
        }
        Self::new(grid.concat(), 1, rows, cols, geo_transform, crs, no_data)
    }

    /// Number of rows (height).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (width).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of bands.
    pub fn band_count(&self) -> usize {
        self.bands
    }

    /// Get the dimensions as `(rows, cols)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn geo_transform(&self) -> &GeoTransform {
        &self.geo_transform
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn no_data(&self) -> Option<f64> {
        self.no_data
    }

    /// All samples, band-major.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Samples of one band (0-based), row-major.
    pub fn band(&self, band: usize) -> Result<&[f64]> {
        if band >= self.bands {
            return Err(DemError::BandOutOfRange {
                band,
                bands: self.bands,
            });
        }
        let len = self.rows * self.cols;
        Ok(&self.data[band * len..(band + 1) * len])
    }

    /// Raw cell value, or `None` if the position is outside the raster.
    pub fn get(&self, band: usize, row: usize, col: usize) -> Option<f64> {
        if band >= self.bands || row >= self.rows || col >= self.cols {
            return None;
        }
        self.data
            .get((band * self.rows + row) * self.cols + col)
            .copied()
    }

    /// Whether a value denotes missing data for this raster.
    pub fn is_no_data(&self, value: f64) -> bool {
        value.is_nan() || self.no_data.is_some_and(|nodata| value == nodata)
    }

    /// Copy of the raster with every no-data cell replaced by NaN.
    pub fn with_no_data_as_nan(&self) -> Raster {
        let data = self
            .data
            .iter()
            .map(|&v| if self.is_no_data(v) { f64::NAN } else { v })
            .collect();
        self.with_data(data, self.no_data)
    }

    /// Copy of the raster with a different no-data sentinel.
    ///
    /// Cells holding the old sentinel are rewritten to the new one so that the
    /// set of missing cells is unchanged.
    pub fn with_no_data(&self, no_data: Option<f64>) -> Raster {
        let replacement = no_data.unwrap_or(f64::NAN);
        let data = self
            .data
            .iter()
            .map(|&v| if self.is_no_data(v) { replacement } else { v })
            .collect();
        self.with_data(data, no_data)
    }

    fn with_data(&self, data: Vec<f64>, no_data: Option<f64>) -> Raster {
        Raster {
            data,
            bands: self.bands,
            rows: self.rows,
            cols: self.cols,
            geo_transform: self.geo_transform,
            crs: self.crs,
            no_data,
        }
    }

    /// Keep only the top-left `rows` x `cols` cells of every band.
    ///
    /// The origin of the geotransform is unchanged.
    pub fn crop_top_left(&self, rows: usize, cols: usize) -> Result<Raster> {
        let rows = rows.min(self.rows);
        let cols = cols.min(self.cols);
        let mut data = Vec::with_capacity(self.bands * rows * cols);
        for band in 0..self.bands {
            let values = self.band(band)?;
            for row in 0..rows {
                let start = row * self.cols;
                data.extend_from_slice(&values[start..start + cols]);
            }
        }
        Raster::new(
            data,
            self.bands,
            rows,
            cols,
            self.geo_transform,
            self.crs,
            self.no_data,
        )
    }

    /// Get the geographic bounds of this raster.
    pub fn bounds(&self) -> Bounds {
        let corners = [
            self.geo_transform.pixel_to_geo(0.0, 0.0),
            self.geo_transform.pixel_to_geo(0.0, self.cols as f64),
            self.geo_transform.pixel_to_geo(self.rows as f64, 0.0),
            self.geo_transform.pixel_to_geo(self.rows as f64, self.cols as f64),
        ];
        let mut bounds = Bounds {
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            bounds.min_lon = bounds.min_lon.min(x);
            bounds.max_lon = bounds.max_lon.max(x);
            bounds.min_lat = bounds.min_lat.min(y);
            bounds.max_lat = bounds.max_lat.max(y);
        }
        bounds
    }

    /// Get the resolution in CRS units per pixel as `(x, y)`.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.geo_transform.pixel_width.abs(),
            self.geo_transform.pixel_height.abs(),
        )
    }

    /// Get the approximate resolution in meters at the center of the raster.
    ///
    /// Only meaningful for geographic reference systems.
    pub fn resolution_meters(&self) -> (f64, f64) {
        let (lon_deg, lat_deg) = self.resolution();
        let bounds = self.bounds();
        let center_lat = (bounds.min_lat + bounds.max_lat) / 2.0;

        // At the equator, 1 degree ≈ 111,320 meters
        // Longitude shrinks by cos(latitude)
        let meters_per_deg_lat = 111_320.0;
        let meters_per_deg_lon = 111_320.0 * center_lat.to_radians().cos();

        (lon_deg * meters_per_deg_lon, lat_deg * meters_per_deg_lat)
    }

    /// Summarise the raster parameters and the first band's value range.
    pub fn info(&self) -> RasterInfo {
        let mut no_data_cells = 0;
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        let first_band = &self.data[..self.rows * self.cols];
        for &v in first_band {
            if self.is_no_data(v) {
                no_data_cells += 1;
                continue;
            }
            min = Some(min.map_or(v, |m| m.min(v)));
            max = Some(max.map_or(v, |m| m.max(v)));
        }

        RasterInfo {
            rows: self.rows,
            cols: self.cols,
            bands: self.bands,
            geo_transform: self.geo_transform.to_array(),
            crs: self.crs,
            crs_name: self.crs.name(),
            crs_kind: self.crs.kind(),
            no_data: self.no_data,
            bounds: self.bounds(),
            resolution: self.resolution(),
            resolution_meters: (self.crs.kind() == CrsKind::Geographic)
                .then(|| self.resolution_meters()),
            no_data_cells,
            min_value: min,
            max_value: max,
        }
    }
}

/// Parameter summary of a raster.
#[derive(Debug, Clone, Serialize)]
pub struct RasterInfo {
    pub rows: usize,
    pub cols: usize,
    pub bands: usize,
    pub geo_transform: [f64; 6],
    pub crs: Crs,
    pub crs_name: Option<&'static str>,
    pub crs_kind: CrsKind,
    pub no_data: Option<f64>,
    pub bounds: Bounds,
    /// CRS units per pixel `(x, y)`.
    pub resolution: (f64, f64),
    /// Approximate meters per pixel, geographic systems only.
    pub resolution_meters: Option<(f64, f64)>,
    /// Missing cells in the first band.
    pub no_data_cells: usize,
    /// Smallest valid value in the first band.
    pub min_value: Option<f64>,
    /// Largest valid value in the first band.
    pub max_value: Option<f64>,
}

impl fmt::Display for RasterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows x {} cols x {} band(s), {}",
            self.rows, self.cols, self.bands, self.crs
        )?;
        if let Some(name) = self.crs_name {
            write!(f, " ({})", name)?;
        }
        write!(
            f,
            ", geotransform {:?}, lat {:.6}..{:.6}, lon {:.6}..{:.6}",
            self.geo_transform,
            self.bounds.min_lat,
            self.bounds.max_lat,
            self.bounds.min_lon,
            self.bounds.max_lon
        )?;
        if let Some(nodata) = self.no_data {
            write!(f, ", no-data {} ({} cells)", nodata, self.no_data_cells)?;
        }
        Ok(())
    }
}
