//! Nearest-cell elevation sampling at geographic coordinates.
//!
//! For a north-up raster with geotransform `gt`, coordinate `i` maps to
//!
//! ```text
//! column = round((longitude - gt[0]) / gt[1])
//! row    = round((latitude  - gt[3]) / gt[5])
//! ```
//!
//! with rounding half to even. No interpolation is performed and coordinates
//! must already be in the raster's reference system.

use crate::geo::Coordinate;
use crate::{DemError, Raster, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

/// Elevation looked up for one input coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleResult {
    /// Position of the coordinate in the input sequence.
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub row: usize,
    pub column: usize,
    /// Cell value, NaN when the cell holds the no-data sentinel.
    pub elevation: f64,
}

impl SampleResult {
    /// Whether the looked-up cell holds no data.
    pub fn is_no_data(&self) -> bool {
        self.elevation.is_nan()
    }

    /// Elevation, or `None` for a no-data cell.
    pub fn value(&self) -> Option<f64> {
        (!self.elevation.is_nan()).then_some(self.elevation)
    }
}

/// What to do with coordinates that fall outside the raster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtentPolicy {
    /// Fail the whole batch on the first out-of-extent coordinate.
    #[default]
    Abort,
    /// Leave the coordinate out of the results and record it.
    Skip,
}

impl FromStr for ExtentPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(ExtentPolicy::Abort),
            "skip" => Ok(ExtentPolicy::Skip),
            other => Err(format!("unknown extent policy '{}', expected abort or skip", other)),
        }
    }
}

/// A coordinate left out by [`ExtentPolicy::Skip`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkippedCoordinate {
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    /// Computed row, `None` when the coordinate is not finite.
    pub row: Option<i64>,
    /// Computed column, `None` when the coordinate is not finite.
    pub column: Option<i64>,
}

/// Results of sampling under an [`ExtentPolicy`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleBatch {
    /// In input order; `index` refers to the input position.
    pub results: Vec<SampleResult>,
    pub skipped: Vec<SkippedCoordinate>,
}

/// Sample the first band at every coordinate.
///
/// The output has the same length and order as the input; `result[i].index == i`.
/// Fails with [`DemError::OutOfExtent`] on the first coordinate that resolves
/// outside the raster.
pub fn sample(raster: &Raster, coordinates: &[Coordinate]) -> Result<Vec<SampleResult>> {
    sample_band(raster, 0, coordinates)
}

/// Sample one band (0-based) at every coordinate.
pub fn sample_band(
    raster: &Raster,
    band: usize,
    coordinates: &[Coordinate],
) -> Result<Vec<SampleResult>> {
    sample_each(raster, band, coordinates)?.into_iter().collect()
}

/// Sample one band, returning an individual result per coordinate.
///
/// The outer error covers problems with the raster itself (invalid
/// geotransform, missing band); the inner ones are per coordinate.
pub fn sample_each(
    raster: &Raster,
    band: usize,
    coordinates: &[Coordinate],
) -> Result<Vec<Result<SampleResult>>> {
    let gt = raster.geo_transform();
    gt.require_north_up()?;
    let values = raster.band(band)?;
    let (rows, cols) = raster.dimensions();

    debug!(
        band,
        rows,
        cols,
        geo_transform = ?gt.to_array(),
        coordinates = coordinates.len(),
        "Sampling raster"
    );

    let results = coordinates
        .iter()
        .enumerate()
        .map(|(index, coord)| {
            let cell = gt.nearest_cell(coord.latitude, coord.longitude);
            let out_of_extent = || DemError::OutOfExtent {
                index,
                lat: coord.latitude,
                lon: coord.longitude,
                row: cell.map(|(r, _)| r),
                col: cell.map(|(_, c)| c),
                rows,
                cols,
            };

            let (row, column) = cell
                .and_then(|(r, c)| Some((usize::try_from(r).ok()?, usize::try_from(c).ok()?)))
                .filter(|&(r, c)| r < rows && c < cols)
                .ok_or_else(out_of_extent)?;

            let value = values[row * cols + column];
            let elevation = if raster.is_no_data(value) { f64::NAN } else { value };

            Ok(SampleResult {
                index,
                latitude: coord.latitude,
                longitude: coord.longitude,
                row,
                column,
                elevation,
            })
        })
        .collect();

    Ok(results)
}

/// Sample the first band, handling out-of-extent coordinates per `policy`.
pub fn sample_with_policy(
    raster: &Raster,
    coordinates: &[Coordinate],
    policy: ExtentPolicy,
) -> Result<SampleBatch> {
    sample_band_with_policy(raster, 0, coordinates, policy)
}

/// Sample one band, handling out-of-extent coordinates per `policy`.
pub fn sample_band_with_policy(
    raster: &Raster,
    band: usize,
    coordinates: &[Coordinate],
    policy: ExtentPolicy,
) -> Result<SampleBatch> {
    let mut batch = SampleBatch::default();

    for result in sample_each(raster, band, coordinates)? {
        match result {
            Ok(sample) => batch.results.push(sample),
            Err(DemError::OutOfExtent {
                index,
                lat,
                lon,
                row,
                col,
                ..
            }) if policy == ExtentPolicy::Skip => {
                warn!(
                    index,
                    lat, lon, ?row, ?col, "Skipping coordinate outside raster extent"
                );
                batch.skipped.push(SkippedCoordinate {
                    index,
                    latitude: lat,
                    longitude: lon,
                    row,
                    column: col,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(batch)
}
