//! Merging of degree tiles into row strips and mosaics.
//!
//! Source tiles share a one-pixel overlap with their east and south
//! neighbours. Merging a latitude band therefore drops the last row and column
//! of every tile and concatenates the remainders west to east.

use crate::tile_name::TileName;
use crate::{DemError, Raster, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Relative tolerance when comparing pixel sizes and origins.
const ALIGNMENT_TOLERANCE: f64 = 1e-6;

/// A raster together with the name it is selected and ordered by.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTile {
    pub name: String,
    pub raster: Raster,
}

impl NamedTile {
    pub fn new(name: impl Into<String>, raster: Raster) -> Self {
        Self {
            name: name.into(),
            raster,
        }
    }
}

/// Predicate deciding which tiles take part in a merge.
pub trait TilePredicate {
    fn matches(&self, name: &str) -> bool;

    /// Human-readable description used in errors and logs.
    fn describe(&self) -> String {
        "tile predicate".to_string()
    }
}

impl<F> TilePredicate for F
where
    F: Fn(&str) -> bool,
{
    fn matches(&self, name: &str) -> bool {
        self(name)
    }
}

/// Configurable tile selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileSelector {
    /// Every tile.
    All,
    /// Tiles whose name contains the substring.
    Contains(String),
    /// Tiles whose name encodes this latitude in whole degrees.
    Latitude(i32),
}

impl TilePredicate for TileSelector {
    fn matches(&self, name: &str) -> bool {
        match self {
            TileSelector::All => true,
            TileSelector::Contains(pattern) => name.contains(pattern.as_str()),
            TileSelector::Latitude(lat) => {
                TileName::parse(name).is_some_and(|tile| tile.lat == *lat)
            }
        }
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileSelector::All => write!(f, "all tiles"),
            TileSelector::Contains(pattern) => write!(f, "name containing '{}'", pattern),
            TileSelector::Latitude(lat) => write!(f, "latitude {}", lat),
        }
    }
}

/// West-to-east ordering of the selected tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileOrder {
    /// Descending sort by tile name.
    #[default]
    NameDescending,
    /// Ascending geotransform origin X.
    OriginX,
}

impl TileOrder {
    fn sort(self, tiles: &mut [&NamedTile]) {
        match self {
            TileOrder::NameDescending => tiles.sort_by(|a, b| b.name.cmp(&a.name)),
            TileOrder::OriginX => tiles.sort_by(|a, b| {
                a.raster
                    .geo_transform()
                    .origin_x
                    .total_cmp(&b.raster.geo_transform().origin_x)
            }),
        }
    }
}

/// Options for [`merge_row_strip_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub order: TileOrder,
    /// Drop the overlapping last row and column of each tile.
    pub trim: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            order: TileOrder::default(),
            trim: true,
        }
    }
}

/// Drop the last row and last column of a tile.
///
/// The origin is unchanged.
pub fn trim_overlap(name: &str, raster: &Raster) -> Result<Raster> {
    let (rows, cols) = raster.dimensions();
    if rows < 2 || cols < 2 {
        return Err(DemError::TileTooSmall {
            tile: name.to_string(),
            rows,
            cols,
        });
    }
    debug!(tile = name, rows, cols, "Trimming overlap");
    raster.crop_top_left(rows - 1, cols - 1)
}

/// Merge the selected tiles of one latitude band into a single raster.
///
/// Uses the default [`MergeOptions`]: descending name order, overlap trimmed.
pub fn merge_row_strip<P>(tiles: &[NamedTile], selector: &P) -> Result<Raster>
where
    P: TilePredicate + ?Sized,
{
    merge_row_strip_with(tiles, selector, MergeOptions::default())
}

/// Merge the selected tiles of one latitude band with explicit options.
///
/// The merged raster takes its geotransform, CRS and no-data sentinel from
/// the first tile in merge order. Each following tile must start where the
/// previous one ends; with [`TileOrder::NameDescending`] that holds for
/// western-hemisphere tiles, eastern ones need [`TileOrder::OriginX`].
pub fn merge_row_strip_with<P>(
    tiles: &[NamedTile],
    selector: &P,
    options: MergeOptions,
) -> Result<Raster>
where
    P: TilePredicate + ?Sized,
{
    let mut selected: Vec<&NamedTile> = tiles.iter().filter(|t| selector.matches(&t.name)).collect();
    if selected.is_empty() {
        return Err(DemError::NoTilesSelected {
            selector: selector.describe(),
        });
    }
    options.order.sort(&mut selected);

    let parts = selected
        .iter()
        .map(|tile| {
            let raster = if options.trim {
                trim_overlap(&tile.name, &tile.raster)?
            } else {
                tile.raster.clone()
            };
            Ok((tile.name.as_str(), raster))
        })
        .collect::<Result<Vec<_>>>()?;

    let merged = concat(&parts, Axis::Columns)?;
    info!(
        selector = %selector.describe(),
        tiles = parts.len(),
        rows = merged.rows(),
        cols = merged.cols(),
        "Merged row strip"
    );
    Ok(merged)
}

/// Stack merged row strips north to south into one mosaic.
///
/// Strips are ordered by descending origin Y; the northmost strip provides
/// the georeference.
pub fn stack_row_strips(strips: &[NamedTile]) -> Result<Raster> {
    if strips.is_empty() {
        return Err(DemError::NoTilesSelected {
            selector: "row strip stack".to_string(),
        });
    }
    let mut ordered: Vec<&NamedTile> = strips.iter().collect();
    ordered.sort_by(|a, b| {
        b.raster
            .geo_transform()
            .origin_y
            .total_cmp(&a.raster.geo_transform().origin_y)
    });

    let parts: Vec<(&str, Raster)> = ordered
        .iter()
        .map(|strip| (strip.name.as_str(), strip.raster.clone()))
        .collect();
    let mosaic = concat(&parts, Axis::Rows)?;
    info!(
        strips = parts.len(),
        rows = mosaic.rows(),
        cols = mosaic.cols(),
        "Stacked row strips"
    );
    Ok(mosaic)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// Side by side, west to east.
    Columns,
    /// Top to bottom, north to south.
    Rows,
}

fn concat(parts: &[(&str, Raster)], axis: Axis) -> Result<Raster> {
    let Some(((reference_name, reference), rest)) = parts.split_first() else {
        return Err(DemError::NoTilesSelected {
            selector: "empty tile list".to_string(),
        });
    };

    for (name, raster) in rest {
        check_alignment(reference_name, reference, name, raster, axis)?;
    }
    check_contiguity(parts, axis)?;

    let bands = reference.band_count();
    let no_data = reference.no_data();
    let parts: Vec<Raster> = parts
        .iter()
        .map(|(name, raster)| {
            if raster.no_data() != no_data {
                debug!(tile = *name, from = ?raster.no_data(), to = ?no_data, "Normalising no-data");
                raster.with_no_data(no_data)
            } else {
                raster.clone()
            }
        })
        .collect();

    let (rows, cols) = match axis {
        Axis::Columns => (reference.rows(), parts.iter().map(Raster::cols).sum()),
        Axis::Rows => (parts.iter().map(Raster::rows).sum(), reference.cols()),
    };

    let mut data = Vec::with_capacity(bands * rows * cols);
    for band in 0..bands {
        match axis {
            Axis::Columns => {
                for row in 0..rows {
                    for part in &parts {
                        let values = part.band(band)?;
                        let start = row * part.cols();
                        data.extend_from_slice(&values[start..start + part.cols()]);
                    }
                }
            }
            Axis::Rows => {
                for part in &parts {
                    data.extend_from_slice(part.band(band)?);
                }
            }
        }
    }

    Raster::new(
        data,
        bands,
        rows,
        cols,
        *reference.geo_transform(),
        reference.crs(),
        no_data,
    )
}

fn close(a: f64, b: f64, scale: f64) -> bool {
    (a - b).abs() <= ALIGNMENT_TOLERANCE * scale.abs().max(f64::MIN_POSITIVE)
}

fn check_alignment(
    reference_name: &str,
    reference: &Raster,
    name: &str,
    raster: &Raster,
    axis: Axis,
) -> Result<()> {
    let misaligned = |reason: String| DemError::MisalignedTile {
        tile: name.to_string(),
        reference: reference_name.to_string(),
        reason,
    };
    let ref_gt = reference.geo_transform();
    let gt = raster.geo_transform();

    if raster.crs() != reference.crs() {
        return Err(misaligned(format!(
            "reference system {} differs from {}",
            raster.crs(),
            reference.crs()
        )));
    }
    if raster.band_count() != reference.band_count() {
        return Err(misaligned(format!(
            "{} bands, expected {}",
            raster.band_count(),
            reference.band_count()
        )));
    }
    if !close(gt.pixel_width, ref_gt.pixel_width, ref_gt.pixel_width)
        || !close(gt.pixel_height, ref_gt.pixel_height, ref_gt.pixel_height)
    {
        return Err(misaligned(format!(
            "pixel size ({}, {}) differs from ({}, {})",
            gt.pixel_width, gt.pixel_height, ref_gt.pixel_width, ref_gt.pixel_height
        )));
    }

    match axis {
        Axis::Columns => {
            if !close(gt.origin_y, ref_gt.origin_y, ref_gt.pixel_height) {
                return Err(misaligned(format!(
                    "origin Y {} differs from {}",
                    gt.origin_y, ref_gt.origin_y
                )));
            }
            if raster.rows() != reference.rows() {
                return Err(DemError::ShapeMismatch {
                    tile: name.to_string(),
                    axis: "rows",
                    expected: reference.rows(),
                    actual: raster.rows(),
                });
            }
        }
        Axis::Rows => {
            if !close(gt.origin_x, ref_gt.origin_x, ref_gt.pixel_width) {
                return Err(misaligned(format!(
                    "origin X {} differs from {}",
                    gt.origin_x, ref_gt.origin_x
                )));
            }
            if raster.cols() != reference.cols() {
                return Err(DemError::ShapeMismatch {
                    tile: name.to_string(),
                    axis: "columns",
                    expected: reference.cols(),
                    actual: raster.cols(),
                });
            }
        }
    }

    Ok(())
}

/// Every part must start where its predecessor ends, within half a pixel.
///
/// The merged raster carries the first part's georeference, so parts out of
/// order, overlapping or separated by a gap would be mis-georeferenced.
fn check_contiguity(parts: &[(&str, Raster)], axis: Axis) -> Result<()> {
    for pair in parts.windows(2) {
        let (prev_name, prev) = &pair[0];
        let (name, next) = &pair[1];
        let prev_gt = prev.geo_transform();
        let (coordinate, expected, actual, step) = match axis {
            Axis::Columns => (
                "X",
                prev_gt.origin_x + prev.cols() as f64 * prev_gt.pixel_width,
                next.geo_transform().origin_x,
                prev_gt.pixel_width,
            ),
            Axis::Rows => (
                "Y",
                prev_gt.origin_y + prev.rows() as f64 * prev_gt.pixel_height,
                next.geo_transform().origin_y,
                prev_gt.pixel_height,
            ),
        };
        if (expected - actual).abs() > 0.5 * step.abs() {
            return Err(DemError::MisalignedTile {
                tile: name.to_string(),
                reference: prev_name.to_string(),
                reason: format!(
                    "origin {} {} is not where the previous tile ends ({})",
                    coordinate, actual, expected
                ),
            });
        }
    }
    Ok(())
}
