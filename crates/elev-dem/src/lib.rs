//! # elev-dem
//!
//! Digital Elevation Model (DEM) rasters: GeoTIFF I/O, nearest-cell elevation
//! sampling at station coordinates, and merging of degree tiles into strips.
//!
//! ## Overview
//!
//! A [`Raster`] is a georeferenced grid described by a six-parameter affine
//! [`GeoTransform`], a reference system ([`Crs`]), a band count and an optional
//! no-data sentinel.
//!
//! - [`sample`] looks up the cell nearest to each coordinate. Cells holding the
//!   no-data sentinel sample as NaN; coordinates outside the raster are an error
//!   (or skipped under [`ExtentPolicy::Skip`]).
//! - [`merge_row_strip`] merges the tiles of one latitude band. Source tiles
//!   overlap their neighbours by one pixel, so each tile's last row and column
//!   are dropped before the tiles are concatenated west to east. Tiles that
//!   do not line up edge to edge are rejected.
//!
//! Tile sets such as ASTER GDEM name their 1x1 degree tiles after the
//! reference corner, e.g. `ASTGTM2_N51W001_dem.tif`; see [`TileName`].
//!
//! ## Examples
//!
//! ```no_run
//! use elev_dem::{read_geotiff, sample, Coordinate};
//!
//! let raster = read_geotiff("dem/merged.tif")?;
//! let stations = [Coordinate::new(51.5, -0.12), Coordinate::new(51.45, -0.97)];
//!
//! for result in sample(&raster, &stations)? {
//!     println!("#{}: {:.1} m", result.index, result.elevation);
//! }
//! # Ok::<(), elev_dem::DemError>(())
//! ```
//!
//! ```no_run
//! use elev_dem::{merge_row_strip, read_geotiff, write_geotiff, NamedTile, PixelType, TileSelector};
//!
//! let tiles = ["ASTGTM2_N51W001_dem.tif", "ASTGTM2_N51E000_dem.tif"]
//!     .iter()
//!     .map(|name| -> elev_dem::Result<NamedTile> {
//!         Ok(NamedTile::new(*name, read_geotiff(format!("dem/{}", name))?))
//!     })
//!     .collect::<elev_dem::Result<Vec<_>>>()?;
//!
//! let strip = merge_row_strip(&tiles, &TileSelector::Latitude(51))?;
//! write_geotiff("dem/N51.tif", &strip, PixelType::UInt16)?;
//! # Ok::<(), elev_dem::DemError>(())
//! ```

mod error;
pub mod geo;
mod geotiff;
mod merge;
mod raster;
mod sampler;
mod tile_name;

pub use error::DemError;
pub use geo::{Coordinate, Crs, CrsKind, GeoTransform};
pub use geotiff::{read_geotiff, write_geotiff, write_raster, PixelType, RasterFormat};
pub use merge::{
    merge_row_strip, merge_row_strip_with, stack_row_strips, trim_overlap, MergeOptions, NamedTile,
    TileOrder, TilePredicate, TileSelector,
};
pub use raster::{Bounds, Raster, RasterInfo};
pub use sampler::{
    sample, sample_band, sample_band_with_policy, sample_each, sample_with_policy, ExtentPolicy, SampleBatch, SampleResult,
    SkippedCoordinate,
};
pub use tile_name::TileName;

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;
