//! Error types for the DEM crate.

use thiserror::Error;

/// Errors that can occur when working with DEM data.
#[derive(Debug, Error)]
pub enum DemError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing or malformed georeferencing tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// The six-parameter geotransform cannot be used.
    #[error("Invalid geotransform {values:?}: {reason}")]
    InvalidGeoTransform {
        /// The offending parameters.
        values: [f64; 6],
        /// Why they were rejected.
        reason: String,
    },

    /// Raster data does not match the declared dimensions.
    #[error("Raster data has {actual} samples, expected {expected} ({bands} bands x {rows} rows x {cols} cols)")]
    DataLength {
        /// Samples required by the dimensions.
        expected: usize,
        /// Samples actually supplied.
        actual: usize,
        /// Declared band count.
        bands: usize,
        /// Declared row count.
        rows: usize,
        /// Declared column count.
        cols: usize,
    },

    /// Band index past the raster's band count.
    #[error("Band {band} does not exist (raster has {bands} bands)")]
    BandOutOfRange {
        /// Requested band (0-based).
        band: usize,
        /// Number of bands in the raster.
        bands: usize,
    },

    /// Coordinate resolves to a cell outside the raster.
    #[error(
        "Coordinate #{index} ({lat}, {lon}) is outside the raster extent: \
         row {}, column {} not within {rows} rows x {cols} columns",
        cell_index(.row),
        cell_index(.col)
    )]
    OutOfExtent {
        /// Position of the coordinate in the input sequence.
        index: usize,
        /// Requested latitude.
        lat: f64,
        /// Requested longitude.
        lon: f64,
        /// Computed row (None when the coordinate is not finite).
        row: Option<i64>,
        /// Computed column (None when the coordinate is not finite).
        col: Option<i64>,
        /// Raster row count.
        rows: usize,
        /// Raster column count.
        cols: usize,
    },

    /// Tile selection matched nothing.
    #[error("No tiles selected by {selector}")]
    NoTilesSelected {
        /// Description of the selector that was applied.
        selector: String,
    },

    /// Tiles cannot be concatenated because their shapes differ.
    #[error("Tile {tile} has {actual} {axis}, expected {expected}")]
    ShapeMismatch {
        /// Name of the offending tile.
        tile: String,
        /// "rows" or "columns".
        axis: &'static str,
        /// Count shared by the preceding tiles.
        expected: usize,
        /// Count of the offending tile.
        actual: usize,
    },

    /// Tiles cannot share one georeference.
    #[error("Tile {tile} is not aligned with {reference}: {reason}")]
    MisalignedTile {
        /// Name of the offending tile.
        tile: String,
        /// Name of the tile providing the georeference.
        reference: String,
        /// What differs.
        reason: String,
    },

    /// Tile too small to have its overlap row and column removed.
    #[error("Tile {tile} is {rows}x{cols}; at least 2x2 is needed to trim the overlap")]
    TileTooSmall {
        /// Name of the offending tile.
        tile: String,
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },

    /// Invalid tile filename - cannot parse coordinates.
    #[error("Invalid tile filename: {0}")]
    InvalidFilename(String),

    /// Unsupported raster container format tag.
    #[error("Unsupported raster format: {0}")]
    UnsupportedFormat(String),

    /// Value cannot be stored in the requested pixel type.
    #[error("Value {value} at band {band}, cell {cell} does not fit pixel type {pixel_type}")]
    ValueOutOfRange {
        /// Offending value.
        value: f64,
        /// Band of the value.
        band: usize,
        /// Row-major cell index within the band.
        cell: usize,
        /// Target pixel type name.
        pixel_type: &'static str,
    },
}

fn cell_index(index: &Option<i64>) -> String {
    match index {
        Some(i) => i.to_string(),
        None => "undefined".to_string(),
    }
}
