//! Georeferencing primitives: the affine geotransform, CRS identifiers and coordinates.

use crate::{DemError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Six-parameter affine mapping between pixel (row, column) and CRS coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up rasters both rotation terms are zero and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X (longitude) of the top-left corner of the top-left pixel.
    pub origin_x: f64,
    /// Pixel width in CRS units.
    pub pixel_width: f64,
    /// Row rotation term (zero for north-up rasters).
    pub row_rotation: f64,
    /// Y (latitude) of the top-left corner of the top-left pixel.
    pub origin_y: f64,
    /// Column rotation term (zero for north-up rasters).
    pub col_rotation: f64,
    /// Pixel height in CRS units (negative for north-up rasters).
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Build a north-up geotransform.
    pub const fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height,
        }
    }

    /// Build from the conventional `[x0, dx, rx, y0, ry, dy]` ordering.
    pub const fn from_array(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            row_rotation: gt[2],
            origin_y: gt[3],
            col_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    /// The conventional `[x0, dx, rx, y0, ry, dy]` ordering.
    pub const fn to_array(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Check that all parameters are finite and the pixel size is non-zero.
    pub fn validate(&self) -> Result<()> {
        let values = self.to_array();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(self.invalid("parameters must be finite"));
        }
        if self.pixel_width == 0.0 || self.pixel_height == 0.0 {
            return Err(self.invalid("pixel width and height must be non-zero"));
        }
        Ok(())
    }

    /// Whether both rotation terms are zero.
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0
    }

    /// [`validate`](Self::validate) and additionally reject rotated rasters.
    pub fn require_north_up(&self) -> Result<()> {
        self.validate()?;
        if !self.is_north_up() {
            return Err(self.invalid("rotated rasters are not supported (rotation terms must be zero)"));
        }
        Ok(())
    }

    /// Forward mapping of a (possibly fractional) pixel position to CRS `(x, y)`.
    pub fn pixel_to_geo(&self, row: f64, col: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Inverse mapping for north-up rasters: CRS `(x, y)` to fractional `(row, col)`.
    ///
    /// The rotation terms are ignored; callers must check [`is_north_up`](Self::is_north_up).
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.origin_x) / self.pixel_width;
        let row = (y - self.origin_y) / self.pixel_height;
        (row, col)
    }

    /// Nearest cell `(row, col)` for a latitude/longitude, rounding half to even.
    ///
    /// Returns `None` when the position is not representable (non-finite input).
    pub fn nearest_cell(&self, lat: f64, lon: f64) -> Option<(i64, i64)> {
        let (row, col) = self.geo_to_pixel(lon, lat);
        Some((round_index(row)?, round_index(col)?))
    }

    fn invalid(&self, reason: &str) -> DemError {
        DemError::InvalidGeoTransform {
            values: self.to_array(),
            reason: reason.to_string(),
        }
    }
}

/// Round half to even and convert to an index, rejecting values `i64` cannot hold.
fn round_index(value: f64) -> Option<i64> {
    let rounded = value.round_ties_even();
    // 2^63 is exactly representable; anything at or beyond it would saturate.
    if rounded.is_finite() && rounded.abs() < 9_223_372_036_854_775_808.0 {
        Some(rounded as i64)
    } else {
        None
    }
}

/// Whether a reference system uses angular or planar coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrsKind {
    /// Latitude/longitude on an ellipsoid (GCS).
    Geographic,
    /// Planar x/y (PCS).
    Projected,
    /// No usable identifier.
    Unknown,
}

/// Coordinate reference system identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Crs {
    /// An EPSG registry code.
    Epsg(u32),
    /// No georeferencing keys were present.
    Unknown,
}

impl Crs {
    /// WGS-84 geographic.
    pub const WGS84: Crs = Crs::Epsg(4326);
    /// OSGB-36 geographic.
    pub const OSGB36: Crs = Crs::Epsg(4277);
    /// ETRS-89 geographic.
    pub const ETRS89: Crs = Crs::Epsg(4258);
    /// Web (pseudo) Mercator, projected from WGS-84.
    pub const WEB_MERCATOR: Crs = Crs::Epsg(3857);
    /// British National Grid, projected from OSGB-36.
    pub const BRITISH_NATIONAL_GRID: Crs = Crs::Epsg(27700);
    /// Lambert azimuthal equal-area, projected from ETRS-89.
    pub const ETRS_LAEA: Crs = Crs::Epsg(3035);

    /// The EPSG code, if known.
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::Unknown => None,
        }
    }

    /// Classify the reference system.
    ///
    /// Geographic 2D systems live in the EPSG 4000-4999 block; everything else
    /// with a code is treated as projected.
    pub fn kind(&self) -> CrsKind {
        match self {
            Crs::Epsg(code) if (4000..5000).contains(code) => CrsKind::Geographic,
            Crs::Epsg(_) => CrsKind::Projected,
            Crs::Unknown => CrsKind::Unknown,
        }
    }

    /// Human readable name for the well-known systems.
    pub fn name(&self) -> Option<&'static str> {
        match self.epsg()? {
            4326 => Some("WGS-84"),
            4277 => Some("OSGB-36"),
            4258 => Some("ETRS-89"),
            3857 => Some("Web Mercator"),
            27700 => Some("British National Grid"),
            3035 => Some("ETRS-LAEA"),
            _ => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Unknown => f.write_str("unknown"),
        }
    }
}

impl FromStr for Crs {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unknown") {
            return Ok(Crs::Unknown);
        }
        let code = s
            .strip_prefix("EPSG:")
            .or_else(|| s.strip_prefix("epsg:"))
            .unwrap_or(s);
        code.parse::<u32>()
            .map(Crs::Epsg)
            .map_err(|_| format!("invalid CRS '{}', expected EPSG:<code>", s))
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> String {
        crs.to_string()
    }
}

impl TryFrom<String> for Crs {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// A latitude/longitude pair in the raster's native reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude (CRS y).
    pub latitude: f64,
    /// Longitude (CRS x).
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self { latitude, longitude }
    }
}
