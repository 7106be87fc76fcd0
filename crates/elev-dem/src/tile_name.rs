//! Parsing of degree-tile file names.
//!
//! DEM tile sets encode the reference corner of each 1x1 degree tile in the
//! file name, e.g. `ASTGTM2_N51W001_dem.tif` or `USGS_13_n48w123_20240327.tif`.

use crate::{DemError, Result};
use std::path::Path;

/// Latitude/longitude encoded in a tile file name, in signed whole degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileName {
    /// Positive for north, negative for south.
    pub lat: i32,
    /// Positive for east, negative for west.
    pub lon: i32,
}

impl TileName {
    /// Find the first `[NS]<digits>[EW]<digits>` group in a file name.
    ///
    /// Hemisphere letters are matched case-insensitively.
    pub fn parse(filename: &str) -> Option<Self> {
        let bytes = filename.as_bytes();

        for start in 0..bytes.len() {
            let north = match bytes[start].to_ascii_lowercase() {
                b'n' => true,
                b's' => false,
                _ => continue,
            };
            let Some((lat, next)) = leading_number(bytes, start + 1) else {
                continue;
            };
            let east = match bytes.get(next).map(u8::to_ascii_lowercase) {
                Some(b'e') => true,
                Some(b'w') => false,
                _ => continue,
            };
            let Some((lon, _)) = leading_number(bytes, next + 1) else {
                continue;
            };

            return Some(TileName {
                lat: if north { lat } else { -lat },
                lon: if east { lon } else { -lon },
            });
        }

        None
    }

    /// Parse the file name component of a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DemError::InvalidFilename(path.display().to_string()))?;

        Self::parse(filename).ok_or_else(|| DemError::InvalidFilename(filename.to_string()))
    }
}

/// Parse the run of ASCII digits starting at `from`, returning it and the index after it.
fn leading_number(bytes: &[u8], from: usize) -> Option<(i32, usize)> {
    let rest = bytes.get(from..)?;
    let len = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let digits = std::str::from_utf8(&rest[..len]).ok()?;
    Some((digits.parse().ok()?, from + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_name_aster() {
        let name = TileName::parse("ASTGTM2_N51W001_dem.tif").unwrap();
        assert_eq!(name, TileName { lat: 51, lon: -1 });

        let name = TileName::parse("ASTGTM2_N51E000_dem.tif").unwrap();
        assert_eq!(name, TileName { lat: 51, lon: 0 });

        let name = TileName::parse("ASTGTM2_S12E130_dem.tif").unwrap();
        assert_eq!(name, TileName { lat: -12, lon: 130 });
    }

    #[test]
    fn test_tile_name_usgs() {
        let name = TileName::parse("USGS_13_n48w123_20240327.tif").unwrap();
        assert_eq!(name.lat, 48);
        assert_eq!(name.lon, -123);

        let name = TileName::parse("USGS_13_n47w122_20250813.tif").unwrap();
        assert_eq!(name.lat, 47);
        assert_eq!(name.lon, -122);
    }

    #[test]
    fn test_tile_name_invalid() {
        assert!(TileName::parse("invalid.tif").is_none());
        assert!(TileName::parse("EUDEMv11_EPSG4326.tif").is_none());
        assert!(TileName::parse("N51").is_none());
        assert!(matches!(
            TileName::from_path("dem/merged.tif"),
            Err(DemError::InvalidFilename(name)) if name == "merged.tif"
        ));
    }
}
