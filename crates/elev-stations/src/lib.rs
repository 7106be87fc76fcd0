//! # elev-stations
//!
//! Named station coordinates read from CSV files, e.g. the London air quality
//! monitoring sites:
//!
//! ```text
//! SiteName,Latitude,Longitude
//! Bexley - Slade Green,51.46598,0.184877
//! ```
//!
//! Column names are configurable through [`StationColumns`].

mod error;

pub use error::{StationError, StationResult};

use csv::{ReaderBuilder, StringRecord, Trim};
use elev_dem::Coordinate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Header names of the station name and coordinate columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationColumns {
    pub name: String,
    pub latitude: String,
    pub longitude: String,
}

impl Default for StationColumns {
    fn default() -> Self {
        Self {
            name: "SiteName".to_string(),
            latitude: "Latitude".to_string(),
            longitude: "Longitude".to_string(),
        }
    }
}

/// One monitoring station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Station {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Coordinates of every station, in input order.
pub fn coordinates(stations: &[Station]) -> Vec<Coordinate> {
    stations.iter().map(Station::coordinate).collect()
}

/// Read stations from a CSV file with a header row.
pub fn read_stations<P: AsRef<Path>>(path: P, columns: &StationColumns) -> StationResult<Vec<Station>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| StationError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let stations = read_stations_from(file, columns)?;
    info!(path = %path.display(), count = stations.len(), "Read stations");
    Ok(stations)
}

/// Read stations from any CSV source with a header row.
pub fn read_stations_from<R: Read>(reader: R, columns: &StationColumns) -> StationResult<Vec<Station>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let name_idx = column_index(&headers, &columns.name)?;
    let lat_idx = column_index(&headers, &columns.latitude)?;
    let lon_idx = column_index(&headers, &columns.longitude)?;

    let mut stations = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());

        stations.push(Station {
            name: record.get(name_idx).unwrap_or_default().to_string(),
            latitude: parse_number(&record, lat_idx, &columns.latitude, line)?,
            longitude: parse_number(&record, lon_idx, &columns.longitude, line)?,
        });
    }

    Ok(stations)
}

fn column_index(headers: &StringRecord, column: &str) -> StationResult<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| StationError::MissingColumn {
            column: column.to_string(),
            available: headers.iter().map(str::to_string).collect(),
        })
}

fn parse_number(record: &StringRecord, idx: usize, column: &str, line: u64) -> StationResult<f64> {
    let value = record.get(idx).unwrap_or_default();
    value.parse().map_err(|_| StationError::InvalidNumber {
        line,
        column: column.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONDON: &str = "\
SiteName,Latitude,Longitude,SiteType
Bexley - Slade Green,51.46598,0.184877,Suburban
Camden - Swiss Cottage,51.544219,-0.175284,Kerbside
";

    #[test]
    fn test_read_default_columns() {
        let stations = read_stations_from(LONDON.as_bytes(), &StationColumns::default()).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].name, "Bexley - Slade Green");
        assert_eq!(stations[1].latitude, 51.544219);
        assert_eq!(stations[1].longitude, -0.175284);
        assert_eq!(coordinates(&stations)[0], Coordinate::new(51.46598, 0.184877));
    }

    #[test]
    fn test_custom_columns() {
        let csv = "code,lat,lon\nKC1, 51.52 ,-0.21\n";
        let columns = StationColumns {
            name: "code".into(),
            latitude: "lat".into(),
            longitude: "lon".into(),
        };
        let stations = read_stations_from(csv.as_bytes(), &columns).unwrap();
        assert_eq!(stations[0].name, "KC1");
        assert_eq!(stations[0].latitude, 51.52);
    }

    #[test]
    fn test_missing_column() {
        let err = read_stations_from("SiteName,Lat,Longitude\n".as_bytes(), &StationColumns::default())
            .unwrap_err();
        match err {
            StationError::MissingColumn { column, available } => {
                assert_eq!(column, "Latitude");
                assert_eq!(available, ["SiteName", "Lat", "Longitude"]);
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_number_names_line_and_column() {
        let csv = "SiteName,Latitude,Longitude\nA,51.5,-0.1\nB,north,-0.2\n";
        let err = read_stations_from(csv.as_bytes(), &StationColumns::default()).unwrap_err();
        match err {
            StationError::InvalidNumber { line, column, value } => {
                assert_eq!(line, 3);
                assert_eq!(column, "Latitude");
                assert_eq!(value, "north");
            }
            other => panic!("expected InvalidNumber, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_cell_is_invalid() {
        let csv = "SiteName,Latitude,Longitude\nA,51.5,\n";
        assert!(matches!(
            read_stations_from(csv.as_bytes(), &StationColumns::default()),
            Err(StationError::InvalidNumber { .. })
        ));
    }
}
