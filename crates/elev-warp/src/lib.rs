//! # elev-warp
//!
//! Reprojection of rasters between EPSG reference systems by running the
//! external GDAL `gdalwarp` program.
//!
//! ```no_run
//! use elev_warp::Reprojector;
//! use std::path::Path;
//!
//! let kind = Reprojector::new().reproject(
//!     Path::new("dem/ASTGDEMv20_EPSG4326.tif"),
//!     Path::new("dem/ASTGDEMv20_EPSG27700.tif"),
//!     4326,
//!     27700,
//! )?;
//! println!("{} done", kind);
//! # Ok::<(), elev_warp::WarpError>(())
//! ```

mod error;
mod reproject;

pub use error::{WarpError, WarpResult};
pub use reproject::{ReprojectionKind, Reprojector, WarpConfig, DEFAULT_PROGRAM};
