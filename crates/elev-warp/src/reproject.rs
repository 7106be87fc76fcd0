//! Running `gdalwarp` to move a raster between reference systems.

use crate::{WarpError, WarpResult};
use elev_dem::{Crs, CrsKind};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Default warp executable, looked up on `PATH`.
pub const DEFAULT_PROGRAM: &str = "gdalwarp";

/// Nature of a reference-system change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReprojectionKind {
    /// Geographic to geographic (datum transformation).
    Transform,
    /// Geographic to projected.
    Project,
    /// From a projected system to anything.
    Convert,
}

impl ReprojectionKind {
    /// Classify a change from `source` to `target`.
    pub fn classify(source: Crs, target: Crs) -> Self {
        match (source.kind(), target.kind()) {
            (CrsKind::Geographic, CrsKind::Geographic) => ReprojectionKind::Transform,
            (CrsKind::Geographic, _) => ReprojectionKind::Project,
            _ => ReprojectionKind::Convert,
        }
    }
}

impl fmt::Display for ReprojectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReprojectionKind::Transform => "transform",
            ReprojectionKind::Project => "project",
            ReprojectionKind::Convert => "convert",
        };
        f.write_str(name)
    }
}

/// Warp program settings as they appear in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    /// Executable name or path.
    pub program: PathBuf,
    /// Arguments placed before the reference-system options.
    pub extra_args: Vec<String>,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            extra_args: Vec::new(),
        }
    }
}

/// Invokes the warp program synchronously.
#[derive(Debug, Clone, Default)]
pub struct Reprojector {
    config: WarpConfig,
}

impl Reprojector {
    /// Reprojector using `gdalwarp` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: WarpConfig) -> Self {
        Self { config }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.program = program.into();
        self
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.config.program
    }

    /// Arguments passed to the program for one reprojection.
    pub fn command_args(
        &self,
        input: &Path,
        output: &Path,
        source_epsg: u32,
        target_epsg: u32,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.config.extra_args.iter().map(OsString::from).collect();
        args.push("-s_srs".into());
        args.push(Crs::Epsg(source_epsg).to_string().into());
        args.push("-t_srs".into());
        args.push(Crs::Epsg(target_epsg).to_string().into());
        args.push(input.as_os_str().to_owned());
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Reproject `input` from `source_epsg` to `target_epsg`, writing `output`.
    ///
    /// An existing `output` is deleted before the program runs. The call
    /// blocks until the program exits; a non-zero exit status is returned as
    /// [`WarpError::Failed`] with the captured standard error.
    pub fn reproject(
        &self,
        input: &Path,
        output: &Path,
        source_epsg: u32,
        target_epsg: u32,
    ) -> WarpResult<ReprojectionKind> {
        let kind = ReprojectionKind::classify(Crs::Epsg(source_epsg), Crs::Epsg(target_epsg));
        let program = self.config.program.display().to_string();

        if output.exists() {
            debug!(path = %output.display(), "Removing existing output");
            fs::remove_file(output).map_err(|source| WarpError::RemoveOutput {
                path: output.display().to_string(),
                source,
            })?;
        }

        let args = self.command_args(input, output, source_epsg, target_epsg);
        info!(
            %kind,
            from = source_epsg,
            to = target_epsg,
            command = %format_command(&program, &args),
            "Reprojecting raster"
        );

        let result = Command::new(&self.config.program)
            .args(&args)
            .output()
            .map_err(|source| WarpError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&result.stdout);
        if !stdout.trim().is_empty() {
            debug!(output = %stdout.trim(), "{} output", program);
        }

        if !result.status.success() {
            return Err(WarpError::Failed {
                program,
                status: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        if !output.exists() {
            return Err(WarpError::MissingOutput {
                program,
                path: output.display().to_string(),
            });
        }

        Ok(kind)
    }
}

fn format_command(program: &str, args: &[OsString]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            ReprojectionKind::classify(Crs::WGS84, Crs::OSGB36),
            ReprojectionKind::Transform
        );
        assert_eq!(
            ReprojectionKind::classify(Crs::WGS84, Crs::BRITISH_NATIONAL_GRID),
            ReprojectionKind::Project
        );
        assert_eq!(
            ReprojectionKind::classify(Crs::BRITISH_NATIONAL_GRID, Crs::WGS84),
            ReprojectionKind::Convert
        );
        assert_eq!(
            ReprojectionKind::classify(Crs::ETRS_LAEA, Crs::WEB_MERCATOR),
            ReprojectionKind::Convert
        );
    }

    #[test]
    fn test_command_args() {
        let reprojector = Reprojector::new().with_extra_args(["-r", "near"]);
        let args = reprojector.command_args(Path::new("in.tif"), Path::new("out.tif"), 4326, 27700);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["-r", "near", "-s_srs", "EPSG:4326", "-t_srs", "EPSG:27700", "in.tif", "out.tif"]
        );
        assert_eq!(reprojector.program(), Path::new("gdalwarp"));
    }

    #[test]
    fn test_failed_display() {
        let err = WarpError::Failed {
            program: "gdalwarp".into(),
            status: Some(1),
            stderr: "ERROR 4: in.tif: No such file or directory".into(),
        };
        assert_eq!(
            err.to_string(),
            "gdalwarp failed (exit status 1): ERROR 4: in.tif: No such file or directory"
        );
    }
}
