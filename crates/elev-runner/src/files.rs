//! Directory listing helpers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files in `dir` whose name ends with `suffix` (e.g. `".tif"`), sorted by name.
///
/// Subdirectories are ignored, as are GDAL sidecars such as `x.tif.aux.xml`.
pub fn list_files(dir: &Path, suffix: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// File name of a path as text, empty when it has none.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
