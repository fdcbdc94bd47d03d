//! I/O layer: external GDAL/OGR tool invocation, GDAL-backed raster chip
//! access, OGR vector sources/sinks for dissolve, and GeoTIFF `writers`.
pub mod command;
pub use command::{CommandOutput, CommandRunner, ExternalCommand, SystemRunner};

pub mod gdal;
pub use gdal::{Bounds, ChipMetadata, ChipReader, GdalError, PixelWindow};

pub mod vector;
pub use vector::{OgrSink, OgrSource, SourceInfo, VectorSink, VectorSource};

pub mod writers;

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Regular files in `dir` whose name matches `pattern` (e.g. `*.tif`), sorted.
pub fn list_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let full = Path::new(&base).join(pattern);
    let mut files = Vec::new();
    for entry in glob::glob(&full.to_string_lossy())? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("Unreadable entry: {}", e),
        }
    }
    files.sort();
    Ok(files)
}
