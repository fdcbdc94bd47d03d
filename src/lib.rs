#![doc = r#"
firepost: post-processing for burned-area segmentation chips.

A segmentation model emits thousands of small probability rasters ("chips",
0-255 per pixel). This crate turns them into a single vector product:

- **filter**: keep only chips whose maximum probability reaches a threshold
  (symlinked into an output directory);
- **concatenate**: append bands of an external reference raster, clipped and
  resampled to each chip;
- **polygonize**: threshold and polygonize every chip with the GDAL tools, then
  merge the per-chip files in bounded groups and append the groups, in order,
  into one dataset;
- **dissolve**: union every polygon of a large dataset in bounded groups on all
  cores, then union the group results and write one feature per polygon.

Requirements
------------
- GDAL development headers and runtime available on your system.
- `gdal_calc.py`, `gdal_polygonize.py`, `ogrmerge.py` and `ogr2ogr` on `PATH`
  for the polygonize stage.
- Rust 2024 edition toolchain.

Quick start: dissolve a layer
-----------------------------
```rust,no_run
use std::path::Path;
use firepost::{dissolve_path, DissolveParams, ExecutionMode, WorkerPool};

fn main() -> firepost::Result<()> {
    let pool = WorkerPool::new(ExecutionMode::Compute, None)?;
    let report = dissolve_path(
        Path::new("/data/polygons.gpkg"),
        Path::new("/out/dissolved.gpkg"),
        &DissolveParams::default(),
        &pool,
    )?;
    println!("{} polygons written", report.polygons_written);
    Ok(())
}
```

Polygonize a directory of chips
-------------------------------
```rust,no_run
use std::path::Path;
use firepost::{polygonize_dir, ExecutionMode, PolygonizeParams, Threshold, WorkerPool};

fn main() -> firepost::Result<()> {
    let pool = WorkerPool::new(ExecutionMode::Blocking, None)?;
    let params = PolygonizeParams {
        threshold: Some(Threshold::new(0.5)?),
        ..Default::default()
    };
    polygonize_dir(Path::new("/data/chips"), Path::new("/out/burned.gpkg"), &params, &pool)?;
    Ok(())
}
```

Error handling
--------------
All public functions return `firepost::Result<T>`; match on `firepost::Error`
to tell external tool failures apart from GDAL or argument errors.

```rust,no_run
use std::path::Path;
use firepost::{filter_dir, Error, ExecutionMode, FilterParams, WorkerPool};

fn main() -> firepost::Result<()> {
    let pool = WorkerPool::new(ExecutionMode::Blocking, None)?;
    match filter_dir(Path::new("/chips"), Path::new("/kept"), &FilterParams::default(), &pool) {
        Ok(report) => println!("kept={} dropped={}", report.processed, report.skipped),
        Err(Error::Gdal(e)) => eprintln!("GDAL error: {e}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
    Ok(())
}
```

Useful modules
--------------
- [`api`]: path-based entry points, one per stage.
- [`core`]: chunking, worker pools, geometry and the stage implementations.
- [`io`]: GDAL raster/vector access and external command execution.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::dissolve::{DissolveReport, OutputSpec};
pub use core::parallel::{BatchResults, ItemFailure, WorkerPool};
pub use core::params::{
    ConcatenateParams, DissolveParams, FilterParams, PipelineConfig, PolygonizeParams,
};
pub use core::polygonize::PolygonizeReport;
pub use error::{Error, Result};
pub use types::{BatchReport, ChipOutcome, ExecutionMode, SkipReason, Threshold};

// Readers, sinks and external commands
pub use io::{
    ChipReader, CommandRunner, ExternalCommand, GdalError, OgrSink, OgrSource, SystemRunner,
    VectorSink, VectorSource,
};

// High-level API re-exports
pub use api::{concatenate_dir, dissolve_path, filter_dir, polygonize_dir};
