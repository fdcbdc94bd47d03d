//! High-level library API: path-based entry points that open the GDAL/OGR
//! datasets and external tools each stage needs. Prefer these over the
//! low-level `core` functions when integrating firepost.
use std::path::Path;

use tracing::info;

use crate::core::concatenate::concatenate;
use crate::core::dissolve::{DissolveReport, dissolve};
use crate::core::filter::filter_by_max_prob;
use crate::core::parallel::WorkerPool;
use crate::core::params::{ConcatenateParams, DissolveParams, FilterParams, PolygonizeParams};
use crate::core::polygonize::{PolygonizeReport, polygonize};
use crate::error::Result;
use crate::io::{ChipReader, OgrSink, OgrSource, SystemRunner};
use crate::types::BatchReport;

/// Dissolve every polygon of `src` into `dst`.
/// The output keeps the source CRS and, unless `params.driver` is set, its driver.
pub fn dissolve_path(
    src: &Path,
    dst: &Path,
    params: &DissolveParams,
    pool: &WorkerPool,
) -> Result<DissolveReport> {
    info!("Dissolving {:?} -> {:?}", src, dst);
    let mut source = OgrSource::open(src)?;
    dissolve(&mut source, pool, params, |spec| {
        Ok(OgrSink::create(dst, &spec.driver, spec.crs.as_deref())?)
    })
}

/// Threshold, polygonize and merge every chip of `input_dir` into `output`
/// using the GDAL command-line tools found on `PATH`.
pub fn polygonize_dir(
    input_dir: &Path,
    output: &Path,
    params: &PolygonizeParams,
    pool: &WorkerPool,
) -> Result<PolygonizeReport> {
    info!("Polygonizing {:?} -> {:?}", input_dir, output);
    polygonize(&SystemRunner, pool, input_dir, output, params)
}

/// Append reference bands to every chip of `input_dir`, writing into `output_dir`.
pub fn concatenate_dir(
    input_dir: &Path,
    output_dir: &Path,
    params: &ConcatenateParams,
    pool: &WorkerPool,
) -> Result<BatchReport> {
    info!("Concatenating {:?} -> {:?}", input_dir, output_dir);
    concatenate(pool, input_dir, output_dir, params)
}

/// Link the chips of `input_dir` whose maximum reaches the threshold into
/// `output_dir`. `output_dir` is emptied first.
pub fn filter_dir(
    input_dir: &Path,
    output_dir: &Path,
    params: &FilterParams,
    pool: &WorkerPool,
) -> Result<BatchReport> {
    info!("Filtering {:?} -> {:?}", input_dir, output_dir);
    filter_by_max_prob(pool, input_dir, output_dir, params, |chip: &Path| {
        Ok(ChipReader::open(chip)?.max_value()?)
    })
}
