//! Append bands from an external reference raster to each chip.
//!
//! The reference is clipped to the chip footprint and resampled to the chip
//! size. Chips the reference does not cover are skipped with
//! `SkipReason::NoOverlap`.
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::core::params::ConcatenateParams;
use crate::core::parallel::WorkerPool;
use crate::core::resize::resize_band_u8;
use crate::error::{Error, Result};
use crate::io::gdal::ChipReader;
use crate::io::list_files;
use crate::io::writers::write_tiff_bands_u8;
use crate::types::{BatchReport, ChipOutcome, SkipReason};

/// Write `output_dir/<chip name>` with the chip's bands followed by
/// `params.n_bands` bands of the reference raster.
pub fn add_extra_bands(
    chip: &Path,
    output_dir: &Path,
    params: &ConcatenateParams,
) -> Result<ChipOutcome> {
    let file_name = chip.file_name().ok_or_else(|| Error::InvalidArgument {
        arg: "chip",
        value: chip.display().to_string(),
    })?;
    let source = ChipReader::open(chip)?;
    let meta = &source.metadata;

    let reference = ChipReader::open(&params.band_path)?;
    if reference.metadata.bands < params.n_bands {
        return Err(Error::InvalidArgument {
            arg: "n_bands",
            value: format!(
                "{} (reference has {} bands)",
                params.n_bands, reference.metadata.bands
            ),
        });
    }

    let Some(window) = reference.metadata.clip_window(&meta.bounds()) else {
        debug!("{} does not overlap the reference raster", chip.display());
        return Ok(ChipOutcome::Skipped(SkipReason::NoOverlap));
    };

    let mut bands = source.read_all_bands_u8()?;
    for b in 1..=params.n_bands {
        let clipped = reference.read_window_u8(b, window)?;
        bands.push(resize_band_u8(&clipped, meta.size_x, meta.size_y)?);
    }

    let output = output_dir.join(file_name);
    write_tiff_bands_u8(
        &output,
        meta.size_x,
        meta.size_y,
        &bands,
        &meta.geotransform,
        &meta.projection,
    )?;
    Ok(ChipOutcome::Written(output))
}

/// Concatenate reference bands onto every `*.tif` chip of `input_dir`.
pub fn concatenate(
    pool: &WorkerPool,
    input_dir: &Path,
    output_dir: &Path,
    params: &ConcatenateParams,
) -> Result<BatchReport> {
    params.validate()?;
    fs::create_dir_all(output_dir)?;

    let chips = list_files(input_dir, "*.tif")?;
    info!("Total images: {}", chips.len());

    let results = pool.map(chips, "concatenate bands", |_, chip| {
        add_extra_bands(&chip, output_dir, params)
    });
    let report = BatchReport::from_outcomes(results.outcomes());

    info!("Images generated: {}", report.processed);
    info!("Images skipped (no overlap): {}", report.skipped);
    if report.errors > 0 {
        info!("Images failed: {}", report.errors);
    }
    Ok(report)
}
