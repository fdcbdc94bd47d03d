//! Keep only chips whose maximum probability reaches a threshold.
//!
//! Passing chips are symlinked (absolute target) into the output directory,
//! which is emptied before the run.
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::core::params::FilterParams;
use crate::core::parallel::WorkerPool;
use crate::error::{Error, Result};
use crate::io::list_files;
use crate::types::{BatchReport, ChipOutcome, SkipReason, Threshold};

#[cfg(unix)]
fn link(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn link(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

/// Remove `dir` (if present) and recreate it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Link `chip` into `output_dir` when `max_value(chip)` passes `threshold`.
pub fn filter_chip<F>(
    chip: &Path,
    output_dir: &Path,
    threshold: Threshold,
    max_value: &F,
) -> Result<ChipOutcome>
where
    F: Fn(&Path) -> Result<f64> + ?Sized,
{
    let max = max_value(chip)?;
    if !threshold.passes(max) {
        debug!("{} dropped (max {})", chip.display(), max);
        return Ok(ChipOutcome::Skipped(SkipReason::BelowThreshold));
    }
    let file_name = chip.file_name().ok_or_else(|| Error::InvalidArgument {
        arg: "chip",
        value: chip.display().to_string(),
    })?;
    let target = fs::canonicalize(chip)?;
    let dst = output_dir.join(file_name);
    link(&target, &dst)?;
    Ok(ChipOutcome::Written(dst))
}

/// Filter every file of `input_dir` into a freshly cleared `output_dir`.
pub fn filter_by_max_prob<F>(
    pool: &WorkerPool,
    input_dir: &Path,
    output_dir: &Path,
    params: &FilterParams,
    max_value: F,
) -> Result<BatchReport>
where
    F: Fn(&Path) -> Result<f64> + Sync,
{
    if let (Ok(a), Ok(b)) = (fs::canonicalize(input_dir), fs::canonicalize(output_dir)) {
        if a == b {
            return Err(Error::InvalidArgument {
                arg: "output_dir",
                value: format!("{} is the input directory", output_dir.display()),
            });
        }
    }
    reset_dir(output_dir)?;
    let output_dir = fs::canonicalize(output_dir)?;

    let threshold = params.threshold;
    info!("Threshold: {}", threshold);
    let files = list_files(input_dir, "*")?;

    let results = pool.map(files, "filter chips", |_, chip| {
        filter_chip(&chip, &output_dir, threshold, &max_value)
    });
    let report = BatchReport::from_outcomes(results.outcomes());
    info!(
        "Kept {} chips, dropped {}, failed {}",
        report.processed, report.skipped, report.errors
    );
    Ok(report)
}
