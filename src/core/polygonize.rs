//! Threshold and polygonize raster chips, then merge the per-chip vector files
//! into one dataset.
//!
//! Per-chip work is dominated by external tool latency and runs on the blocking
//! pool. The merge is two-level: bounded groups of files are merged in parallel
//! with `ogrmerge.py`, then each group file is appended, strictly in group
//! order, into the single output with `ogr2ogr`. The append step mutates one
//! shared file and is never parallelized.
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::chunk::{grouper, real};
use crate::core::params::PolygonizeParams;
use crate::core::parallel::WorkerPool;
use crate::error::{Error, Result};
use crate::io::command::{self, CommandRunner};
use crate::io::list_files;
use crate::types::Threshold;

/// Scratch subdirectory holding the first-level merge outputs.
pub const GROUPS_DIR: &str = "groups";

/// Scratch subdirectory holding thresholded chips. Keeps them apart from the
/// inputs when the scratch directory is the input directory.
pub const THRESHOLDED_DIR: &str = "thresholded";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolygonizeReport {
    pub chips: usize,
    pub polygonized: usize,
    pub failed: usize,
    pub groups: usize,
}

/// File extension used for intermediate files written with `driver`.
pub fn driver_extension(driver: &str) -> String {
    match driver.to_ascii_lowercase().as_str() {
        "gpkg" => "gpkg".to_string(),
        "esri shapefile" => "shp".to_string(),
        "geojson" => "geojson".to_string(),
        "flatgeobuf" => "fgb".to_string(),
        other => other.replace(' ', "_"),
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Threshold (optionally) and polygonize one chip into `scratch`.
/// Returns the per-chip vector file.
pub fn process_chip<R: CommandRunner + ?Sized>(
    runner: &R,
    chip: &Path,
    scratch: &Path,
    threshold: Option<Threshold>,
) -> Result<PathBuf> {
    let file_name = chip.file_name().ok_or_else(|| Error::InvalidArgument {
        arg: "chip",
        value: chip.display().to_string(),
    })?;
    let stem = chip
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut src = chip.to_path_buf();
    if let Some(t) = threshold {
        let thresholded_dir = scratch.join(THRESHOLDED_DIR);
        fs::create_dir_all(&thresholded_dir)?;
        let thresholded = thresholded_dir.join(file_name);
        remove_stale(&thresholded)?;
        runner.run(&command::gdal_calc(chip, &thresholded, t.pixel_value()))?;
        src = thresholded;
    }

    let dst = scratch.join(format!("{stem}.gpkg"));
    remove_stale(&dst)?;
    runner.run(&command::gdal_polygonize(&src, &dst))?;
    Ok(dst)
}

/// Two-level merge of `files` into `output`. Returns the number of groups.
///
/// Group files live in `scratch/groups`; they are removed after a successful
/// final append and left in place when any merge step fails. An existing
/// `output` is replaced, never appended to.
pub fn merge_vector_files<R: CommandRunner + ?Sized>(
    runner: &R,
    pool: &WorkerPool,
    files: &[PathBuf],
    output: &Path,
    scratch: &Path,
    params: &PolygonizeParams,
) -> Result<usize> {
    params.validate()?;
    let groups_dir = scratch.join(GROUPS_DIR);
    fs::create_dir_all(&groups_dir)?;
    let ext = driver_extension(&params.driver);

    let groups: Vec<Vec<PathBuf>> = grouper(files.iter().cloned(), params.merge_group_size)?
        .map(real)
        .collect();
    info!(
        "Merging {} vector files in {} groups (of up to {})",
        files.len(),
        groups.len(),
        params.merge_group_size
    );

    let merged = pool.map(groups, "merge groups", |i, srcs| {
        let out = groups_dir.join(format!("{i}.{ext}"));
        runner.run(&command::ogrmerge(&srcs, &out, &params.target_srs, &params.driver))?;
        Ok(out)
    });
    let group_files = match merged.into_all() {
        Ok(paths) => paths,
        Err(e) => {
            error!("Group merge failed; keeping {} for inspection", groups_dir.display());
            return Err(e);
        }
    };

    if output.exists() {
        info!("Replacing existing {}", output.display());
        fs::remove_file(output)?;
    }
    for group_file in &group_files {
        if let Err(e) = runner.run(&command::ogr2ogr_append(group_file, output, &params.driver)) {
            error!(
                "Appending {} failed; keeping {} for inspection",
                group_file.display(),
                groups_dir.display()
            );
            return Err(e);
        }
    }

    if let Err(e) = fs::remove_dir_all(&groups_dir) {
        warn!("Could not remove {}: {}", groups_dir.display(), e);
    }
    Ok(group_files.len())
}

/// Polygonize every `*.tif` chip of `input_dir` and merge the results into `output`.
pub fn polygonize<R: CommandRunner + ?Sized>(
    runner: &R,
    pool: &WorkerPool,
    input_dir: &Path,
    output: &Path,
    params: &PolygonizeParams,
) -> Result<PolygonizeReport> {
    params.validate()?;
    let chips = list_files(input_dir, "*.tif")?;
    info!("Total chips: {}", chips.len());
    if let Some(t) = params.threshold {
        info!("Applying threshold {}", t);
    }

    // An auto-created scratch directory is removed when `_owned` drops,
    // on success and on failure alike.
    let (_owned, scratch) = match &params.temp_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            (None, dir.clone())
        }
        None => {
            let tmp = tempfile::Builder::new().prefix("firepost_").tempdir()?;
            let path = tmp.path().to_path_buf();
            (Some(tmp), path)
        }
    };

    let mut report = PolygonizeReport {
        chips: chips.len(),
        ..Default::default()
    };
    if chips.is_empty() {
        warn!("No chips found in {}", input_dir.display());
        return Ok(report);
    }

    let names = chips.clone();
    let results = pool.map(chips, "polygonize chips", |_, chip| {
        process_chip(runner, &chip, &scratch, params.threshold)
    });
    let (vector_files, failures) = results.partition();
    for failure in &failures {
        warn!(
            "Chip {} was not polygonized: {}",
            names[failure.index].display(),
            failure.error
        );
    }
    report.polygonized = vector_files.len();
    report.failed = failures.len();

    if vector_files.is_empty() {
        return Err(Error::Processing(format!(
            "none of the {} chips could be polygonized",
            report.chips
        )));
    }

    report.groups = merge_vector_files(runner, pool, &vector_files, output, &scratch, params)?;
    info!(
        "Polygonized {} of {} chips into {} ({} groups)",
        report.polygonized,
        report.chips,
        output.display(),
        report.groups
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::command::{CommandOutput, ExternalCommand};
    use crate::types::ExecutionMode;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<ExternalCommand>>,
        fail_program: Option<&'static str>,
    }

    impl CommandRunner for Recorder {
        fn run(&self, command: &ExternalCommand) -> Result<CommandOutput> {
            self.commands.lock().unwrap().push(command.clone());
            if self.fail_program == Some(command.program.as_str()) {
                return Err(Error::ExternalTool {
                    program: command.program.clone(),
                    status: Some(1),
                    stderr: "failed".into(),
                });
            }
            Ok(CommandOutput::default())
        }
    }

    fn pool() -> WorkerPool {
        WorkerPool::new(ExecutionMode::Blocking, Some(4))
            .unwrap()
            .with_progress(false)
    }

    #[test]
    fn extension_follows_driver() {
        assert_eq!(driver_extension("GPKG"), "gpkg");
        assert_eq!(driver_extension("ESRI Shapefile"), "shp");
        assert_eq!(driver_extension("FlatGeobuf"), "fgb");
    }

    #[test]
    fn chip_without_threshold_is_only_polygonized() {
        let scratch = tempfile::tempdir().unwrap();
        let runner = Recorder::default();
        let out = process_chip(&runner, Path::new("in/c_01.tif"), scratch.path(), None).unwrap();
        assert_eq!(out, scratch.path().join("c_01.gpkg"));
        let cmds = runner.commands.into_inner().unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].program, command::GDAL_POLYGONIZE);
        assert_eq!(cmds[0].args[0], Path::new("in/c_01.tif").as_os_str());
    }

    #[test]
    fn threshold_runs_calc_and_polygonizes_its_output() {
        let scratch = tempfile::tempdir().unwrap();
        let runner = Recorder::default();
        let t = Threshold::new(0.5).unwrap();
        process_chip(&runner, Path::new("in/c_01.tif"), scratch.path(), Some(t)).unwrap();
        let cmds = runner.commands.into_inner().unwrap();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].program, command::GDAL_CALC);
        assert_eq!(cmds[0].args[1], "(A >= 128) * A");
        let thresholded = scratch.path().join(THRESHOLDED_DIR).join("c_01.tif");
        assert_eq!(cmds[0].args[7], thresholded.as_os_str());
        assert_eq!(cmds[1].args[0], thresholded.as_os_str());
    }

    #[test]
    fn scratch_equal_to_chip_directory_leaves_the_chip_alone() {
        let dir = tempfile::tempdir().unwrap();
        let chip = dir.path().join("c_01.tif");
        fs::write(&chip, b"chip").unwrap();
        let runner = Recorder::default();
        let t = Threshold::new(0.5).unwrap();
        process_chip(&runner, &chip, dir.path(), Some(t)).unwrap();
        assert_eq!(fs::read(&chip).unwrap(), b"chip");
        let cmds = runner.commands.into_inner().unwrap();
        assert_eq!(cmds[0].args[3], chip.as_os_str());
        assert_ne!(cmds[0].args[7], chip.as_os_str());
    }

    #[test]
    fn existing_output_is_replaced_before_appending() {
        let scratch = tempfile::tempdir().unwrap();
        let output = scratch.path().join("out.gpkg");
        fs::write(&output, b"previous run").unwrap();
        let files = vec![PathBuf::from("a.gpkg")];
        let runner = Recorder::default();
        merge_vector_files(
            &runner,
            &pool(),
            &files,
            &output,
            scratch.path(),
            &PolygonizeParams::default(),
        )
        .unwrap();
        // The recording runner writes nothing, so only the removal is visible.
        assert!(!output.exists());
        let cmds = runner.commands.into_inner().unwrap();
        assert_eq!(cmds.iter().filter(|c| c.program == command::OGR2OGR).count(), 1);
    }

    #[test]
    fn group_files_are_removed_after_success() {
        let scratch = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("{i}.gpkg"))).collect();
        let params = PolygonizeParams {
            merge_group_size: 2,
            ..Default::default()
        };
        let runner = Recorder::default();
        let n = merge_vector_files(
            &runner,
            &pool(),
            &files,
            Path::new("out.gpkg"),
            scratch.path(),
            &params,
        )
        .unwrap();
        assert_eq!(n, 3);
        assert!(!scratch.path().join(GROUPS_DIR).exists());
    }

    #[test]
    fn failed_append_is_fatal_and_keeps_group_files() {
        let scratch = tempfile::tempdir().unwrap();
        let files = vec![PathBuf::from("a.gpkg")];
        let runner = Recorder {
            fail_program: Some(command::OGR2OGR),
            ..Default::default()
        };
        let err = merge_vector_files(
            &runner,
            &pool(),
            &files,
            Path::new("out.gpkg"),
            scratch.path(),
            &PolygonizeParams::default(),
        )
        .unwrap_err();
        assert!(err.is_external_tool());
        assert!(scratch.path().join(GROUPS_DIR).exists());
    }

    #[test]
    fn failed_group_merge_skips_append() {
        let scratch = tempfile::tempdir().unwrap();
        let files = vec![PathBuf::from("a.gpkg"), PathBuf::from("b.gpkg")];
        let runner = Recorder {
            fail_program: Some(command::OGRMERGE),
            ..Default::default()
        };
        assert!(
            merge_vector_files(
                &runner,
                &pool(),
                &files,
                Path::new("out.gpkg"),
                scratch.path(),
                &PolygonizeParams::default(),
            )
            .is_err()
        );
        let cmds = runner.commands.into_inner().unwrap();
        assert!(cmds.iter().all(|c| c.program != command::OGR2OGR));
    }
}
