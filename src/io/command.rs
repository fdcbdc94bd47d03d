//! External GDAL/OGR tool invocation.
//!
//! Commands are built as discrete argument vectors and run without a shell.
//! A non-zero exit becomes `Error::ExternalTool` carrying the captured stderr;
//! nothing is retried.
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Program name plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<OsString>,
    /// Suppress echoing the command line before it runs.
    pub quiet: bool,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        ExternalCommand {
            program: program.into(),
            args: Vec::new(),
            quiet: true,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn verbose(mut self) -> Self {
        self.quiet = false;
        self
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for a in &self.args {
            write!(f, " {}", a.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands. Implementations must be shareable across pool workers.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &ExternalCommand) -> Result<CommandOutput>;
}

/// Runs commands as child processes of this one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ExternalCommand) -> Result<CommandOutput> {
        if command.quiet {
            debug!("Running: {}", command);
        } else {
            info!("Running: {}", command);
        }
        let output = Command::new(&command.program)
            .args(&command.args)
            .output()
            .map_err(|source| Error::ToolLaunch {
                program: command.program.clone(),
                source,
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(Error::ExternalTool {
                program: command.program.clone(),
                status: output.status.code(),
                stderr: if stderr.trim().is_empty() { stdout } else { stderr },
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }
}

pub const GDAL_CALC: &str = "gdal_calc.py";
pub const GDAL_POLYGONIZE: &str = "gdal_polygonize.py";
pub const OGRMERGE: &str = "ogrmerge.py";
pub const OGR2OGR: &str = "ogr2ogr";

/// Zero out pixels below `pixel_threshold`, keep the rest, mark 0 as no-data.
pub fn gdal_calc(src: &Path, dst: &Path, pixel_threshold: u8) -> ExternalCommand {
    ExternalCommand::new(GDAL_CALC)
        .arg("--calc")
        .arg(format!("(A >= {pixel_threshold}) * A"))
        .arg("-A")
        .arg(src)
        .args(["--NoDataValue", "0"])
        .arg("--outfile")
        .arg(dst)
}

/// Raster to vector, one output file per raster.
pub fn gdal_polygonize(src: &Path, dst: &Path) -> ExternalCommand {
    ExternalCommand::new(GDAL_POLYGONIZE).arg(src).arg(dst)
}

/// Merge `srcs` into a single layer of a fresh `output` in `target_srs`.
pub fn ogrmerge<P: AsRef<Path>>(srcs: &[P], output: &Path, target_srs: &str, driver: &str) -> ExternalCommand {
    ExternalCommand::new(OGRMERGE)
        .args(["-overwrite_ds", "-single", "-a_srs"])
        .arg(target_srs)
        .arg("-f")
        .arg(driver)
        .arg("-o")
        .arg(output)
        .args(srcs.iter().map(|p| p.as_ref().as_os_str()))
        .verbose()
}

/// Append `src` into the (possibly existing) `output`.
pub fn ogr2ogr_append(src: &Path, output: &Path, driver: &str) -> ExternalCommand {
    ExternalCommand::new(OGR2OGR)
        .arg("-f")
        .arg(driver)
        .args(["-update", "-append"])
        .arg(output)
        .arg(src)
        .verbose()
}
