use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Threshold;

/// Features per dissolve group; bounds the peak memory of one worker.
pub const DISSOLVE_GROUP_SIZE: usize = 10_000;

/// Vector files handed to one `ogrmerge.py` call.
pub const MERGE_GROUP_SIZE: usize = 1_000;

/// CRS assigned to merged polygonize output.
pub const DEFAULT_TARGET_SRS: &str = "EPSG:5382";

pub const DEFAULT_MERGE_DRIVER: &str = "GPKG";

fn check_group_size(arg: &'static str, size: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::InvalidArgument {
            arg,
            value: size.to_string(),
        });
    }
    Ok(())
}

/// Pipeline-wide settings, loadable from a JSON config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Compute pool size; `None` uses every core.
    pub jobs: Option<usize>,
    /// Blocking (subprocess) pool size; `None` oversubscribes the cores.
    pub io_jobs: Option<usize>,
    pub progress: bool,
    pub dissolve_group_size: usize,
    pub merge_group_size: usize,
    pub target_srs: String,
    pub merge_driver: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            io_jobs: None,
            progress: true,
            dissolve_group_size: DISSOLVE_GROUP_SIZE,
            merge_group_size: MERGE_GROUP_SIZE,
            target_srs: DEFAULT_TARGET_SRS.to_string(),
            merge_driver: DEFAULT_MERGE_DRIVER.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        check_group_size("dissolve_group_size", self.dissolve_group_size)?;
        check_group_size("merge_group_size", self.merge_group_size)?;
        if self.jobs == Some(0) {
            return Err(Error::InvalidArgument {
                arg: "jobs",
                value: "0".into(),
            });
        }
        if self.io_jobs == Some(0) {
            return Err(Error::InvalidArgument {
                arg: "io_jobs",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

/// Parameters for the dissolve engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DissolveParams {
    pub group_size: usize,
    /// Output OGR driver; `None` keeps the source driver.
    pub driver: Option<String>,
}

impl Default for DissolveParams {
    fn default() -> Self {
        Self {
            group_size: DISSOLVE_GROUP_SIZE,
            driver: None,
        }
    }
}

impl DissolveParams {
    pub fn validate(&self) -> Result<()> {
        check_group_size("group_size", self.group_size)
    }
}

/// Parameters for threshold + polygonize + two-level merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonizeParams {
    /// When set, pixels below the threshold become no-data before polygonizing.
    pub threshold: Option<Threshold>,
    /// Scratch directory; a temporary one is created (and removed) when `None`.
    pub temp_dir: Option<PathBuf>,
    pub merge_group_size: usize,
    pub target_srs: String,
    pub driver: String,
}

impl Default for PolygonizeParams {
    fn default() -> Self {
        Self {
            threshold: None,
            temp_dir: None,
            merge_group_size: MERGE_GROUP_SIZE,
            target_srs: DEFAULT_TARGET_SRS.to_string(),
            driver: DEFAULT_MERGE_DRIVER.to_string(),
        }
    }
}

impl PolygonizeParams {
    pub fn validate(&self) -> Result<()> {
        check_group_size("merge_group_size", self.merge_group_size)
    }
}

/// Parameters for appending reference bands to chips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatenateParams {
    pub band_path: PathBuf,
    pub n_bands: usize,
}

impl ConcatenateParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_bands == 0 {
            return Err(Error::InvalidArgument {
                arg: "n_bands",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

/// Parameters for filtering chips by maximum probability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub threshold: Threshold,
}
