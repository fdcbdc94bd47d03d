use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "firepost", version, about = "firepost CLI")]
pub struct CliArgs {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    /// Hide progress bars
    #[arg(long, global = true, default_value_t = false)]
    pub no_progress: bool,

    /// Workers for CPU-bound stages (default: one per core)
    #[arg(short = 'j', long, global = true)]
    pub jobs: Option<usize>,

    /// Workers for stages that wait on external tools or disk
    #[arg(long, global = true)]
    pub io_jobs: Option<usize>,

    /// JSON pipeline config; command-line flags take precedence
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Dissolve every polygon of a vector dataset into non-overlapping polygons
    Dissolve {
        /// Source vector dataset
        src: PathBuf,

        /// Output vector dataset
        dst: PathBuf,

        /// Output OGR driver (default: same as the source)
        #[arg(short = 'f', long)]
        format: Option<String>,

        /// Features per dissolve group
        #[arg(long)]
        group_size: Option<usize>,
    },

    /// Threshold and polygonize chips, then merge them into one vector file
    Polygonize {
        /// Directory containing *.tif chips
        input_dir: PathBuf,

        /// Merged output vector file
        #[arg(short, long)]
        output: PathBuf,

        /// Probability threshold in [0, 1]; no thresholding when omitted
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Keep intermediate files in this directory instead of a temporary one
        #[arg(long)]
        temp_dir: Option<PathBuf>,

        /// Vector files per first-level merge group
        #[arg(long)]
        merge_group_size: Option<usize>,

        /// CRS assigned to the merged output
        #[arg(long)]
        srs: Option<String>,
    },

    /// Append bands of a reference raster to every chip
    Concatenate {
        /// Directory containing *.tif chips
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Directory receiving the extended chips
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Reference raster providing the extra bands
        #[arg(short, long)]
        band_path: PathBuf,

        /// Number of reference bands to append
        #[arg(short, long, alias = "N-bands")]
        n_bands: usize,
    },

    /// Link chips whose maximum probability reaches the threshold
    Filter {
        /// Directory containing the chips
        input_dir: PathBuf,

        /// Output directory (cleared before the run)
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Probability threshold in [0, 1]
        #[arg(short, long, default_value_t = 0.5)]
        threshold: f64,
    },
}
