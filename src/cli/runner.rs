use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use firepost::core::params::{
    ConcatenateParams, DissolveParams, FilterParams, PipelineConfig, PolygonizeParams,
};
use firepost::{
    ExecutionMode, Threshold, WorkerPool, concatenate_dir, dissolve_path, filter_dir,
    polygonize_dir,
};

use super::args::{CliArgs, Command};
use super::errors::AppError;

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_threshold(value: f64) -> Result<Threshold, AppError> {
    Threshold::new(value).map_err(|_| AppError::InvalidThreshold { value })
}

fn check_jobs(arg: &str, jobs: Option<usize>) -> Result<(), AppError> {
    if jobs == Some(0) {
        return Err(AppError::InvalidJobs {
            arg: arg.to_string(),
        });
    }
    Ok(())
}

fn load_config(args: &CliArgs) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            PipelineConfig::load(path)?
        }
        None => PipelineConfig::default(),
    };
    check_jobs("--jobs", args.jobs)?;
    check_jobs("--io-jobs", args.io_jobs)?;
    if args.jobs.is_some() {
        config.jobs = args.jobs;
    }
    if args.io_jobs.is_some() {
        config.io_jobs = args.io_jobs;
    }
    if args.no_progress {
        config.progress = false;
    }
    config.validate()?;
    Ok(config)
}

fn build_pool(config: &PipelineConfig, mode: ExecutionMode) -> firepost::Result<WorkerPool> {
    let jobs = match mode {
        ExecutionMode::Compute => config.jobs,
        ExecutionMode::Blocking => config.io_jobs,
    };
    let pool = WorkerPool::new(mode, jobs)?.with_progress(config.progress);
    info!("Using {} {} workers", pool.jobs(), mode);
    Ok(pool)
}

fn log_report<T: serde::Serialize>(stage: &str, report: &T) {
    match serde_json::to_string(report) {
        Ok(json) => info!("{} complete: {}", stage, json),
        Err(_) => info!("{} complete", stage),
    }
}

fn ensure_exists(path: &Path) -> Result<(), AppError> {
    if !path.exists() {
        return Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);
    let config = load_config(&args)?;

    match args.command {
        Command::Dissolve {
            src,
            dst,
            format,
            group_size,
        } => {
            ensure_exists(&src)?;
            let params = DissolveParams {
                group_size: group_size.unwrap_or(config.dissolve_group_size),
                driver: format,
            };
            let pool = build_pool(&config, ExecutionMode::Compute)?;
            let report = dissolve_path(&src, &dst, &params, &pool)?;
            log_report("Dissolve", &report);
        }
        Command::Polygonize {
            input_dir,
            output,
            threshold,
            temp_dir,
            merge_group_size,
            srs,
        } => {
            ensure_exists(&input_dir)?;
            let params = PolygonizeParams {
                threshold: threshold.map(parse_threshold).transpose()?,
                temp_dir,
                merge_group_size: merge_group_size.unwrap_or(config.merge_group_size),
                target_srs: srs.unwrap_or_else(|| config.target_srs.clone()),
                driver: config.merge_driver.clone(),
            };
            let pool = build_pool(&config, ExecutionMode::Blocking)?;
            let report = polygonize_dir(&input_dir, &output, &params, &pool)?;
            log_report("Polygonize", &report);
        }
        Command::Concatenate {
            input_dir,
            output_dir,
            band_path,
            n_bands,
        } => {
            ensure_exists(&input_dir)?;
            ensure_exists(&band_path)?;
            let params = ConcatenateParams { band_path, n_bands };
            let pool = build_pool(&config, ExecutionMode::Compute)?;
            let report = concatenate_dir(&input_dir, &output_dir, &params, &pool)?;
            log_report("Concatenate", &report);
        }
        Command::Filter {
            input_dir,
            output_dir,
            threshold,
        } => {
            ensure_exists(&input_dir)?;
            let params = FilterParams {
                threshold: parse_threshold(threshold)?,
            };
            let pool = build_pool(&config, ExecutionMode::Blocking)?;
            let report = filter_dir(&input_dir, &output_dir, &params, &pool)?;
            log_report("Filter", &report);
        }
    }

    Ok(())
}
