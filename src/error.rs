//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, GDAL and config errors, and provides semantic variants
//! for external tool failures and argument validation.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("{program} exited with {}: {stderr}", exit_label(.status))]
    ExternalTool {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Failed to launch {program}: {source}")]
    ToolLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("External error: {0}")]
    External(String),
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

impl Error {
    pub fn external<E: std::fmt::Display>(e: E) -> Self {
        Error::External(e.to_string())
    }

    /// True for a non-zero exit of an external GDAL/OGR tool.
    pub fn is_external_tool(&self) -> bool {
        matches!(self, Error::ExternalTool { .. } | Error::ToolLaunch { .. })
    }
}
