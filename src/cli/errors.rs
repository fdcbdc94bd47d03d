use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid threshold: {value}. Must be a probability between 0 and 1")]
    InvalidThreshold { value: f64 },

    #[error("Worker count must be greater than 0 for {arg}")]
    InvalidJobs { arg: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
