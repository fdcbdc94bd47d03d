//! Command Line Interface (CLI) layer for firepost.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) that builds the worker pools and
//! dispatches each subcommand to `firepost::api`.
//!
//! If you are embedding firepost into another application, prefer using
//! the high-level `firepost::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
