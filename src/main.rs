//! firepost CLI entrypoint.
//!
//! Thin wrapper over the `cli` module: parse args, dispatch to the selected
//! stage, and exit with a non-zero status on failure.
//! For programmatic use, prefer the library API (`firepost::api`).

use clap::Parser;

mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
