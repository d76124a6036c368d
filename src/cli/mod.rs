//! Command line interface for pymac_bundler.
//!
//! Parses flags, merges the optional config file, sets up logging and runs
//! the bundler with user-facing progress output.

mod args;
pub mod commands;
mod config;
mod output;

pub use args::Args;
pub use commands::execute_command;
pub use config::FileConfig;
pub use output::OutputManager;

use crate::error::Result;

/// Parses the command line and runs one packaging job.
pub async fn run() -> Result<()> {
    let args = Args::parse_args();
    init_logging(args.verbose);
    execute_command(args).await
}

/// Installs the `env_logger` backend.
///
/// `--verbose` lowers the default filter to `debug`; `RUST_LOG` overrides
/// either default.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format_timestamp(None)
        .try_init();
}
