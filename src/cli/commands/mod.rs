//! Command execution coordinating the packaging run.
//!
//! Errors propagate to `main`, which prints them with recovery suggestions.

mod bundle;

use crate::cli::{Args, OutputManager};
use crate::error::Result;

use bundle::execute_bundle;

/// Builds settings from the parsed arguments and runs the bundler.
pub async fn execute_command(args: Args) -> Result<()> {
    let settings = args.into_settings()?;
    execute_bundle(settings, &OutputManager::new()).await
}
