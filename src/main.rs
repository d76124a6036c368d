//! pymac_bundler - package Python applications as macOS app bundles.
//!
//! Exit codes: 0 on success (soft failures included), 1 on a hard failure,
//! 2 for usage errors reported by clap.

use pymac_bundler::cli;
use pymac_bundler::cli::OutputManager;
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = cli::run().await {
        let output = OutputManager::new();
        output.error(&format!("Packaging failed: {e}"));
        for suggestion in e.recovery_suggestions() {
            output.hint(&suggestion);
        }
        process::exit(1);
    }
}
