//! Bundle command implementation.
//!
//! Runs preflight, the mode's pipeline, and prints a summary.

use crate::bundler::{BundleOutcome, BundledArtifact, Bundler, Settings};
use crate::cli::OutputManager;
use crate::error::Result;

/// Execute a packaging run
pub(super) async fn execute_bundle(settings: Settings, output: &OutputManager) -> Result<()> {
    let _ = output.section(&format!(
        "Packaging {} {} ({} mode)",
        settings.app_name(),
        settings.version_string(),
        settings.mode()
    ));

    // Preflight: nothing is written until every input and tool is found
    let bundler = Bundler::new(settings)?;
    let _ = output.info("All inputs and required tools found");

    let outcome = bundler.run().await?;

    print_stage_reports(&outcome, output);
    print_bundle_summary(&outcome.artifacts, output);

    if outcome.has_warnings() {
        let _ = output.warn("Finished with warnings (see above)");
    }

    Ok(())
}

fn print_stage_reports(outcome: &BundleOutcome, output: &OutputManager) {
    if let Some(merge) = &outcome.merge {
        let _ = output.success(&format!(
            "Merged {} binaries ({} identical, {} single-architecture, {} non-binary)",
            merge.merged, merge.identical, merge.single_side, merge.non_binary
        ));
        for path in &merge.fallbacks {
            let _ = output.warn(&format!("Kept arm64 only: {}", path.display()));
        }
        if merge.type_conflicts > 0 {
            let _ = output.warn(&format!(
                "{} file/directory conflict(s) resolved in favour of arm64",
                merge.type_conflicts
            ));
        }
        if merge.symlink_conflicts > 0 {
            let _ = output.warn(&format!(
                "{} symlink conflict(s) resolved in favour of arm64",
                merge.symlink_conflicts
            ));
        }
    }

    if let Some(signing) = &outcome.signing {
        if signing.bundle_signed {
            let _ = output.success(&format!(
                "Signed bundle ({} nested item(s){})",
                signing.signed,
                if signing.verified == Some(true) { ", verified" } else { "" }
            ));
        } else {
            let _ = output.warn("Bundle signing failed; the app is unsigned");
        }
        if signing.verified == Some(false) {
            let _ = output.warn("Signature verification failed");
        }
        for path in &signing.failed {
            let _ = output.warn(&format!("Could not sign {}", path.display()));
        }
    }

    if let Some(notarization) = &outcome.notarization {
        if notarization.accepted {
            let stapled = if notarization.stapled { " and stapled" } else { "" };
            let _ = output.success(&format!("Notarized{}", stapled));
        } else {
            let _ = output.warn("Notarization failed");
        }
    }
}

/// Print artifact summary
fn print_bundle_summary(artifacts: &[BundledArtifact], output: &OutputManager) {
    if artifacts.is_empty() {
        let _ = output.warn("No artifacts were created");
        return;
    }

    let _ = output.success(&format!("Created {} artifact(s)", artifacts.len()));

    for artifact in artifacts {
        let _ = output.println(&format!("\n  {}:", artifact.kind));
        let size_mb = artifact.size as f64 / 1_048_576.0;
        let _ = output.println(&format!(
            "    📦 {} ({:.2} MB)",
            artifact.path.display(),
            size_mb
        ));
        let _ = output.println(&format!("    🔐 SHA256: {}", artifact.checksum));
    }
}
