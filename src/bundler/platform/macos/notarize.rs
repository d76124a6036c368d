//! Notarization through `xcrun notarytool` with a stored keychain profile.
//!
//! Every step is best-effort: failures are logged and reported, never
//! returned as errors.

use crate::bundler::{
    error::Result,
    settings::NotarizeSettings,
    tools::{Toolset, run_tool, run_tool_soft},
};
use std::path::Path;

/// Outcome of notarizing one artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotarizeReport {
    /// Submission accepted by the notary service
    pub accepted: bool,
    /// Ticket stapled to the artifact
    pub stapled: bool,
}

/// Notarizes `artifact` (a disk image or an `.app` bundle).
///
/// A bundle is zipped with `ditto` first since `notarytool` only accepts
/// archives, images and packages. The ticket is stapled to `artifact`
/// itself, not to the zip.
pub async fn notarize(
    artifact: &Path,
    settings: &NotarizeSettings,
    tools: &Toolset,
) -> Result<NotarizeReport> {
    let mut report = NotarizeReport::default();
    log::info!(
        "Notarizing {} with profile '{}'",
        artifact.display(),
        settings.keychain_profile
    );

    // The zip lives in `_zip_dir` until the submission finishes.
    let (submission, _zip_dir) = if artifact.is_dir() {
        let zip_dir = match tempfile::Builder::new().prefix("pymac-notarize").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                log::warn!(
                    "Skipping notarization of {}: cannot create a temporary directory: {}",
                    artifact.display(),
                    e
                );
                return Ok(report);
            }
        };
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_string());
        let zip_path = zip_dir.path().join(format!("{file_name}.zip"));

        let mut ditto = tools.command("ditto")?;
        ditto
            .arg("-c")
            .arg("-k")
            .arg("--keepParent")
            .arg(artifact)
            .arg(&zip_path);
        if !run_tool_soft("ditto", &mut ditto).await {
            log::warn!("Skipping notarization of {}", artifact.display());
            return Ok(report);
        }
        (zip_path, Some(zip_dir))
    } else {
        (artifact.to_path_buf(), None)
    };

    let mut submit = tools.command("xcrun")?;
    submit
        .arg("notarytool")
        .arg("submit")
        .arg(&submission)
        .arg("--keychain-profile")
        .arg(&settings.keychain_profile)
        .arg("--wait");
    report.accepted = match run_tool("notarytool", &mut submit).await {
        Ok(output) => submission_accepted(&String::from_utf8_lossy(&output.stdout)),
        Err(e) => {
            log::warn!("{}", e);
            false
        }
    };

    if !report.accepted {
        log::warn!("Notarization of {} failed", artifact.display());
        return Ok(report);
    }
    log::info!("Notarized {}", artifact.display());

    if settings.staple {
        let mut staple = tools.command("xcrun")?;
        staple.arg("stapler").arg("staple").arg(artifact);
        report.stapled = run_tool_soft("stapler", &mut staple).await;
    }

    Ok(report)
}

/// `notarytool submit --wait` exits cleanly for rejected submissions too;
/// only the final status line tells them apart.
fn submission_accepted(stdout: &str) -> bool {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix("status:"))
        .is_some_and(|status| status.trim() == "Accepted")
}
