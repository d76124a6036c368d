//! macOS code signing with `codesign`.
//!
//! Signing never aborts a run. Per-item failures are counted, an outer
//! bundle failure is reported, and verification is best-effort.

use crate::bundler::{
    error::Result,
    platform::macos::macho,
    settings::{SigningMode, SigningSettings},
    tools::{Toolset, run_tool, run_tool_soft},
    utils::fs,
};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of signing a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignReport {
    /// Nested items signed successfully
    pub signed: usize,
    /// Nested items `codesign` rejected
    pub failed: Vec<PathBuf>,
    /// Whether the outer bundle signature succeeded
    pub bundle_signed: bool,
    /// Result of `codesign --verify`; `None` when verification did not run
    pub verified: Option<bool>,
}

/// Builds `codesign` arguments for one item.
///
/// The hardened runtime and a secure timestamp are added for real
/// identities; ad-hoc signatures cannot carry either.
pub fn codesign_args(path: &Path, signing: &SigningSettings, with_entitlements: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--force".into()];

    if signing.mode.is_identity() {
        args.push("--options".into());
        args.push("runtime".into());
        args.push("--timestamp".into());

        if with_entitlements && let Some(entitlements) = signing.entitlements.as_deref() {
            args.push("--entitlements".into());
            args.push(entitlements.into());
        }
    } else if !signing.mode.is_strong() {
        args.push("--deep".into());
    }

    if let Some(identity) = signing.mode.identity() {
        args.push("--sign".into());
        args.push(identity.into());
    }
    args.push(path.into());
    args
}

/// Collects nested code inside `bundle` in signing order, deepest first.
///
/// Includes Mach-O files (executables, `.dylib`, `.so`) and every
/// `.framework` directory under `Contents/Frameworks`. Symlinks are skipped.
pub async fn collect_nested_code(bundle: &Path) -> Result<Vec<PathBuf>> {
    let mut items = Vec::new();

    for entry in WalkDir::new(bundle).follow_links(false) {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            let is_framework = path.extension().is_some_and(|ext| ext == OsStr::new("framework"));
            if is_framework && path.starts_with(bundle.join("Contents").join("Frameworks")) {
                items.push(path.to_path_buf());
            }
            continue;
        }

        if entry.file_type().is_file()
            && fs::is_binary_candidate(path, &entry.metadata()?)
            && macho::is_mach_o(path).await?
        {
            items.push(path.to_path_buf());
        }
    }

    items.sort_by(|a, b| {
        b.components()
            .count()
            .cmp(&a.components().count())
            .then_with(|| a.cmp(b))
    });
    Ok(items)
}

/// Signs `bundle` according to `signing`.
///
/// # Errors
///
/// Only when the bundle tree cannot be walked. Tool failures are reported
/// in the returned [`SignReport`].
pub async fn sign_bundle(bundle: &Path, signing: &SigningSettings, tools: &Toolset) -> Result<SignReport> {
    let mut report = SignReport::default();
    if signing.mode == SigningMode::None {
        log::info!("Signing disabled, leaving {} unsigned", bundle.display());
        return Ok(report);
    }

    log::info!("Signing {} ({})", bundle.display(), signing.mode);

    let mut xattr = tools.command("xattr")?;
    xattr.arg("-cr").arg(bundle);
    run_tool_soft("xattr", &mut xattr).await;

    if signing.mode.is_strong() {
        let executables = bundle.join("Contents").join("MacOS");
        for item in collect_nested_code(bundle).await? {
            let args = codesign_args(&item, signing, item.starts_with(&executables));
            let mut command = tools.command("codesign")?;
            command.args(args);
            match run_tool("codesign", &mut command).await {
                Ok(_) => report.signed += 1,
                Err(e) => {
                    log::warn!("Failed to sign {}: {}", item.display(), e);
                    report.failed.push(item);
                }
            }
        }
        log::debug!(
            "Signed {} nested item(s), {} failed",
            report.signed,
            report.failed.len()
        );
    }

    let mut command = tools.command("codesign")?;
    command.args(codesign_args(bundle, signing, true));
    report.bundle_signed = run_tool_soft("codesign", &mut command).await;
    if !report.bundle_signed {
        log::warn!("{} was not signed", bundle.display());
        return Ok(report);
    }

    if signing.mode.is_strong() {
        report.verified = Some(verify(bundle, tools).await?);
    }

    Ok(report)
}

/// Runs `codesign --verify --deep --strict`. Failure is logged, not raised.
pub async fn verify(bundle: &Path, tools: &Toolset) -> Result<bool> {
    let mut command = tools.command("codesign")?;
    command
        .arg("--verify")
        .arg("--deep")
        .arg("--strict")
        .arg("--verbose=2")
        .arg(bundle);

    let verified = run_tool_soft("codesign", &mut command).await;
    if verified {
        log::info!("Signature verified for {}", bundle.display());
    }
    Ok(verified)
}

/// Signs a disk image. Only real identities sign images; ad-hoc is skipped.
///
/// Returns whether the image was signed.
pub async fn sign_dmg(dmg_path: &Path, signing: &SigningSettings, tools: &Toolset) -> Result<bool> {
    let SigningMode::Identity(identity) = &signing.mode else {
        return Ok(false);
    };

    log::info!("Signing DMG {} with identity '{}'", dmg_path.display(), identity);

    let mut command = tools.command("codesign")?;
    command
        .arg("--force")
        .arg("--timestamp")
        .arg("--sign")
        .arg(identity)
        .arg(dmg_path);
    Ok(run_tool_soft("codesign", &mut command).await)
}
