//! macOS DMG disk image creator.
//!
//! Creates drag-to-install DMG files with the native `hdiutil` tool. The
//! image holds the `.app` bundle and an `Applications` symlink.

use crate::bundler::{
    error::{Context, Error, ErrorExt, Result},
    tools::{Toolset, run_tool},
    utils::fs,
};
use std::path::{Path, PathBuf};

/// Name of the drag-to-install symlink placed next to the bundle.
pub const APPLICATIONS_LINK: &str = "Applications";

/// Target of the drag-to-install symlink.
pub const APPLICATIONS_TARGET: &str = "/Applications";

/// Copies `app_bundle` into `staging` and adds the `Applications` symlink.
///
/// Returns the path of the staged bundle.
pub async fn stage_contents(app_bundle: &Path, staging: &Path) -> Result<PathBuf> {
    let app_name = app_bundle
        .file_name()
        .context("invalid app bundle path")?;
    let staged_app = staging.join(app_name);

    log::debug!("Copying .app to staging: {}", staged_app.display());
    fs::copy_dir(app_bundle, &staged_app).await.with_context(|| {
        format!(
            "copying .app bundle to staging directory: {}",
            staged_app.display()
        )
    })?;

    fs::symlink(
        Path::new(APPLICATIONS_TARGET),
        &staging.join(APPLICATIONS_LINK),
    )
    .await?;

    Ok(staged_app)
}

/// Creates a compressed (UDZO) disk image of `app_bundle` at `dmg_path`.
///
/// Any previous image at `dmg_path` is removed first. The staging
/// directory is temporary and removed once `hdiutil` finishes.
///
/// # Errors
///
/// Staging failures and a failed `hdiutil` run are hard errors.
pub async fn create_dmg(
    app_bundle: &Path,
    dmg_path: &Path,
    volume_name: &str,
    tools: &Toolset,
) -> Result<PathBuf> {
    if !app_bundle.is_dir() {
        return Err(Error::MissingInput {
            what: "application bundle",
            path: app_bundle.to_path_buf(),
        });
    }

    if dmg_path.symlink_metadata().is_ok() {
        tokio::fs::remove_file(dmg_path)
            .await
            .fs_context("removing old disk image", dmg_path)?;
    }
    if let Some(parent) = dmg_path.parent() {
        fs::create_dir_all(parent, false).await?;
    }

    let temp_dir = tempfile::Builder::new()
        .prefix("pymac-dmg")
        .tempdir()
        .fs_context("creating temporary directory", std::env::temp_dir())?;
    stage_contents(app_bundle, temp_dir.path()).await?;

    log::info!("Creating DMG {}...", dmg_path.display());

    let mut command = tools.command("hdiutil")?;
    command
        .arg("create")
        .arg("-volname")
        .arg(volume_name)
        .arg("-srcfolder")
        .arg(temp_dir.path())
        .arg("-ov")
        .arg("-format")
        .arg("UDZO")
        .arg(dmg_path);
    run_tool("hdiutil", &mut command).await?;

    drop(temp_dir);
    log::info!("Created DMG: {}", dmg_path.display());

    Ok(dmg_path.to_path_buf())
}
