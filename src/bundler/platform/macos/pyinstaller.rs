//! PyInstaller invocation for one architecture.
//!
//! Runs `arch -<arch> <python> -m PyInstaller ...` so the interpreter (and
//! every extension module it loads) executes natively or under Rosetta for
//! the requested architecture.

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    platform::macos::app,
    settings::{Arch, Settings},
    tools::{Toolset, run_tool_streaming},
};
use path_absolutize::Absolutize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable PyInstaller and the compilers it drives read for
/// the deployment target.
pub const DEPLOYMENT_TARGET_ENV: &str = "MACOSX_DEPLOYMENT_TARGET";

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .fs_context("resolving absolute path", path)?
        .into_owned())
}

/// Builds the arguments that follow `<python> -m PyInstaller`.
///
/// Every path is made absolute, so the result does not depend on the
/// directory PyInstaller is started from.
pub fn pyinstaller_args(
    settings: &Settings,
    arch: Arch,
    icon: Option<&Path>,
) -> Result<Vec<OsString>> {
    let app = settings.app();
    let packager = settings.packager();
    let entry = packager.entry.as_deref().ok_or_else(|| {
        Error::GenericError(format!("an entry script is required in {} mode", settings.mode()))
    })?;
    let work = absolute(&settings.work_directory(arch))?;

    let mut args: Vec<OsString> = vec![
        "--noconfirm".into(),
        "--name".into(),
        app.name.clone().into(),
        "--distpath".into(),
        absolute(&settings.dist_directory(arch))?.into(),
        "--workpath".into(),
        work.clone().into(),
        "--specpath".into(),
        work.into(),
        "--target-arch".into(),
        arch.target_arch().into(),
        "--windowed".into(),
    ];

    if let Some(icon) = icon {
        args.push("--icon".into());
        args.push(absolute(icon)?.into());
    }
    if let Some(identifier) = app.bundle_identifier.as_deref() {
        args.push("--osx-bundle-identifier".into());
        args.push(identifier.into());
    }
    for mapping in &packager.data {
        let mapping = mapping.resolved_against(&std::env::current_dir()?);
        args.push("--add-data".into());
        args.push(mapping.to_pyinstaller_arg().into());
    }
    for module in &packager.hidden_imports {
        args.push("--hidden-import".into());
        args.push(module.into());
    }
    if packager.clean {
        args.push("--clean".into());
    }

    args.push(absolute(entry)?.into());
    Ok(args)
}

/// Packages the application for `arch` and returns the produced bundle.
///
/// # Errors
///
/// - [`Error::ToolFailed`] when PyInstaller exits unsuccessfully
/// - [`Error::BundleNotProduced`] when it exits cleanly without a bundle
/// - metadata errors from [`app::apply_metadata`]
pub async fn package(
    settings: &Settings,
    arch: Arch,
    icon: Option<&Path>,
    tools: &Toolset,
) -> Result<PathBuf> {
    let python = tools.path(&settings.packager().python)?.to_path_buf();
    let minimum = settings.minimum_system_version(Some(arch));

    log::info!(
        "Packaging {} for {} (minimum macOS {})",
        settings.app_name(),
        arch,
        minimum
    );

    let mut command = tools.command("arch")?;
    command
        .arg(format!("-{}", arch.target_arch()))
        .arg(&python)
        .arg("-m")
        .arg("PyInstaller")
        .args(pyinstaller_args(settings, arch, icon)?)
        .env(DEPLOYMENT_TARGET_ENV, minimum);
    run_tool_streaming("pyinstaller", &mut command).await?;

    let bundle = settings
        .dist_directory(arch)
        .join(settings.bundle_file_name());
    if !bundle.is_dir() {
        return Err(Error::BundleNotProduced(bundle));
    }

    app::apply_metadata(&bundle, settings, Some(arch)).await?;
    log::info!("Built {}", bundle.display());

    Ok(bundle)
}
