//! macOS application bundle (.app) metadata.
//!
//! The packager produces the bundle; this module only edits its
//! `Info.plist` and locates the primary executable.

use crate::bundler::{
    error::{Error, ErrorExt, Result},
    settings::{Arch, Settings},
    utils::fs,
};
use std::path::{Path, PathBuf};

/// Path of the bundle's `Info.plist`.
pub fn info_plist_path(bundle: &Path) -> PathBuf {
    bundle.join("Contents").join("Info.plist")
}

/// Returns the bundle-relative path of the primary executable.
///
/// Prefers `Contents/MacOS/<app_name>`. Otherwise falls back to the only
/// regular file in `Contents/MacOS`, if there is exactly one.
pub async fn primary_executable(bundle: &Path, app_name: &str) -> Result<Option<PathBuf>> {
    let macos = Path::new("Contents").join("MacOS");
    let named = macos.join(app_name);
    if fs::is_regular_file(&bundle.join(&named)) {
        return Ok(Some(named));
    }

    let dir = bundle.join(&macos);
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .fs_context("reading directory", &dir)?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .fs_context("reading directory", &dir)?
    {
        if entry
            .file_type()
            .await
            .fs_context("reading file type", entry.path())?
            .is_file()
        {
            files.push(entry.file_name());
        }
    }

    match files.as_slice() {
        [only] => Ok(Some(macos.join(only))),
        _ => Ok(None),
    }
}

/// Rewrites the bundle's `Info.plist` with the configured metadata.
///
/// `arch` selects the default minimum macOS version; `None` is the
/// universal bundle.
///
/// # Errors
///
/// [`Error::MissingInput`] when the bundle has no `Info.plist`, or a plist
/// error when it cannot be parsed or written.
pub async fn apply_metadata(bundle: &Path, settings: &Settings, arch: Option<Arch>) -> Result<()> {
    let plist_path = info_plist_path(bundle);
    if !plist_path.is_file() {
        return Err(Error::MissingInput {
            what: "Info.plist",
            path: plist_path,
        });
    }

    let mut value = plist::Value::from_file(&plist_path)?;
    let dict = value.as_dictionary_mut().ok_or_else(|| {
        Error::GenericError(format!(
            "{} is not a dictionary",
            plist_path.display()
        ))
    })?;

    let app = settings.app();
    let version = settings.version_string();
    let minimum = settings.minimum_system_version(arch);

    dict.insert("CFBundleShortVersionString".into(), version.into());
    dict.insert("CFBundleVersion".into(), version.into());
    dict.insert("CFBundleDisplayName".into(), app.name.as_str().into());
    dict.insert("CFBundleName".into(), app.name.as_str().into());
    dict.insert("LSMinimumSystemVersion".into(), minimum.into());
    if let Some(identifier) = app.bundle_identifier.as_deref() {
        dict.insert("CFBundleIdentifier".into(), identifier.into());
    }
    dict.insert("NSHighResolutionCapable".into(), true.into());

    value.to_file_xml(&plist_path)?;
    log::debug!(
        "Updated {} (version {}, minimum macOS {})",
        plist_path.display(),
        version,
        minimum
    );

    Ok(())
}
