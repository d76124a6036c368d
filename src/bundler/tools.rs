//! External tool detection and process execution.
//!
//! Every tool a run needs is resolved up front with [`Toolset::resolve`], so
//! a missing tool aborts before anything is written. Invocations go through
//! [`run_tool`], which captures status and output and turns a non-zero exit
//! into [`Error::ToolFailed`].

use crate::bundler::error::{Error, Result};
use crate::bundler::settings::Settings;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

/// A tool the current configuration needs, and why.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolRequirement {
    /// Executable name or path
    pub name: String,
    /// Short description used in error messages
    pub purpose: &'static str,
}

impl ToolRequirement {
    fn new(name: impl Into<String>, purpose: &'static str) -> Self {
        Self {
            name: name.into(),
            purpose,
        }
    }
}

/// Lists the external tools needed for `settings`.
///
/// The list is derived from the mode and the optional stages that were
/// requested; tools for stages that will not run are not required.
pub fn requirements(settings: &Settings) -> Vec<ToolRequirement> {
    let mut required = Vec::new();
    let mode = settings.mode();

    if mode.runs_packager() {
        required.push(ToolRequirement::new(
            settings.packager().python.clone(),
            "Python interpreter with PyInstaller",
        ));
        required.push(ToolRequirement::new("arch", "running the packager per architecture"));

        if settings.icon().is_some_and(|icon| !is_icns(icon)) {
            required.push(ToolRequirement::new("sips", "resizing the icon image"));
            required.push(ToolRequirement::new("iconutil", "compiling the .icns file"));
        }
    }

    if mode.merges() {
        required.push(ToolRequirement::new("lipo", "creating universal binaries"));
    }

    if settings.signing().mode.identity().is_some() {
        required.push(ToolRequirement::new("codesign", "code signing"));
        required.push(ToolRequirement::new("xattr", "clearing extended attributes"));
    }

    if settings.dmg().is_some() {
        required.push(ToolRequirement::new("hdiutil", "creating the disk image"));
    }

    if settings.notarization().is_some() {
        required.push(ToolRequirement::new("xcrun", "notarization"));
        if settings.dmg().is_none() {
            required.push(ToolRequirement::new("ditto", "zipping the bundle for notarization"));
        }
    }

    required
}

/// Returns whether `path` names an `.icns` file.
pub fn is_icns(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("icns"))
}

/// Resolved locations of the external tools a run uses.
#[derive(Clone, Debug, Default)]
pub struct Toolset {
    resolved: BTreeMap<String, PathBuf>,
}

impl Toolset {
    /// Resolves every requirement against `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTool`] for the first tool that cannot be found.
    pub fn resolve(requirements: &[ToolRequirement]) -> Result<Self> {
        Self::resolve_with(requirements, |name| which::which(name))
    }

    /// Resolves every requirement against an explicit search path.
    pub fn resolve_in(requirements: &[ToolRequirement], search_path: impl AsRef<OsStr>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::resolve_with(requirements, |name| {
            which::which_in(name, Some(search_path.as_ref()), &cwd)
        })
    }

    fn resolve_with<F>(requirements: &[ToolRequirement], mut find: F) -> Result<Self>
    where
        F: FnMut(&str) -> std::result::Result<PathBuf, which::Error>,
    {
        let mut resolved = BTreeMap::new();

        for requirement in requirements {
            if resolved.contains_key(&requirement.name) {
                continue;
            }
            match find(&requirement.name) {
                Ok(path) => {
                    log::debug!("Found {} at {}", requirement.name, path.display());
                    resolved.insert(requirement.name.clone(), path);
                }
                Err(e) => {
                    log::debug!("{} not found: {}", requirement.name, e);
                    return Err(Error::MissingTool {
                        tool: requirement.name.clone(),
                        purpose: requirement.purpose,
                    });
                }
            }
        }

        Ok(Self { resolved })
    }

    /// Builds a toolset from known paths, bypassing lookup.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = (S, PathBuf)>,
        S: Into<String>,
    {
        Self {
            resolved: paths.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Returns the resolved path of `name`.
    pub fn path(&self, name: &str) -> Result<&Path> {
        self.resolved
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::MissingTool {
                tool: name.to_string(),
                purpose: "not resolved during preflight",
            })
    }

    /// Starts a command for the resolved tool `name`.
    pub fn command(&self, name: &str) -> Result<Command> {
        let mut command = Command::new(self.path(name)?);
        command.stdin(Stdio::null());
        Ok(command)
    }
}

/// Runs `command` to completion, capturing its output.
///
/// # Errors
///
/// - [`Error::CommandFailed`] if the process cannot be spawned
/// - [`Error::ToolFailed`] if it exits unsuccessfully
pub async fn run_tool(tool: &str, command: &mut Command) -> Result<Output> {
    log::debug!("Running {:?}", command.as_std());

    let output = command.output().await.map_err(|error| Error::CommandFailed {
        command: tool.to_string(),
        error,
    })?;

    if !output.status.success() {
        return Err(Error::ToolFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

/// Runs `command` with inherited stdout/stderr so long-running tools stream
/// their progress to the terminal.
pub async fn run_tool_streaming(tool: &str, command: &mut Command) -> Result<()> {
    log::debug!("Running {:?}", command.as_std());

    let status = command
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|error| Error::CommandFailed {
            command: tool.to_string(),
            error,
        })?;

    if !status.success() {
        return Err(Error::ToolFailed {
            tool: tool.to_string(),
            status: status.to_string(),
            stderr: "see tool output above".to_string(),
        });
    }

    Ok(())
}

/// Runs a tool whose failure is tolerated, logging a warning on failure.
///
/// Returns whether the tool succeeded.
pub async fn run_tool_soft(tool: &str, command: &mut Command) -> bool {
    match run_tool(tool, command).await {
        Ok(_) => true,
        Err(e) => {
            log::warn!("{}", e);
            false
        }
    }
}
