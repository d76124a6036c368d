//! Universal bundle creation for macOS (Intel + Apple Silicon)
//!
//! Merges two architecture-specific `.app` bundles into one. The arm64 bundle
//! is copied wholesale as the base; every native binary found in it (plus
//! everything under `Contents/Frameworks` and `Contents/PlugIns` of either
//! side) is then replaced by a fat file combining both sides with `lipo`.

use crate::bundler::{
    error::{Context, Error, ErrorExt, Result},
    platform::macos::{app, macho},
    settings::{Arch, MergeInputs},
    tools::{Toolset, run_tool},
    utils::fs,
};
use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Bundle subdirectories whose file lists are unioned across both sides.
///
/// Nested frameworks can ship different file sets per architecture.
pub const NESTED_CODE_DIRS: [&str; 2] = ["Contents/Frameworks", "Contents/PlugIns"];

/// Architecture whose bundle is copied as the base of the merge.
pub const BASE_ARCH: Arch = Arch::Arm64;

/// Combines two thin (or fat) binaries into one fat binary.
pub trait FatMerger {
    /// Writes a fat file at `output` holding the slices of both inputs.
    fn create_fat(
        &self,
        x86_64: &Path,
        arm64: &Path,
        output: &Path,
    ) -> impl Future<Output = Result<()>>;
}

/// [`FatMerger`] backed by `lipo -create`.
#[derive(Debug, Clone)]
pub struct Lipo {
    path: PathBuf,
}

impl Lipo {
    /// Uses the `lipo` resolved in `tools`.
    pub fn from_toolset(tools: &Toolset) -> Result<Self> {
        Ok(Self {
            path: tools.path("lipo")?.to_path_buf(),
        })
    }
}

impl FatMerger for Lipo {
    async fn create_fat(&self, x86_64: &Path, arm64: &Path, output: &Path) -> Result<()> {
        // lipo -create <x86_64> <arm64> -output <universal>
        let mut command = tokio::process::Command::new(&self.path);
        command
            .arg("-create")
            .arg(x86_64)
            .arg(arm64)
            .arg("-output")
            .arg(output);
        run_tool("lipo", &mut command).await?;
        Ok(())
    }
}

/// Outcome of a merge. Counts are per candidate path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Paths combined into fat binaries
    pub merged: usize,
    /// Paths whose two sides were byte-identical
    pub identical: usize,
    /// Paths present on only one side, copied verbatim
    pub single_side: usize,
    /// Paths present on both sides that are not both Mach-O
    pub non_binary: usize,
    /// Paths where a symlink on the base side shadows the other side
    pub symlink_conflicts: usize,
    /// Paths that are a file on one side and a directory on the other
    pub type_conflicts: usize,
    /// Paths where the fat merge failed and the base side was kept
    pub fallbacks: Vec<PathBuf>,
}

/// Merges `inputs` into a universal bundle at `output`.
///
/// Any previous bundle at `output` is removed first. The result depends only
/// on the two inputs, so re-running produces an identical tree.
///
/// Metadata is not touched here; callers re-apply `Info.plist` edits after
/// the merge since the copied base carries one side's values.
///
/// # Errors
///
/// - Either input missing or not a directory
/// - Filesystem failures while copying
///
/// Individual fat-merge failures are not errors; see [`MergeReport::fallbacks`].
pub async fn merge_bundles<M: FatMerger>(
    inputs: &MergeInputs,
    output: &Path,
    app_name: &str,
    merger: &M,
) -> Result<MergeReport> {
    for arch in Arch::ALL {
        let bundle = inputs.for_arch(arch);
        if !bundle.is_dir() {
            return Err(Error::MissingInput {
                what: match arch {
                    Arch::X86_64 => "x86_64 bundle",
                    Arch::Arm64 => "arm64 bundle",
                },
                path: bundle.to_path_buf(),
            });
        }
    }

    log::info!(
        "Merging {} + {} into {}",
        inputs.x86_64.display(),
        inputs.arm64.display(),
        output.display()
    );

    fs::remove_dir_all(output).await?;
    fs::copy_dir(inputs.for_arch(BASE_ARCH), output)
        .await
        .with_context(|| format!("copying base bundle to {}", output.display()))?;

    let candidates = collect_candidates(output, inputs, app_name).await?;
    log::debug!("{} merge candidates", candidates.len());

    let mut report = MergeReport::default();
    for rel_path in &candidates {
        merge_one(rel_path, inputs, output, merger, &mut report).await?;
    }

    sync_nested_symlinks(inputs, output, &mut report).await?;

    if !report.fallbacks.is_empty() {
        log::warn!(
            "{} file(s) kept a single architecture after lipo failures",
            report.fallbacks.len()
        );
    }
    log::info!(
        "Merged {} binaries ({} identical, {} single-side, {} non-binary)",
        report.merged,
        report.identical,
        report.single_side,
        report.non_binary
    );

    Ok(report)
}

/// Collects bundle-relative paths that may need merging, in sorted order.
async fn collect_candidates(
    base: &Path,
    inputs: &MergeInputs,
    app_name: &str,
) -> Result<BTreeSet<PathBuf>> {
    let mut candidates = BTreeSet::new();

    for entry in WalkDir::new(base).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if fs::is_binary_candidate(entry.path(), &entry.metadata()?) {
            candidates.insert(entry.path().strip_prefix(base)?.to_path_buf());
        }
    }

    if let Some(main) = app::primary_executable(base, app_name).await? {
        candidates.insert(main);
    }

    for root in [&inputs.x86_64, &inputs.arm64] {
        for nested in NESTED_CODE_DIRS {
            let dir = root.join(nested);
            if !dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&dir).follow_links(false) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    candidates.insert(entry.path().strip_prefix(root)?.to_path_buf());
                }
            }
        }
    }

    Ok(candidates)
}

async fn merge_one<M: FatMerger>(
    rel_path: &Path,
    inputs: &MergeInputs,
    output: &Path,
    merger: &M,
    report: &mut MergeReport,
) -> Result<()> {
    let x86_64 = inputs.x86_64.join(rel_path);
    let arm64 = inputs.arm64.join(rel_path);
    let dest = output.join(rel_path);

    if fs::is_symlink(&dest) {
        log::warn!(
            "{} is a symlink in the {} bundle; keeping it",
            rel_path.display(),
            BASE_ARCH
        );
        report.symlink_conflicts += 1;
        return Ok(());
    }

    if fs::is_directory(&x86_64) || fs::is_directory(&arm64) || blocked_by_base(output, rel_path) {
        log::warn!(
            "{} is a file on one side and a directory on the other; keeping the {} entry",
            rel_path.display(),
            BASE_ARCH
        );
        report.type_conflicts += 1;
        return Ok(());
    }

    match (fs::is_regular_file(&x86_64), fs::is_regular_file(&arm64)) {
        (false, false) => {
            log::debug!("{}: no regular file on either side", rel_path.display());
        }
        (true, false) => {
            log::debug!("{}: x86_64 only", rel_path.display());
            fs::replace_file(&x86_64, &dest).await?;
            report.single_side += 1;
        }
        (false, true) => {
            log::debug!("{}: arm64 only", rel_path.display());
            fs::replace_file(&arm64, &dest).await?;
            report.single_side += 1;
        }
        (true, true) => {
            if fs::files_identical(&x86_64, &arm64).await? {
                fs::replace_file(&arm64, &dest).await?;
                report.identical += 1;
            } else if macho::is_mach_o(&x86_64).await? && macho::is_mach_o(&arm64).await? {
                match create_fat_in_place(&x86_64, &arm64, &dest, merger).await {
                    Ok(()) => {
                        log::debug!("{}: merged", rel_path.display());
                        report.merged += 1;
                    }
                    Err(e) => {
                        log::warn!(
                            "lipo failed for {}, keeping the {} copy: {}",
                            rel_path.display(),
                            BASE_ARCH,
                            e
                        );
                        fs::replace_file(&arm64, &dest).await?;
                        report.fallbacks.push(rel_path.to_path_buf());
                    }
                }
            } else {
                fs::replace_file(&arm64, &dest).await?;
                report.non_binary += 1;
            }
        }
    }

    Ok(())
}

/// Whether the merged tree already holds something at `rel_path` (or one
/// of its parents) that a file cannot replace: a directory at the path
/// itself, or a non-directory where a parent directory is needed.
fn blocked_by_base(output: &Path, rel_path: &Path) -> bool {
    if fs::is_directory(&output.join(rel_path)) {
        return true;
    }
    rel_path
        .ancestors()
        .skip(1)
        .filter(|parent| !parent.as_os_str().is_empty())
        .any(|parent| {
            output
                .join(parent)
                .symlink_metadata()
                .is_ok_and(|metadata| !metadata.is_dir())
        })
}

/// Writes the fat file to a sibling path first so a failed merge never
/// leaves a truncated file behind.
async fn create_fat_in_place<M: FatMerger>(
    x86_64: &Path,
    arm64: &Path,
    dest: &Path,
    merger: &M,
) -> Result<()> {
    let file_name = dest
        .file_name()
        .context("merge destination has no file name")?
        .to_string_lossy()
        .into_owned();
    let staging = dest.with_file_name(format!(".{file_name}.universal"));

    if let Err(e) = merger.create_fat(x86_64, arm64, &staging).await {
        if staging.exists() {
            let _ = tokio::fs::remove_file(&staging).await;
        }
        return Err(e);
    }

    let permissions = tokio::fs::metadata(arm64)
        .await
        .fs_context("reading permissions", arm64)?
        .permissions();
    tokio::fs::set_permissions(&staging, permissions)
        .await
        .fs_context("setting permissions", &staging)?;
    tokio::fs::rename(&staging, dest)
        .await
        .fs_context("moving merged binary into place", dest)?;

    Ok(())
}

/// Recreates symlinks that exist only in the x86_64 nested-code trees.
///
/// When both sides carry a symlink at the same path the base side's target
/// wins, and differing targets are reported as conflicts.
async fn sync_nested_symlinks(
    inputs: &MergeInputs,
    output: &Path,
    report: &mut MergeReport,
) -> Result<()> {
    let other = &inputs.x86_64;

    for nested in NESTED_CODE_DIRS {
        let dir = other.join(nested);
        if !dir.is_dir() {
            continue;
        }

        let mut links = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_symlink() {
                links.push(entry.path().strip_prefix(other)?.to_path_buf());
            }
        }

        for rel_path in links {
            let target = tokio::fs::read_link(other.join(&rel_path))
                .await
                .fs_context("reading symlink", other.join(&rel_path))?;
            let dest = output.join(&rel_path);

            if fs::is_symlink(&dest) {
                let existing = tokio::fs::read_link(&dest)
                    .await
                    .fs_context("reading symlink", &dest)?;
                if existing != target {
                    log::warn!(
                        "{} points to {} in the {} bundle and {} in the x86_64 bundle; keeping {}",
                        rel_path.display(),
                        existing.display(),
                        BASE_ARCH,
                        target.display(),
                        existing.display()
                    );
                    report.symlink_conflicts += 1;
                }
            } else if blocked_by_base(output, &rel_path) {
                log::warn!(
                    "{} cannot be linked: it conflicts with an entry of another type in the {} bundle",
                    rel_path.display(),
                    BASE_ARCH
                );
                report.type_conflicts += 1;
            } else if dest.symlink_metadata().is_ok() {
                log::warn!(
                    "{} is a symlink only in the x86_64 bundle; keeping the {} entry",
                    rel_path.display(),
                    BASE_ARCH
                );
                report.symlink_conflicts += 1;
            } else {
                fs::symlink(&target, &dest).await?;
            }
        }
    }

    Ok(())
}
