//! Bundle orchestration and coordination.
//!
//! This module provides the [`Bundler`] orchestrator that runs the pipeline
//! stages for the selected [`BuildMode`].
//!
//! # Overview
//!
//! The bundler:
//! 1. Checks inputs and resolves every external tool ([`Bundler::new`])
//! 2. Converts the icon and runs the packager per architecture
//! 3. Merges architecture bundles into a universal bundle
//! 4. Signs, builds a disk image, notarizes
//! 5. Calculates sizes and checksums and returns [`BundledArtifact`] results
//!
//! Nothing is written before step 2, so a missing tool or input leaves the
//! output directory untouched.
//!
//! # Example
//!
//! ```no_run
//! use pymac_bundler::bundler::{AppSettings, BuildMode, Bundler, MergeInputs, SettingsBuilder};
//!
//! # async fn example() -> pymac_bundler::bundler::Result<()> {
//! let settings = SettingsBuilder::new()
//!     .mode(BuildMode::Merge)
//!     .app(AppSettings {
//!         name: "MyApp".into(),
//!         version: "1.0.0".into(),
//!         ..Default::default()
//!     })
//!     .merge_inputs(MergeInputs {
//!         x86_64: "dist/x86_64/MyApp.app".into(),
//!         arm64: "dist/arm64/MyApp.app".into(),
//!     })
//!     .build()?;
//!
//! let outcome = Bundler::new(settings)?.run().await?;
//!
//! for artifact in outcome.artifacts {
//!     println!("Created: {} ({} bytes)", artifact.kind, artifact.size);
//!     println!("SHA256: {}", artifact.checksum);
//! }
//! # Ok(())
//! # }
//! ```

use crate::bail;
use crate::bundler::{
    ArtifactKind, BundledArtifact, Result,
    error::{Error, ErrorExt},
    platform::macos::{
        app, dmg, icon,
        notarize::{self, NotarizeReport},
        pyinstaller,
        sign::{self, SignReport},
        universal::{self, Lipo, MergeReport},
    },
    settings::{Arch, BuildMode, MergeInputs, Settings},
    tools::{self, Toolset},
    utils::fs,
};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Everything a finished run produced.
#[derive(Debug, Clone, Default)]
pub struct BundleOutcome {
    /// Final artifacts, bundles before images
    pub artifacts: Vec<BundledArtifact>,
    /// Merge statistics (`both` and `merge` modes)
    pub merge: Option<MergeReport>,
    /// Signing results, unless signing was disabled
    pub signing: Option<SignReport>,
    /// Notarization results, when a profile was configured
    pub notarization: Option<NotarizeReport>,
}

impl BundleOutcome {
    /// Whether any stage reported a soft failure.
    pub fn has_warnings(&self) -> bool {
        let merge = self.merge.as_ref().is_some_and(|report| {
            !report.fallbacks.is_empty() || report.symlink_conflicts > 0 || report.type_conflicts > 0
        });
        let signing = self.signing.as_ref().is_some_and(|report| {
            !report.failed.is_empty() || !report.bundle_signed || report.verified == Some(false)
        });
        let notarization = self.notarization.is_some_and(|report| !report.accepted);
        merge || signing || notarization
    }
}

/// Main bundler orchestrator.
///
/// Holds the immutable [`Settings`] and the [`Toolset`] resolved for them.
///
/// # Examples
///
/// ```no_run
/// use pymac_bundler::bundler::{Bundler, Settings};
///
/// # async fn example(settings: Settings) -> pymac_bundler::bundler::Result<()> {
/// let bundler = Bundler::new(settings)?;
/// let outcome = bundler.run().await?;
/// println!("Created {} artifacts", outcome.artifacts.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Bundler {
    settings: Settings,
    tools: Toolset,
}

impl Bundler {
    /// Creates a bundler after checking inputs and resolving tools on `PATH`.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingInput`] for a missing entry script, data source,
    ///   icon, entitlements file or merge input
    /// - [`Error::MissingTool`] for the first required tool not found
    pub fn new(settings: Settings) -> Result<Self> {
        check_inputs(&settings)?;
        let tools = Toolset::resolve(&tools::requirements(&settings))?;
        Ok(Self { settings, tools })
    }

    /// Creates a bundler with an already-resolved toolset.
    pub fn with_toolset(settings: Settings, tools: Toolset) -> Result<Self> {
        check_inputs(&settings)?;
        Ok(Self { settings, tools })
    }

    /// Returns a reference to the bundler settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the resolved tools.
    pub fn tools(&self) -> &Toolset {
        &self.tools
    }

    /// Runs every stage for the configured mode.
    ///
    /// Soft failures are logged and reported in the returned
    /// [`BundleOutcome`]; only hard failures return `Err`.
    pub async fn run(&self) -> Result<BundleOutcome> {
        let settings = &self.settings;
        let mut outcome = BundleOutcome::default();
        let mut outputs: Vec<(ArtifactKind, PathBuf)> = Vec::new();

        fs::create_dir_all(settings.output_directory(), false).await?;

        let bundle = match settings.mode() {
            BuildMode::X64 | BuildMode::Arm64 => {
                let icns = self.prepare_icon(&mut outputs).await?;
                let arch = settings.mode().architectures()[0];
                pyinstaller::package(settings, arch, icns.as_deref(), &self.tools).await?
            }
            BuildMode::Both => {
                let icns = self.prepare_icon(&mut outputs).await?;
                let x86_64 =
                    pyinstaller::package(settings, Arch::X86_64, icns.as_deref(), &self.tools)
                        .await?;
                let arm64 =
                    pyinstaller::package(settings, Arch::Arm64, icns.as_deref(), &self.tools)
                        .await?;
                self.merge(&MergeInputs { x86_64, arm64 }, &mut outcome).await?
            }
            BuildMode::Merge => {
                let inputs = settings
                    .merge_inputs()
                    .ok_or_else(|| Error::GenericError("merge mode requires both bundles".into()))?;
                self.merge(inputs, &mut outcome).await?
            }
        };

        if settings.signing().mode.identity().is_some() {
            outcome.signing =
                Some(sign::sign_bundle(&bundle, settings.signing(), &self.tools).await?);
        }
        outputs.push((ArtifactKind::AppBundle, bundle.clone()));

        let image = match settings.dmg() {
            Some(dmg_settings) => {
                let path = dmg::create_dmg(
                    &bundle,
                    &settings.dmg_path(),
                    &dmg_settings.volume_name,
                    &self.tools,
                )
                .await?;
                sign::sign_dmg(&path, settings.signing(), &self.tools).await?;
                outputs.push((ArtifactKind::Dmg, path.clone()));
                Some(path)
            }
            None => None,
        };

        if let Some(notarization) = settings.notarization() {
            let target = image.as_deref().unwrap_or(&bundle);
            outcome.notarization =
                Some(notarize::notarize(target, notarization, &self.tools).await?);
        }

        // Checksums last: stapling modifies the artifacts.
        outputs.sort_by_key(|(kind, _)| kind.priority());
        for (kind, path) in outputs {
            outcome.artifacts.push(artifact(kind, &path).await?);
        }

        Ok(outcome)
    }

    async fn prepare_icon(&self, outputs: &mut Vec<(ArtifactKind, PathBuf)>) -> Result<Option<PathBuf>> {
        let working_dir = std::env::current_dir()?;
        let icns = icon::prepare_icon(&self.settings, &self.tools, &working_dir).await?;

        if let (Some(converted), Some(source)) = (&icns, self.settings.icon())
            && converted != source
        {
            outputs.push((ArtifactKind::Icns, converted.clone()));
        }
        Ok(icns)
    }

    async fn merge(&self, inputs: &MergeInputs, outcome: &mut BundleOutcome) -> Result<PathBuf> {
        let output = self.settings.universal_bundle_path();
        let lipo = Lipo::from_toolset(&self.tools)?;

        let report =
            universal::merge_bundles(inputs, &output, self.settings.app_name(), &lipo).await?;
        app::apply_metadata(&output, &self.settings, None).await?;

        outcome.merge = Some(report);
        Ok(output)
    }
}

/// Verifies that every configured input exists before anything is written.
fn check_inputs(settings: &Settings) -> Result<()> {
    fn require_file(what: &'static str, path: &Path) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(Error::MissingInput {
                what,
                path: path.to_path_buf(),
            })
        }
    }

    if settings.mode().runs_packager() {
        if let Some(entry) = settings.packager().entry.as_deref() {
            require_file("entry script", entry)?;
        }
        for mapping in &settings.packager().data {
            if mapping.source.symlink_metadata().is_err() {
                return Err(Error::MissingInput {
                    what: "data source",
                    path: mapping.source.clone(),
                });
            }
        }
        if let Some(icon) = settings.icon() {
            require_file("icon", icon)?;
        }
    }

    if settings.signing().mode.is_identity()
        && let Some(entitlements) = settings.signing().entitlements.as_deref()
    {
        require_file("entitlements file", entitlements)?;
    }

    if let Some(inputs) = settings.merge_inputs() {
        let output = absolute(&settings.universal_bundle_path())?;
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
            let bundle = absolute(bundle)?;
            if bundle == output || output.starts_with(&bundle) || bundle.starts_with(&output) {
                bail!(
                    "output bundle {} overlaps the {} input {}",
                    output.display(),
                    arch,
                    bundle.display()
                );
            }
        }
    }

    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .fs_context("resolving absolute path", path)?
        .into_owned())
}

async fn artifact(kind: ArtifactKind, path: &Path) -> Result<BundledArtifact> {
    Ok(BundledArtifact {
        kind,
        path: path.to_path_buf(),
        size: fs::total_size(path)?,
        checksum: calculate_sha256(path).await?,
    })
}

/// Calculates SHA256 checksum of a file or directory.
///
/// For files: Reads in 8KB chunks and computes the SHA-256 hash.
/// For directories: Recursively hashes all entries in deterministic order.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash (64 characters)
/// * `Err` - If path cannot be read or is neither file nor directory
pub async fn calculate_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let metadata = tokio::fs::metadata(path)
        .await
        .fs_context("reading artifact metadata", path)?;

    if metadata.is_file() {
        let mut hasher = Sha256::new();
        hash_file(path, &mut hasher).await?;
        Ok(format!("{:x}", hasher.finalize()))
    } else if metadata.is_dir() {
        calculate_directory_sha256(path).await
    } else {
        bail!("Path is neither file nor directory: {}", path.display())
    }
}

async fn hash_file(path: &Path, hasher: &mut sha2::Sha256) -> Result<()> {
    use sha2::Digest;
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening file for hashing", path)?;
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading file for hash calculation", path)?;
        if n == 0 {
            return Ok(());
        }
        hasher.update(&buffer[..n]);
    }
}

/// Calculates SHA256 checksum of a directory tree (e.g. an `.app` bundle).
///
/// # Algorithm
///
/// 1. Collect all files and symlinks with walkdir, sorted by path
/// 2. For each file: hash(relative_path + file_content)
/// 3. For each symlink: hash(relative_path + "->" + target)
/// 4. Return final combined hash
async fn calculate_directory_sha256(dir_path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(dir_path).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            entries.push(entry);
        }
    }
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    let mut hasher = Sha256::new();
    for entry in entries {
        let rel_path = entry.path().strip_prefix(dir_path)?;
        hasher.update(rel_path.to_string_lossy().as_bytes());

        if entry.file_type().is_symlink() {
            let target = tokio::fs::read_link(entry.path())
                .await
                .fs_context("reading symlink", entry.path())?;
            hasher.update(b"->");
            hasher.update(target.to_string_lossy().as_bytes());
        } else {
            hash_file(entry.path(), &mut hasher).await?;
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}
