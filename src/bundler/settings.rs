//! Configuration structures for packaging operations.
//!
//! [`Settings`] is the immutable build configuration passed through every
//! pipeline stage. It is constructed with [`SettingsBuilder`], usually from
//! parsed command line arguments merged with an optional configuration file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// CPU architecture of an architecture-specific bundle.
///
/// # Examples
///
/// ```
/// use pymac_bundler::bundler::Arch;
///
/// assert_eq!(Arch::Arm64.target_arch(), "arm64");
/// assert_eq!(Arch::X86_64.default_minimum_system_version(), "10.13");
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Arch {
    /// Intel 64-bit
    X86_64,
    /// Apple Silicon
    Arm64,
}

impl Arch {
    /// Both architectures, in the order slices are passed to `lipo`.
    pub const ALL: [Arch; 2] = [Arch::X86_64, Arch::Arm64];

    /// Value for PyInstaller's `--target-arch` and the `arch` tool.
    pub fn target_arch(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Mach-O `cputype` constant for this architecture.
    pub fn cpu_type(&self) -> u32 {
        match self {
            Arch::X86_64 => goblin::mach::cputype::CPU_TYPE_X86_64,
            Arch::Arm64 => goblin::mach::cputype::CPU_TYPE_ARM64,
        }
    }

    /// Maps a Mach-O `cputype` back to an architecture.
    pub fn from_cpu_type(cpu_type: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|arch| arch.cpu_type() == cpu_type)
    }

    /// Lowest macOS release that runs binaries for this architecture.
    ///
    /// Apple Silicon shipped with macOS 11, so arm64 cannot go lower.
    pub fn default_minimum_system_version(&self) -> &'static str {
        match self {
            Arch::X86_64 => "10.13",
            Arch::Arm64 => "11.0",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target_arch())
    }
}

/// Operating mode selected on the command line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Package for Intel only
    X64,
    /// Package for Apple Silicon only
    Arm64,
    /// Package for both architectures and merge into a universal bundle
    #[default]
    Both,
    /// Merge two existing architecture bundles
    Merge,
}

impl BuildMode {
    /// Architectures the packager runs for in this mode.
    pub fn architectures(&self) -> &'static [Arch] {
        match self {
            BuildMode::X64 => &[Arch::X86_64],
            BuildMode::Arm64 => &[Arch::Arm64],
            BuildMode::Both => &Arch::ALL,
            BuildMode::Merge => &[],
        }
    }

    /// Whether this mode invokes the packager.
    pub fn runs_packager(&self) -> bool {
        !self.architectures().is_empty()
    }

    /// Whether this mode produces a universal bundle.
    pub fn merges(&self) -> bool {
        matches!(self, BuildMode::Both | BuildMode::Merge)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildMode::X64 => "x64",
            BuildMode::Arm64 => "arm64",
            BuildMode::Both => "both",
            BuildMode::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// Ad-hoc signing identity understood by `codesign`.
pub const AD_HOC_IDENTITY: &str = "-";

/// How the finished bundle is signed.
///
/// Parsed from `none`, `basic`, `strong`, or any other string, which is
/// taken as a signing identity name.
///
/// ```
/// use pymac_bundler::bundler::SigningMode;
///
/// let mode: SigningMode = "Developer ID Application: Example (TEAMID)".parse().unwrap();
/// assert!(mode.is_identity());
/// assert_eq!("strong".parse::<SigningMode>().unwrap(), SigningMode::Strong);
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum SigningMode {
    /// Leave the bundle unsigned
    None,
    /// Ad-hoc sign the outer bundle with `--deep`
    #[default]
    Basic,
    /// Ad-hoc sign every nested binary and framework, then the bundle
    Strong,
    /// Strong signing with a named certificate and the hardened runtime
    Identity(String),
}

impl SigningMode {
    /// Identity passed to `codesign --sign`, if signing at all.
    pub fn identity(&self) -> Option<&str> {
        match self {
            SigningMode::None => None,
            SigningMode::Basic | SigningMode::Strong => Some(AD_HOC_IDENTITY),
            SigningMode::Identity(name) => Some(name),
        }
    }

    /// Whether nested code is signed item by item.
    pub fn is_strong(&self) -> bool {
        matches!(self, SigningMode::Strong | SigningMode::Identity(_))
    }

    /// Whether a real (non ad-hoc) certificate is used.
    pub fn is_identity(&self) -> bool {
        matches!(self, SigningMode::Identity(_))
    }
}

impl FromStr for SigningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("signing mode cannot be empty".to_string()),
            "none" => Ok(SigningMode::None),
            "basic" => Ok(SigningMode::Basic),
            "strong" => Ok(SigningMode::Strong),
            AD_HOC_IDENTITY => Ok(SigningMode::Strong),
            identity => Ok(SigningMode::Identity(identity.to_string())),
        }
    }
}

impl fmt::Display for SigningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningMode::None => f.write_str("none"),
            SigningMode::Basic => f.write_str("basic"),
            SigningMode::Strong => f.write_str("strong"),
            SigningMode::Identity(name) => write!(f, "identity '{name}'"),
        }
    }
}

/// Extra data file or directory copied into the bundle (`SOURCE:DEST`).
///
/// The split happens on the last `:` so that sources may contain colons.
///
/// ```
/// use pymac_bundler::bundler::DataMapping;
///
/// let mapping: DataMapping = "assets/fonts:fonts".parse().unwrap();
/// assert_eq!(mapping.destination, "fonts");
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataMapping {
    /// File or directory on disk
    pub source: PathBuf,
    /// Destination directory inside the frozen application
    pub destination: String,
}

impl DataMapping {
    /// Returns the `SOURCE:DEST` form PyInstaller expects.
    pub fn to_pyinstaller_arg(&self) -> String {
        format!("{}:{}", self.source.display(), self.destination)
    }

    /// Returns a copy with a relative source resolved against `base`.
    pub fn resolved_against(&self, base: &Path) -> Self {
        Self {
            source: if self.source.is_absolute() {
                self.source.clone()
            } else {
                base.join(&self.source)
            },
            destination: self.destination.clone(),
        }
    }
}

impl FromStr for DataMapping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, destination) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected SOURCE:DEST, got '{s}'"))?;

        if source.is_empty() || destination.is_empty() {
            return Err(format!("both SOURCE and DEST are required, got '{s}'"));
        }

        Ok(Self {
            source: PathBuf::from(source),
            destination: destination.to_string(),
        })
    }
}

/// Metadata written into the bundle's `Info.plist`.
#[derive(Clone, Debug, Default)]
pub struct AppSettings {
    /// Application name, also the bundle and executable name
    pub name: String,

    /// Version for `CFBundleShortVersionString` and `CFBundleVersion`
    pub version: String,

    /// Reverse-DNS bundle identifier
    pub bundle_identifier: Option<String>,

    /// Overrides the per-architecture minimum macOS version
    pub minimum_system_version: Option<String>,
}

/// Inputs to the external packager.
#[derive(Clone, Debug, Default)]
pub struct PackagerSettings {
    /// Python entry script
    pub entry: Option<PathBuf>,

    /// Python interpreter with PyInstaller installed
    pub python: String,

    /// Extra data files
    pub data: Vec<DataMapping>,

    /// Modules PyInstaller cannot discover on its own
    pub hidden_imports: Vec<String>,

    /// Clear PyInstaller's cache before building
    pub clean: bool,
}

/// The two architecture bundles consumed by merge mode.
#[derive(Clone, Debug)]
pub struct MergeInputs {
    /// Intel bundle root
    pub x86_64: PathBuf,
    /// Apple Silicon bundle root
    pub arm64: PathBuf,
}

impl MergeInputs {
    /// Bundle root for the given architecture.
    pub fn for_arch(&self, arch: Arch) -> &Path {
        match arch {
            Arch::X86_64 => &self.x86_64,
            Arch::Arm64 => &self.arm64,
        }
    }
}

/// Code signing configuration.
#[derive(Clone, Debug, Default)]
pub struct SigningSettings {
    /// Signing depth and identity
    pub mode: SigningMode,

    /// Entitlements plist applied with identity signing
    pub entitlements: Option<PathBuf>,
}

/// Disk image configuration.
#[derive(Clone, Debug)]
pub struct DmgSettings {
    /// Volume name shown when the image is mounted
    pub volume_name: String,
}

/// Notarization configuration.
#[derive(Clone, Debug)]
pub struct NotarizeSettings {
    /// Keychain profile created with `notarytool store-credentials`
    pub keychain_profile: String,

    /// Staple the ticket after a successful submission
    pub staple: bool,
}

/// Immutable build configuration.
///
/// Built once from the command line (see [`SettingsBuilder`]) and passed by
/// reference to every stage.
#[derive(Clone, Debug)]
pub struct Settings {
    mode: BuildMode,
    app: AppSettings,
    packager: PackagerSettings,
    icon: Option<PathBuf>,
    output_directory: PathBuf,
    merge_inputs: Option<MergeInputs>,
    signing: SigningSettings,
    dmg: Option<DmgSettings>,
    notarization: Option<NotarizeSettings>,
}

impl Settings {
    /// Returns the operating mode.
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Returns the application name.
    pub fn app_name(&self) -> &str {
        &self.app.name
    }

    /// Returns the version string.
    pub fn version_string(&self) -> &str {
        &self.app.version
    }

    /// Returns bundle metadata settings.
    pub fn app(&self) -> &AppSettings {
        &self.app
    }

    /// Returns packager settings.
    pub fn packager(&self) -> &PackagerSettings {
        &self.packager
    }

    /// Returns the icon source, if any.
    pub fn icon(&self) -> Option<&Path> {
        self.icon.as_deref()
    }

    /// Returns the output directory.
    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Returns merge-mode inputs.
    pub fn merge_inputs(&self) -> Option<&MergeInputs> {
        self.merge_inputs.as_ref()
    }

    /// Returns signing settings.
    pub fn signing(&self) -> &SigningSettings {
        &self.signing
    }

    /// Returns disk image settings when an image was requested.
    pub fn dmg(&self) -> Option<&DmgSettings> {
        self.dmg.as_ref()
    }

    /// Returns notarization settings when a profile was given.
    pub fn notarization(&self) -> Option<&NotarizeSettings> {
        self.notarization.as_ref()
    }

    /// File name of the bundle directory (`<Name>.app`).
    pub fn bundle_file_name(&self) -> String {
        format!("{}.app", self.app.name)
    }

    /// Minimum macOS version for a bundle.
    ///
    /// `None` means the universal bundle, which inherits the lowest
    /// architecture default so the Intel slice keeps its reach.
    pub fn minimum_system_version(&self, arch: Option<Arch>) -> &str {
        if let Some(version) = self.app.minimum_system_version.as_deref() {
            return version;
        }
        arch.unwrap_or(Arch::X86_64).default_minimum_system_version()
    }

    /// Directory PyInstaller writes the bundle for `arch` into.
    pub fn dist_directory(&self, arch: Arch) -> PathBuf {
        self.output_directory.join(arch.target_arch())
    }

    /// PyInstaller work and spec directory for `arch`.
    pub fn work_directory(&self, arch: Arch) -> PathBuf {
        self.output_directory.join("build").join(arch.target_arch())
    }

    /// Where the merged bundle is written.
    pub fn universal_bundle_path(&self) -> PathBuf {
        match self.mode {
            BuildMode::Merge => self.output_directory.join(self.bundle_file_name()),
            _ => self
                .output_directory
                .join("universal")
                .join(self.bundle_file_name()),
        }
    }

    /// Disk image path (`<output>/<Name>-<version>.dmg`).
    pub fn dmg_path(&self) -> PathBuf {
        self.output_directory
            .join(format!("{}-{}.dmg", self.app.name, self.app.version))
    }
}

/// Builder for constructing [`Settings`].
///
/// # Examples
///
/// ```
/// use pymac_bundler::bundler::{AppSettings, BuildMode, MergeInputs, SettingsBuilder};
///
/// let settings = SettingsBuilder::new()
///     .mode(BuildMode::Merge)
///     .app(AppSettings {
///         name: "Demo".into(),
///         version: "1.0.0".into(),
///         ..Default::default()
///     })
///     .merge_inputs(MergeInputs {
///         x86_64: "dist/x86_64/Demo.app".into(),
///         arm64: "dist/arm64/Demo.app".into(),
///     })
///     .output_directory("dist")
///     .build()
///     .unwrap();
/// assert_eq!(settings.universal_bundle_path(), std::path::Path::new("dist/Demo.app"));
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    mode: BuildMode,
    app: Option<AppSettings>,
    packager: PackagerSettings,
    icon: Option<PathBuf>,
    output_directory: Option<PathBuf>,
    merge_inputs: Option<MergeInputs>,
    signing: SigningSettings,
    dmg: Option<DmgSettings>,
    notarization: Option<NotarizeSettings>,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the operating mode.
    ///
    /// Default: [`BuildMode::Both`]
    pub fn mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets bundle metadata.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn app(mut self, app: AppSettings) -> Self {
        self.app = Some(app);
        self
    }

    /// Sets packager inputs. Required for every mode except merge.
    pub fn packager(mut self, packager: PackagerSettings) -> Self {
        self.packager = packager;
        self
    }

    /// Sets the icon source (`.icns` or a raster image).
    pub fn icon<P: AsRef<Path>>(mut self, icon: Option<P>) -> Self {
        self.icon = icon.map(|p| p.as_ref().to_path_buf());
        self
    }

    /// Sets the output directory.
    ///
    /// Default: `dist`
    pub fn output_directory<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_directory = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the two bundles merged in merge mode.
    pub fn merge_inputs(mut self, inputs: MergeInputs) -> Self {
        self.merge_inputs = Some(inputs);
        self
    }

    /// Sets signing configuration.
    ///
    /// Default: basic ad-hoc signing
    pub fn signing(mut self, signing: SigningSettings) -> Self {
        self.signing = signing;
        self
    }

    /// Requests a disk image.
    pub fn dmg(mut self, dmg: Option<DmgSettings>) -> Self {
        self.dmg = dmg;
        self
    }

    /// Requests notarization.
    pub fn notarization(mut self, notarization: Option<NotarizeSettings>) -> Self {
        self.notarization = notarization;
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a field required by the selected mode is missing:
    /// - `app` (with a non-empty name)
    /// - `packager.entry` for packaging modes
    /// - `merge_inputs` for merge mode
    pub fn build(self) -> crate::bundler::Result<Settings> {
        use crate::bundler::error::Context;

        let app = self.app.context("app settings are required")?;
        if app.name.trim().is_empty() {
            crate::bail!("application name cannot be empty");
        }
        if app.name.contains('/') {
            crate::bail!("application name cannot contain '/': {}", app.name);
        }

        if self.mode.runs_packager() && self.packager.entry.is_none() {
            crate::bail!("an entry script is required in {} mode", self.mode);
        }

        let merge_inputs = if self.mode == BuildMode::Merge {
            Some(
                self.merge_inputs
                    .context("both architecture bundles are required in merge mode")?,
            )
        } else {
            None
        };

        Ok(Settings {
            mode: self.mode,
            app,
            packager: self.packager,
            icon: self.icon,
            output_directory: self
                .output_directory
                .unwrap_or_else(|| PathBuf::from("dist")),
            merge_inputs,
            signing: self.signing,
            dmg: self.dmg,
            notarization: self.notarization,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str) -> AppSettings {
        AppSettings {
            name: name.into(),
            version: "2.1.0".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_data_mapping_splits_on_last_colon() {
        let mapping: DataMapping = "C:/odd:path/data:share/data".parse().unwrap();
        assert_eq!(mapping.source, PathBuf::from("C:/odd:path/data"));
        assert_eq!(mapping.destination, "share/data");
        assert_eq!(mapping.to_pyinstaller_arg(), "C:/odd:path/data:share/data");
    }

    #[test]
    fn test_data_mapping_rejects_missing_halves() {
        assert!("no-separator".parse::<DataMapping>().is_err());
        assert!(":dest".parse::<DataMapping>().is_err());
        assert!("src:".parse::<DataMapping>().is_err());
    }

    #[test]
    fn test_signing_mode_parsing() {
        assert_eq!("none".parse::<SigningMode>().unwrap(), SigningMode::None);
        assert_eq!("basic".parse::<SigningMode>().unwrap(), SigningMode::Basic);
        assert_eq!("-".parse::<SigningMode>().unwrap(), SigningMode::Strong);
        assert_eq!(
            "Developer ID Application: Jane (ABC123)".parse::<SigningMode>().unwrap(),
            SigningMode::Identity("Developer ID Application: Jane (ABC123)".into())
        );
        assert!("  ".parse::<SigningMode>().is_err());
    }

    #[test]
    fn test_signing_mode_identity() {
        assert_eq!(SigningMode::None.identity(), None);
        assert_eq!(SigningMode::Basic.identity(), Some("-"));
        assert!(!SigningMode::Basic.is_strong());
        assert!(SigningMode::Identity("X".into()).is_strong());
    }

    #[test]
    fn test_build_requires_entry_for_packaging_modes() {
        let result = SettingsBuilder::new()
            .mode(BuildMode::X64)
            .app(app("Demo"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_requires_merge_inputs() {
        let result = SettingsBuilder::new()
            .mode(BuildMode::Merge)
            .app(app("Demo"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_paths_derived_from_output_directory() {
        let settings = SettingsBuilder::new()
            .mode(BuildMode::Both)
            .app(app("Key Manager"))
            .packager(PackagerSettings {
                entry: Some("main.py".into()),
                python: "python3".into(),
                ..Default::default()
            })
            .output_directory("out")
            .build()
            .unwrap();

        assert_eq!(settings.dist_directory(Arch::Arm64), PathBuf::from("out/arm64"));
        assert_eq!(
            settings.work_directory(Arch::X86_64),
            PathBuf::from("out/build/x86_64")
        );
        assert_eq!(
            settings.universal_bundle_path(),
            PathBuf::from("out/universal/Key Manager.app")
        );
        assert_eq!(settings.dmg_path(), PathBuf::from("out/Key Manager-2.1.0.dmg"));
    }

    #[test]
    fn test_minimum_system_version_defaults() {
        let settings = SettingsBuilder::new()
            .mode(BuildMode::Arm64)
            .app(app("Demo"))
            .packager(PackagerSettings {
                entry: Some("main.py".into()),
                ..Default::default()
            })
            .build()
            .unwrap();
        assert_eq!(settings.minimum_system_version(Some(Arch::Arm64)), "11.0");
        assert_eq!(settings.minimum_system_version(None), "10.13");
    }

    #[test]
    fn test_arch_from_cpu_type() {
        assert_eq!(Arch::from_cpu_type(0x0100_0007), Some(Arch::X86_64));
        assert_eq!(Arch::from_cpu_type(0x0100_000c), Some(Arch::Arm64));
        // 32-bit i386
        assert_eq!(Arch::from_cpu_type(7), None);
    }
}
