//! macOS application bundler for Python programs.
//!
//! This module turns a Python entry script into a distributable macOS
//! application by driving PyInstaller, `lipo`, `codesign`, `hdiutil` and
//! friends. Argument parsing lives in [`crate::cli`]; everything here works
//! from an immutable [`Settings`] value.
//!
//! # Modes
//!
//! | Mode | Stages |
//! |------|--------|
//! | `x64`, `arm64` | icon, package, sign, dmg, notarize |
//! | `both` | icon, package x86_64, package arm64, merge, sign, dmg, notarize |
//! | `merge` | merge two existing bundles, sign, dmg, notarize |
//!
//! # Integration
//!
//! ```no_run
//! use pymac_bundler::bundler::{
//!     AppSettings, BuildMode, Bundler, PackagerSettings, SettingsBuilder,
//! };
//!
//! # async fn example() -> pymac_bundler::bundler::Result<()> {
//! let settings = SettingsBuilder::new()
//!     .mode(BuildMode::Both)
//!     .app(AppSettings {
//!         name: "MyApp".into(),
//!         version: "1.0.0".into(),
//!         ..Default::default()
//!     })
//!     .packager(PackagerSettings {
//!         entry: Some("main.py".into()),
//!         python: "python3".into(),
//!         ..Default::default()
//!     })
//!     .build()?;
//!
//! let outcome = Bundler::new(settings)?.run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod builder;
pub mod error;
pub mod platform;
mod settings;
pub mod tools;
pub mod utils;

// Public re-exports
pub use builder::{BundleOutcome, Bundler, calculate_sha256};
pub use error::{Error, Result};
pub use platform::ArtifactKind;
pub use platform::macos::{
    notarize::NotarizeReport,
    sign::SignReport,
    universal::{FatMerger, Lipo, MergeReport},
};
pub use settings::{
    AD_HOC_IDENTITY,
    AppSettings,
    // Architecture and mode
    Arch,
    BuildMode,
    DataMapping,
    DmgSettings,
    MergeInputs,
    NotarizeSettings,
    PackagerSettings,
    // Main configuration types
    Settings,
    SettingsBuilder,
    SigningMode,
    SigningSettings,
};

/// A bundled artifact result containing metadata about created outputs.
///
/// Returned in [`BundleOutcome::artifacts`] after a successful run.
///
/// # Fields
///
/// - `kind`: The artifact kind (app, dmg, icns)
/// - `path`: Where the artifact was written
/// - `size`: Total size in bytes (all files for a bundle directory)
/// - `checksum`: SHA-256 checksum for integrity verification
///
/// # Examples
///
/// ```no_run
/// use pymac_bundler::bundler::{Bundler, Settings};
///
/// # async fn example(settings: Settings) -> pymac_bundler::bundler::Result<()> {
/// let outcome = Bundler::new(settings)?.run().await?;
///
/// for artifact in outcome.artifacts {
///     println!("Created {}: {} bytes", artifact.kind, artifact.size);
///     println!("SHA256: {}", artifact.checksum);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BundledArtifact {
    /// The artifact kind that was created.
    pub kind: ArtifactKind,

    /// Path to the artifact (a directory for `.app` bundles).
    pub path: std::path::PathBuf,

    /// Total size of the artifact in bytes.
    pub size: u64,

    /// SHA-256 checksum of the artifact.
    ///
    /// Bundles are hashed over sorted relative paths and contents, so equal
    /// trees give equal checksums.
    pub checksum: String,
}
