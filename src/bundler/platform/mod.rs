//! Platform-specific bundling implementations.
//!
//! Only macOS artifacts are produced. The macOS module is compiled on every
//! host so that the in-process parts (Mach-O inspection, bundle merging,
//! plist edits, disk-image staging) can be exercised anywhere; the external
//! tools it drives are simply absent elsewhere and preflight reports them.
//!
//! # Artifacts
//!
//! | Kind | Produced by | Module |
//! |------|-------------|--------|
//! | `.app` | PyInstaller, universal merge | [`macos::pyinstaller`], [`macos::universal`] |
//! | `.dmg` | `hdiutil` | [`macos::dmg`] |
//! | `.icns` | `sips` + `iconutil` | [`macos::icon`] |
//!
//! # Ordering
//!
//! A disk image wraps the finished bundle, so [`ArtifactKind::priority()`]
//! sorts bundles first.

pub mod macos;

use std::fmt;

/// Kind of artifact a run leaves behind.
///
/// # Examples
///
/// ```
/// use pymac_bundler::bundler::ArtifactKind;
///
/// assert_eq!(ArtifactKind::Dmg.to_string(), "dmg");
/// assert!(ArtifactKind::AppBundle.priority() < ArtifactKind::Dmg.priority());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum ArtifactKind {
    /// Converted application icon (.icns).
    Icns,

    /// macOS application bundle (.app).
    AppBundle,

    /// macOS DMG disk image (.dmg).
    ///
    /// Wraps a finished [`AppBundle`](Self::AppBundle).
    Dmg,
}

impl ArtifactKind {
    /// Returns the short name used in summaries.
    pub fn short_name(&self) -> &'static str {
        match self {
            ArtifactKind::Icns => "icns",
            ArtifactKind::AppBundle => "app",
            ArtifactKind::Dmg => "dmg",
        }
    }

    /// Returns the order artifacts are listed in.
    ///
    /// - `0`: inputs to the bundle (icns)
    /// - `1`: bundles
    /// - `2`: images wrapping a bundle
    pub fn priority(&self) -> u32 {
        match self {
            ArtifactKind::Icns => 0,
            ArtifactKind::AppBundle => 1,
            ArtifactKind::Dmg => 2,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}
