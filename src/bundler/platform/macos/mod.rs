//! macOS bundling support: `.app` bundles, universal merges and DMG images.
//!
//! # Stages
//!
//! | Stage | Module | External tools |
//! |-------|--------|----------------|
//! | Icon conversion | [`icon`] | `sips`, `iconutil` |
//! | Packaging | [`pyinstaller`] | `arch`, PyInstaller |
//! | Bundle metadata | [`app`] | none (`plist` crate) |
//! | Universal merge | [`universal`] | `lipo` |
//! | Mach-O inspection | [`macho`] | none (`goblin` crate) |
//! | Code signing | [`sign`] | `codesign`, `xattr` |
//! | Disk image | [`dmg`] | `hdiutil` |
//! | Notarization | [`notarize`] | `xcrun`, `ditto` |
//!
//! # Output Location
//!
//! Everything lands under the configured output directory:
//! - `<out>/<arch>/MyApp.app` - per-architecture bundle
//! - `<out>/universal/MyApp.app` - merged bundle (`both` mode)
//! - `<out>/MyApp.app` - merged bundle (`merge` mode)
//! - `<out>/MyApp-1.0.0.dmg` - disk image
//!
//! # Minimum macOS Version
//!
//! Defaults to 10.13 for x86_64 and universal bundles and 11.0 for arm64,
//! overridable with `--min-macos` or `MACOSX_DEPLOYMENT_TARGET`.

pub mod app;
pub mod dmg;
pub mod icon;
pub mod macho;
pub mod notarize;
pub mod pyinstaller;
pub mod sign;
pub mod universal;
